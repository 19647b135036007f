use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

const VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Verifies CAPTCHA tokens for anonymous submissions.
///
/// `Ok(false)` means the challenge failed and the caller should retry with a
/// fresh token; `Err` means the verification service itself was unreachable,
/// which also blocks the submission but as a retryable condition.
pub enum CaptchaVerifier {
    Turnstile(TurnstileVerifier),
    /// Fixed outcome, for tests and deployments without a configured secret.
    Static { allow: bool },
}

impl CaptchaVerifier {
    #[must_use]
    pub fn turnstile(secret: String) -> Self {
        Self::Turnstile(TurnstileVerifier::new(secret))
    }

    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool> {
        match self {
            Self::Turnstile(verifier) => verifier.verify(token, remote_ip).await,
            Self::Static { allow } => Ok(*allow),
        }
    }
}

pub struct TurnstileVerifier {
    secret: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
}

impl TurnstileVerifier {
    #[must_use]
    pub fn new(secret: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self { secret, client }
    }

    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool> {
        let mut form = vec![
            ("secret", self.secret.as_str()),
            ("response", token),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(VERIFY_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::ExternalService(format!("captcha verification: {e}")))?;

        let body: SiteverifyResponse = response
            .json()
            .await
            .map_err(|e| Error::ExternalService(format!("captcha verification: {e}")))?;

        Ok(body.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_verifier() {
        let allow = CaptchaVerifier::Static { allow: true };
        assert!(allow.verify("anything", None).await.unwrap());

        let deny = CaptchaVerifier::Static { allow: false };
        assert!(!deny.verify("anything", Some("10.0.0.1")).await.unwrap());
    }
}
