use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Salt for durable survey share links.
pub const SURVEY_SHARE_SALT: &str = "survey-share";
/// Salt for account activation tokens.
pub const ACCOUNT_ACTIVATE_SALT: &str = "account-activate";
/// Salt for password reset tokens.
pub const PASSWORD_RESET_SALT: &str = "password-reset";

/// Signs and verifies tamper-evident tokens: `base64(payload).base64(mac)`.
///
/// The payload is readable by anyone; the signature binds it to the server
/// key and a purpose salt so tokens minted for one purpose cannot be
/// replayed for another. Tokens carry no expiry.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
}

impl TokenSigner {
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    pub fn sign(&self, salt: &str, value: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(value.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(self.mac(salt, &payload));
        format!("{payload}.{signature}")
    }

    /// Recovers the signed value, or fails with an invalid-signature error
    /// when the token was altered or signed under a different key or salt.
    pub fn verify(&self, salt: &str, token: &str) -> Result<String> {
        let (payload, signature) = token.split_once('.').ok_or(Error::InvalidSignature)?;

        let presented = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| Error::InvalidSignature)?;

        let mut mac = self.keyed_mac(salt);
        mac.update(payload.as_bytes());
        mac.verify_slice(&presented)
            .map_err(|_| Error::InvalidSignature)?;

        let value = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| Error::InvalidSignature)?;
        String::from_utf8(value).map_err(|_| Error::InvalidSignature)
    }

    fn keyed_mac(&self, salt: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(salt.as_bytes());
        mac.update(b".");
        mac
    }

    fn mac(&self, salt: &str, payload: &str) -> Vec<u8> {
        let mut mac = self.keyed_mac(salt);
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

pub fn make_survey_token(signer: &TokenSigner, survey_id: &str) -> String {
    signer.sign(SURVEY_SHARE_SALT, survey_id)
}

pub fn parse_survey_token(signer: &TokenSigner, token: &str) -> Result<String> {
    signer.verify(SURVEY_SHARE_SALT, token)
}
