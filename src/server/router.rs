use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::accounts::accounts_router;
use super::collaborators::collaborators_router;
use super::questions::questions_router;
use super::results::results_router;
use super::surveys::surveys_router;
use super::take::take_router;
use crate::auth::session_layer;
use crate::captcha::CaptchaVerifier;
use crate::mail::Mailer;
use crate::share::TokenSigner;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub signer: TokenSigner,
    pub captcha: CaptchaVerifier,
    pub mailer: Arc<dyn Mailer>,
    /// Public base URL for external access. Used for share links and email
    /// bodies. If not set, responses carry bare tokens instead of URLs.
    pub public_base_url: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        signer: TokenSigner,
        captcha: CaptchaVerifier,
        mailer: Arc<dyn Mailer>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            store,
            signer,
            captcha,
            mailer,
            public_base_url,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Sessions only exist for API routes; health checks stay stateless
    let api = Router::new()
        .nest("/api/v1", accounts_router())
        .nest("/api/v1", surveys_router())
        .nest("/api/v1", questions_router())
        .nest("/api/v1", collaborators_router())
        .nest("/api/v1", take_router())
        .nest("/api/v1", results_router())
        .layer(middleware::from_fn_with_state(state.clone(), session_layer));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
