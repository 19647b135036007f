use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;

use crate::server::AppState;
use crate::types::{Session, SessionData, User};

/// Header carrying the opaque per-browser session id. The server echoes the
/// id on every response so clients can persist it.
pub const SESSION_HEADER: &str = "x-session-id";

/// The request's session id, inserted by `session_layer`.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

/// The request's session row, loaded from the store.
pub struct ActiveSession(pub Session);

/// The logged-in account bound to the session, if any.
pub struct CurrentUser(pub Option<User>);

/// Extractor that requires a logged-in, activated account.
pub struct RequireUser {
    pub session: Session,
    pub user: User,
}

/// Best-effort client address: first `X-Forwarded-For` entry, else the
/// socket peer address.
pub struct ClientIp(pub Option<String>);

#[derive(Debug)]
pub enum AuthError {
    Unauthenticated,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });
        (status, Json(body)).into_response()
    }
}

/// Ensures every request under the router has a live session row and an id
/// the client can hold on to. Unknown or absent ids get a fresh session.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let id = match presented {
        Some(id) if matches!(state.store.get_session(&id), Ok(Some(_))) => id,
        _ => {
            let session = Session::fresh();
            if let Err(e) = state.store.create_session(&session) {
                tracing::error!("Failed to create session: {e}");
            }
            session.id
        }
    };

    request.extensions_mut().insert(SessionId(id.clone()));
    let mut response = next.run(request).await;

    if let Ok(value) = id.parse() {
        response.headers_mut().insert(SESSION_HEADER, value);
    }

    response
}

fn load_session(parts: &Parts, state: &Arc<AppState>) -> Result<Session, AuthError> {
    let SessionId(id) = parts
        .extensions
        .get::<SessionId>()
        .ok_or(AuthError::InternalError)?;

    match state.store.get_session(id) {
        Ok(Some(session)) => Ok(session),
        // The row can vanish between the layer and the handler; hand out an
        // empty session under the same id and let the next save recreate it.
        Ok(None) => {
            let now = Utc::now();
            Ok(Session {
                id: id.clone(),
                data: SessionData::default(),
                created_at: now,
                updated_at: now,
            })
        }
        Err(e) => {
            tracing::error!("Failed to load session: {e}");
            Err(AuthError::InternalError)
        }
    }
}

fn load_session_user(session: &Session, state: &Arc<AppState>) -> Result<Option<User>, AuthError> {
    let Some(user_id) = session.data.user_id.as_deref() else {
        return Ok(None);
    };

    state
        .store
        .get_user(user_id)
        .map_err(|_| AuthError::InternalError)
}

impl FromRequestParts<Arc<AppState>> for ActiveSession {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(ActiveSession(load_session(parts, state)?))
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = load_session(parts, state)?;
        Ok(CurrentUser(load_session_user(&session, state)?))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = load_session(parts, state)?;
        let user = load_session_user(&session, state)?.ok_or(AuthError::Unauthenticated)?;
        Ok(RequireUser { session, user })
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        Ok(ClientIp(ip))
    }
}
