use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{ActiveSession, PasswordHasher, RequireUser};
use crate::mail::OutboundMail;
use crate::server::AppState;
use crate::server::dto::{
    ActivateRequest, LoginRequest, PasswordResetConfirmRequest, PasswordResetRequest,
    RegisterRequest, UserResponse,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_account_password, validate_email, validate_username};
use crate::share::{ACCOUNT_ACTIVATE_SALT, PASSWORD_RESET_SALT};
use crate::types::User;

pub fn accounts_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts/register", post(register))
        .route("/accounts/activate", post(activate))
        .route("/accounts/login", post(login))
        .route("/accounts/logout", post(logout))
        .route("/accounts/me", get(me))
        .route(
            "/accounts/password-reset/request",
            post(request_password_reset),
        )
        .route(
            "/accounts/password-reset/confirm",
            post(confirm_password_reset),
        )
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    validate_username(&req.username)?;
    validate_email(&req.email)?;
    validate_account_password(&req.password)?;

    let store = state.store.as_ref();

    if store
        .get_user_by_username(&req.username)
        .api_err("Failed to check username")?
        .is_some()
    {
        return Err(ApiError::conflict("Username is already taken"));
    }
    if store
        .get_user_by_email(&req.email)
        .api_err("Failed to check email")?
        .is_some()
    {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = PasswordHasher::new()
        .hash(&req.password)
        .api_err("Failed to hash password")?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        email: req.email.trim().to_string(),
        password_hash,
        is_active: false,
        created_at: now,
        updated_at: now,
    };

    store.create_user(&user).api_err("Failed to create user")?;

    // Activation is delivered by email; the account stays inactive until the
    // token comes back.
    let token = state.signer.sign(ACCOUNT_ACTIVATE_SALT, &user.id);
    let body = match &state.public_base_url {
        Some(base) => format!(
            "Welcome to Canvass, {}!\n\nActivate your account:\n{}/api/v1/accounts/activate?token={}\n",
            user.username, base, token
        ),
        None => format!(
            "Welcome to Canvass, {}!\n\nYour activation token:\n{}\n",
            user.username, token
        ),
    };
    if let Err(e) = state.mailer.send(OutboundMail {
        to: user.email.clone(),
        subject: "Confirm your Canvass account".to_string(),
        body,
    }) {
        tracing::warn!("Failed to send activation email to {}: {e}", user.email);
    }

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserResponse::from(user))),
    ))
}

pub async fn activate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivateRequest>,
) -> impl IntoResponse {
    let user_id = state
        .signer
        .verify(ACCOUNT_ACTIVATE_SALT, &req.token)
        .map_err(|_| ApiError::bad_request("Invalid activation token"))?;

    let mut user = state
        .store
        .get_user(&user_id)
        .api_err("Failed to load user")?
        .or_not_found("Account not found")?;

    if !user.is_active {
        user.is_active = true;
        state
            .store
            .update_user(&user)
            .api_err("Failed to activate account")?;
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(UserResponse::from(user))))
}

pub async fn login(
    ActiveSession(mut session): ActiveSession,
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let user = store
        .get_user_by_username(&req.identifier)
        .api_err("Failed to look up user")?
        .map_or_else(
            || store.get_user_by_email(&req.identifier),
            |u| Ok(Some(u)),
        )
        .api_err("Failed to look up user")?;

    let Some(user) = user else {
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    let verified = PasswordHasher::new()
        .verify(&req.password, &user.password_hash)
        .unwrap_or(false);
    if !verified {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !user.is_active {
        return Err(ApiError::forbidden(
            "Account is not activated; check your email",
        ));
    }

    session.data.user_id = Some(user.id.clone());
    state
        .store
        .save_session(&session)
        .api_err("Failed to save session")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(UserResponse::from(user))))
}

pub async fn logout(
    ActiveSession(mut session): ActiveSession,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    session.data.user_id = None;
    state
        .store
        .save_session(&session)
        .api_err("Failed to save session")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn me(auth: RequireUser) -> impl IntoResponse {
    Json(ApiResponse::success(UserResponse::from(auth.user)))
}

pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> impl IntoResponse {
    validate_email(&req.email)?;

    // Do not reveal whether the address exists.
    if let Some(user) = state
        .store
        .get_user_by_email(&req.email)
        .api_err("Failed to look up user")?
    {
        let token = state.signer.sign(PASSWORD_RESET_SALT, &user.id);
        let body = match &state.public_base_url {
            Some(base) => format!(
                "A password reset was requested for your account.\n\n{base}/reset?token={token}\n"
            ),
            None => format!("A password reset was requested.\n\nToken:\n{token}\n"),
        };
        if let Err(e) = state.mailer.send(OutboundMail {
            to: user.email.clone(),
            subject: "Reset your Canvass password".to_string(),
            body,
        }) {
            tracing::warn!("Failed to send reset email to {}: {e}", user.email);
        }
    }

    Ok::<_, ApiError>((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(
            "If the address is registered, a reset link has been sent",
        )),
    ))
}

pub async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetConfirmRequest>,
) -> impl IntoResponse {
    let user_id = state
        .signer
        .verify(PASSWORD_RESET_SALT, &req.token)
        .map_err(|_| ApiError::bad_request("Invalid reset token"))?;

    validate_account_password(&req.password)?;

    let mut user = state
        .store
        .get_user(&user_id)
        .api_err("Failed to load user")?
        .or_not_found("Account not found")?;

    user.password_hash = PasswordHasher::new()
        .hash(&req.password)
        .api_err("Failed to hash password")?;
    state
        .store
        .update_user(&user)
        .api_err("Failed to update password")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(UserResponse::from(user))))
}
