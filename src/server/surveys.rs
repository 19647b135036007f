use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{CurrentUser, PasswordHasher, RequireUser};
use crate::server::AppState;
use crate::server::access::{
    require_can_delete, require_can_edit, require_can_publish, survey_access,
};
use crate::server::dto::{
    CreateSurveyRequest, ResolvedShareResponse, ShareLinkResponse, SurveyDetail, SurveyListItem,
    UpdateSurveyRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_survey_title;
use crate::share::{make_survey_token, parse_survey_token};
use crate::types::{Collaborator, Role, Survey};

pub fn surveys_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/surveys", get(list_surveys))
        .route("/surveys", post(create_survey))
        .route("/surveys/{id}", get(get_survey))
        .route("/surveys/{id}", patch(update_survey))
        .route("/surveys/{id}", delete(delete_survey))
        .route("/surveys/{id}/publish", post(publish_survey))
        .route("/surveys/{id}/unpublish", post(unpublish_survey))
        .route("/surveys/{id}/share-link", get(share_link))
        .route("/shared/{token}", get(resolve_shared))
}

/// Loads a survey that has not been soft-deleted, or 404.
pub fn load_live_survey(state: &AppState, id: &str) -> Result<Survey, ApiError> {
    let survey = state
        .store
        .get_survey(id)
        .api_err("Failed to load survey")?
        .or_not_found("Survey not found")?;

    if survey.is_deleted {
        return Err(ApiError::not_found("Survey not found"));
    }
    Ok(survey)
}

pub async fn list_surveys(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let surveys = state
        .store
        .list_creator_surveys(&auth.user.id)
        .api_err("Failed to list surveys")?;

    let items: Vec<SurveyListItem> = surveys
        .into_iter()
        .map(|(survey, response_count)| SurveyListItem {
            id: survey.id,
            title: survey.title,
            is_active: survey.is_active,
            response_count,
            created_at: survey.created_at,
            updated_at: survey.updated_at,
        })
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(items)))
}

pub async fn create_survey(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSurveyRequest>,
) -> impl IntoResponse {
    validate_survey_title(&req.title)?;

    let password_hash = match req.password.as_deref() {
        Some(raw) if !raw.is_empty() => Some(
            PasswordHasher::new()
                .hash(raw)
                .api_err("Failed to hash survey password")?,
        ),
        _ => None,
    };

    let now = Utc::now();
    let survey = Survey {
        id: Uuid::new_v4().to_string(),
        creator_id: auth.user.id.clone(),
        title: req.title.trim().to_string(),
        description: req.description.unwrap_or_default(),
        // Surveys start life as drafts; publishing is a separate owner action
        is_active: false,
        is_deleted: false,
        deleted_at: None,
        starts_at: req.starts_at,
        expires_at: req.expires_at,
        max_responses: req.max_responses,
        password_hash,
        whitelist_emails: req.whitelist_emails.unwrap_or_default(),
        allow_review: req.allow_review,
        send_confirmation_email: req.send_confirmation_email,
        one_response_only: req.one_response_only,
        created_at: now,
        updated_at: now,
    };

    state
        .store
        .create_survey(&survey)
        .api_err("Failed to create survey")?;

    // Materialize the creator's owner row up front; legacy rows are covered
    // by the startup backfill.
    state
        .store
        .upsert_collaborator(&Collaborator {
            survey_id: survey.id.clone(),
            user_id: auth.user.id.clone(),
            role: Role::Owner,
            created_at: now,
        })
        .api_err("Failed to record owner")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(survey))))
}

pub async fn get_survey(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let survey = load_live_survey(&state, &id)?;
    let access = survey_access(state.store.as_ref(), user.0.as_ref(), &survey)?;

    let response_count = state
        .store
        .count_responses(&survey.id)
        .api_err("Failed to count responses")?;
    let questions = state
        .store
        .list_questions(&survey.id)
        .api_err("Failed to load questions")?;

    let can_edit = access.can_edit();
    let detail = SurveyDetail {
        id: survey.id.clone(),
        title: survey.title.clone(),
        description: survey.description.clone(),
        is_active: survey.is_active,
        starts_at: survey.starts_at,
        expires_at: survey.expires_at,
        max_responses: survey.max_responses,
        has_password: survey.has_password(),
        allow_review: survey.allow_review,
        send_confirmation_email: survey.send_confirmation_email,
        one_response_only: survey.one_response_only,
        is_expired: survey.is_expired(Utc::now()),
        response_count,
        remaining_slots: survey
            .max_responses
            .map(|max| (max - response_count).max(0)),
        questions,
        can_edit,
        whitelist_emails: can_edit.then(|| survey.whitelist_emails.clone()),
        share_token: can_edit.then(|| make_survey_token(&state.signer, &survey.id)),
        created_at: survey.created_at,
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(detail)))
}

pub async fn update_survey(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSurveyRequest>,
) -> impl IntoResponse {
    let mut survey = load_live_survey(&state, &id)?;
    let access = survey_access(state.store.as_ref(), Some(&auth.user), &survey)?;
    require_can_edit(&access)?;

    if let Some(title) = req.title {
        validate_survey_title(&title)?;
        survey.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        survey.description = description;
    }
    if let Some(starts_at) = req.starts_at {
        survey.starts_at = starts_at;
    }
    if let Some(expires_at) = req.expires_at {
        survey.expires_at = expires_at;
    }
    if let Some(max_responses) = req.max_responses {
        survey.max_responses = max_responses;
    }
    if let Some(whitelist) = req.whitelist_emails {
        survey.whitelist_emails = whitelist;
    }
    if let Some(allow_review) = req.allow_review {
        survey.allow_review = allow_review;
    }
    if let Some(send_confirmation_email) = req.send_confirmation_email {
        survey.send_confirmation_email = send_confirmation_email;
    }
    if let Some(one_response_only) = req.one_response_only {
        survey.one_response_only = one_response_only;
    }
    // Absent = keep the stored hash; empty = drop the gate; otherwise re-hash
    match req.password.as_deref() {
        None => {}
        Some("") => survey.password_hash = None,
        Some(raw) => {
            survey.password_hash = Some(
                PasswordHasher::new()
                    .hash(raw)
                    .api_err("Failed to hash survey password")?,
            );
        }
    }

    state
        .store
        .update_survey(&survey)
        .api_err("Failed to update survey")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(survey)))
}

pub async fn delete_survey(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut survey = load_live_survey(&state, &id)?;
    let access = survey_access(state.store.as_ref(), Some(&auth.user), &survey)?;
    require_can_delete(&access)?;

    // Soft delete: the survey stops accepting responses but rows remain
    survey.is_deleted = true;
    survey.is_active = false;
    survey.deleted_at = Some(Utc::now());

    state
        .store
        .update_survey(&survey)
        .api_err("Failed to delete survey")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn publish_survey(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    set_published(auth, state, id, true).await
}

pub async fn unpublish_survey(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    set_published(auth, state, id, false).await
}

async fn set_published(
    auth: RequireUser,
    state: Arc<AppState>,
    id: String,
    published: bool,
) -> Result<Json<ApiResponse<Survey>>, ApiError> {
    let mut survey = load_live_survey(&state, &id)?;
    let access = survey_access(state.store.as_ref(), Some(&auth.user), &survey)?;
    require_can_publish(&access)?;

    survey.is_active = published;
    state
        .store
        .update_survey(&survey)
        .api_err("Failed to update survey")?;

    Ok(Json(ApiResponse::success(survey)))
}

pub async fn share_link(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let survey = load_live_survey(&state, &id)?;
    let access = survey_access(state.store.as_ref(), Some(&auth.user), &survey)?;
    require_can_edit(&access)?;

    let token = make_survey_token(&state.signer, &survey.id);
    let url = state
        .public_base_url
        .as_ref()
        .map(|base| format!("{base}/api/v1/shared/{token}"));

    Ok::<_, ApiError>(Json(ApiResponse::success(ShareLinkResponse { token, url })))
}

pub async fn resolve_shared(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let survey_id = parse_survey_token(&state.signer, &token)
        .map_err(|_| ApiError::bad_request("Invalid or altered share link"))?;

    let survey = state
        .store
        .get_survey(&survey_id)
        .api_err("Failed to load survey")?
        .or_not_found("Survey not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ResolvedShareResponse {
        survey_id: survey.id,
    })))
}
