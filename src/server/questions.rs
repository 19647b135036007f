use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, patch, post},
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::access::{require_can_edit, survey_access};
use crate::server::dto::{
    AddOptionRequest, CreateQuestionRequest, ReorderQuestionsRequest, UpdateQuestionRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::surveys::load_live_survey;
use crate::server::validation::validate_question_text;
use crate::types::{Question, Survey};

pub fn questions_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/surveys/{id}/questions", post(add_question))
        .route("/surveys/{id}/questions/reorder", post(reorder_questions))
        .route("/questions/{id}", patch(update_question))
        .route("/questions/{id}", delete(delete_question))
        .route("/questions/{id}/options", post(add_option))
        .route("/questions/{id}/options/{index}", delete(remove_option))
}

fn clean_options(options: Vec<String>) -> Vec<String> {
    options
        .into_iter()
        .map(|opt| opt.trim().to_string())
        .filter(|opt| !opt.is_empty())
        .collect()
}

/// Loads a question together with its (live) survey, enforcing edit access.
fn load_editable_question(
    state: &AppState,
    auth: &RequireUser,
    question_id: &str,
) -> Result<(Question, Survey), ApiError> {
    let question = state
        .store
        .get_question(question_id)
        .api_err("Failed to load question")?
        .or_not_found("Question not found")?;

    let survey = load_live_survey(state, &question.survey_id)?;
    let access = survey_access(state.store.as_ref(), Some(&auth.user), &survey)?;
    require_can_edit(&access)?;

    Ok((question, survey))
}

pub async fn add_question(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
    Json(req): Json<CreateQuestionRequest>,
) -> impl IntoResponse {
    let survey = load_live_survey(&state, &survey_id)?;
    let access = survey_access(state.store.as_ref(), Some(&auth.user), &survey)?;
    require_can_edit(&access)?;

    validate_question_text(&req.text)?;

    let order = match req.order {
        Some(order) => order,
        None => state
            .store
            .next_question_order(&survey.id)
            .api_err("Failed to compute question order")?,
    };

    let question = Question {
        id: Uuid::new_v4().to_string(),
        survey_id: survey.id.clone(),
        text: req.text,
        kind: req.kind,
        order,
        is_required: req.is_required,
        subtitle: req.subtitle.unwrap_or_default(),
        media_url: req.media_url.unwrap_or_default(),
        options: clean_options(req.options.unwrap_or_default()),
        created_at: Utc::now(),
    };

    state
        .store
        .create_question(&question)
        .api_err("Failed to create question")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(question))))
}

pub async fn update_question(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateQuestionRequest>,
) -> impl IntoResponse {
    let (mut question, _survey) = load_editable_question(&state, &auth, &id)?;

    if let Some(text) = req.text {
        validate_question_text(&text)?;
        question.text = text;
    }
    if let Some(kind) = req.kind {
        question.kind = kind;
    }
    if let Some(order) = req.order {
        question.order = order;
    }
    if let Some(is_required) = req.is_required {
        question.is_required = is_required;
    }
    if let Some(subtitle) = req.subtitle {
        question.subtitle = subtitle;
    }
    if let Some(media_url) = req.media_url {
        question.media_url = media_url;
    }
    if let Some(options) = req.options {
        question.options = clean_options(options);
    }

    state
        .store
        .update_question(&question)
        .api_err("Failed to update question")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(question)))
}

pub async fn delete_question(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (question, _survey) = load_editable_question(&state, &auth, &id)?;

    state
        .store
        .delete_question(&question.id)
        .api_err("Failed to delete question")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn reorder_questions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<String>,
    Json(req): Json<ReorderQuestionsRequest>,
) -> impl IntoResponse {
    let survey = load_live_survey(&state, &survey_id)?;
    let access = survey_access(state.store.as_ref(), Some(&auth.user), &survey)?;
    require_can_edit(&access)?;

    state
        .store
        .reorder_questions(&survey.id, &req.question_ids)
        .api_err("Failed to reorder questions")?;

    let questions = state
        .store
        .list_questions(&survey.id)
        .api_err("Failed to load questions")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(questions)))
}

pub async fn add_option(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddOptionRequest>,
) -> impl IntoResponse {
    let (mut question, _survey) = load_editable_question(&state, &auth, &id)?;

    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::bad_request("Option text cannot be empty"));
    }

    question.options.push(text);
    state
        .store
        .update_question(&question)
        .api_err("Failed to update question")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(question)))
}

/// Removes an option by position. Later options shift down one slot, so
/// clients must not reuse indices fetched before this call.
pub async fn remove_option(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, usize)>,
) -> impl IntoResponse {
    let (mut question, _survey) = load_editable_question(&state, &auth, &id)?;

    if index >= question.options.len() {
        return Err(ApiError::not_found("No option at that position"));
    }

    question.options.remove(index);
    state
        .store
        .update_question(&question)
        .api_err("Failed to update question")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(question)))
}
