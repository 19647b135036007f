use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};

use crate::auth::RequireUser;
use crate::report::{compute_stats, render_csv};
use crate::server::AppState;
use crate::server::access::{require_can_view_results, survey_access};
use crate::server::dto::StatsResponse;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::surveys::load_live_survey;
use crate::types::{Question, Response, Survey};

pub fn results_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/surveys/{id}/results", get(survey_results))
        .route("/surveys/{id}/export.csv", get(export_csv))
}

fn load_results_data(
    state: &AppState,
    auth: &RequireUser,
    survey_id: &str,
) -> Result<(Survey, Vec<Question>, Vec<Response>), ApiError> {
    let survey = load_live_survey(state, survey_id)?;
    let access = survey_access(state.store.as_ref(), Some(&auth.user), &survey)?;
    require_can_view_results(&access)?;

    let questions = state
        .store
        .list_questions(&survey.id)
        .api_err("Failed to load questions")?;
    let responses = state
        .store
        .list_responses(&survey.id)
        .api_err("Failed to load responses")?;

    Ok((survey, questions, responses))
}

pub async fn survey_results(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (survey, questions, responses) = load_results_data(&state, &auth, &id)?;

    let stats = compute_stats(&questions, &responses);

    Ok::<_, ApiError>(Json(ApiResponse::success(StatsResponse {
        survey_id: survey.id,
        total_responses: responses.len(),
        questions: stats,
    })))
}

pub async fn export_csv(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (survey, questions, responses) = load_results_data(&state, &auth, &id)?;

    let csv = render_csv(&questions, &responses);
    let filename = format!("survey_{}_results.csv", survey.id);

    Ok::<_, ApiError>((
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    ))
}
