//! The respondent-facing collection flow: a gate chain evaluated per
//! request, short-circuiting on the first violation, followed by validation
//! and persistence on submit.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{ActiveSession, ClientIp, CurrentUser, PasswordHasher};
use crate::form::{build_form, resolve_submission};
use crate::mail::OutboundMail;
use crate::server::AppState;
use crate::server::dto::{
    NextStep, ReviewItem, ReviewResponse, SubmissionReceipt, SubmitRequest, SurveyPasswordRequest,
    TakeView,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::{Response, Session, Survey, User};

pub fn take_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/surveys/{id}/form", get(view_form))
        .route("/surveys/{id}/password", post(submit_password))
        .route("/surveys/{id}/responses", post(submit_response))
        .route("/responses/{id}", get(review_response))
}

/// Where the duplicate-submission gate sends a respondent who already has a
/// response on file.
fn already_submitted(survey: &Survey, response_id: String) -> TakeView {
    let next = if survey.allow_review {
        NextStep::Review
    } else if survey.send_confirmation_email {
        NextStep::ThankYou
    } else {
        NextStep::Survey
    };
    TakeView::AlreadySubmitted {
        next,
        response_id: Some(response_id),
    }
}

/// Runs the gate chain against current persisted state. Returns the blocking
/// view, or `None` when the caller may proceed to the form/submission.
///
/// The chain reads the store without any transaction around it; two
/// concurrent submissions from the same identity can both pass the
/// duplicate gate before either writes its row.
fn evaluate_gates(
    state: &AppState,
    survey: &Survey,
    user: Option<&User>,
    session: &Session,
    ip: Option<&str>,
) -> Result<Option<TakeView>, ApiError> {
    let store = state.store.as_ref();
    let now = Utc::now();

    // Unpublished and soft-deleted surveys read as closed, not missing
    if !survey.is_active || survey.is_deleted {
        return Ok(Some(TakeView::Closed));
    }

    if let Some(starts_at) = survey.starts_at {
        if starts_at > now {
            return Ok(Some(TakeView::NotYetOpen { starts_at }));
        }
    }

    let whitelist = survey.whitelist();
    if !whitelist.is_empty() {
        match user {
            None => return Ok(Some(TakeView::LoginRequired)),
            Some(user) => {
                let email = user.email.trim().to_lowercase();
                if email.is_empty()
                    || (!whitelist.contains(&email) && user.id != survey.creator_id)
                {
                    return Ok(Some(TakeView::NotWhitelisted));
                }
            }
        }
    }

    if let Some(max) = survey.max_responses {
        let count = store
            .count_responses(&survey.id)
            .api_err("Failed to count responses")?;
        if count >= max {
            return Ok(Some(TakeView::CapacityReached));
        }
    }

    if survey.has_password() && !session.data.password_grants.contains(&survey.id) {
        return Ok(Some(TakeView::PasswordRequired));
    }

    if survey.is_expired(now) {
        return Ok(Some(TakeView::Expired));
    }

    if survey.one_response_only {
        match user {
            Some(user) => {
                let existing = store
                    .find_user_response(&survey.id, &user.id)
                    .api_err("Failed to check previous responses")?;
                if let Some(existing) = existing {
                    if user.id == survey.creator_id {
                        return Ok(Some(TakeView::AlreadySubmitted {
                            next: NextStep::Results,
                            response_id: Some(existing.id),
                        }));
                    }
                    return Ok(Some(already_submitted(survey, existing.id)));
                }
            }
            None => {
                // Session marker first, source address as the cross-session
                // fallback
                if let Some(response_id) = session.data.completed.get(&survey.id) {
                    return Ok(Some(already_submitted(survey, response_id.clone())));
                }
                if let Some(ip) = ip {
                    let existing = store
                        .find_anonymous_response_by_ip(&survey.id, ip)
                        .api_err("Failed to check previous responses")?;
                    if let Some(existing) = existing {
                        return Ok(Some(already_submitted(survey, existing.id)));
                    }
                }
            }
        }
    }

    Ok(None)
}

pub async fn view_form(
    user: CurrentUser,
    ActiveSession(session): ActiveSession,
    ClientIp(ip): ClientIp,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let survey = state
        .store
        .get_survey(&id)
        .api_err("Failed to load survey")?
        .or_not_found("Survey not found")?;

    if let Some(blocked) =
        evaluate_gates(&state, &survey, user.0.as_ref(), &session, ip.as_deref())?
    {
        return Ok::<_, ApiError>(Json(blocked));
    }

    let questions = state
        .store
        .list_questions(&survey.id)
        .api_err("Failed to load questions")?;

    Ok(Json(TakeView::Open {
        survey_id: survey.id.clone(),
        title: survey.title.clone(),
        description: survey.description.clone(),
        fields: build_form(&questions),
        captcha_required: user.0.is_none(),
    }))
}

pub async fn submit_password(
    ActiveSession(mut session): ActiveSession,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SurveyPasswordRequest>,
) -> impl IntoResponse {
    let survey = state
        .store
        .get_survey(&id)
        .api_err("Failed to load survey")?
        .or_not_found("Survey not found")?;

    if !survey.is_active || survey.is_deleted {
        return Err(ApiError::conflict("Survey is closed"));
    }

    let Some(hash) = survey.password_hash.as_deref().filter(|h| !h.is_empty()) else {
        return Err(ApiError::bad_request("This survey has no password"));
    };

    let verified = PasswordHasher::new()
        .verify(&req.password, hash)
        .unwrap_or(false);
    if !verified {
        return Err(ApiError::bad_request("Incorrect password, try again"));
    }

    // Grant lasts for the rest of the session; the client re-requests the form
    session.data.password_grants.insert(survey.id.clone());
    state
        .store
        .save_session(&session)
        .api_err("Failed to save session")?;

    Ok::<_, ApiError>(Json(ApiResponse::success("Password accepted")))
}

pub async fn submit_response(
    user: CurrentUser,
    ActiveSession(mut session): ActiveSession,
    ClientIp(ip): ClientIp,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<HttpResponse, ApiError> {
    let survey = state
        .store
        .get_survey(&id)
        .api_err("Failed to load survey")?
        .or_not_found("Survey not found")?;

    let user = user.0;
    if let Some(blocked) = evaluate_gates(&state, &survey, user.as_ref(), &session, ip.as_deref())?
    {
        return Ok((StatusCode::CONFLICT, Json(blocked)).into_response());
    }

    // Anonymous submissions must clear the bot check before anything else is
    // looked at
    if user.is_none() {
        let Some(token) = req.captcha_token.as_deref().filter(|t| !t.is_empty()) else {
            return Err(ApiError::bad_request("Complete the captcha verification"));
        };
        match state.captcha.verify(token, ip.as_deref()).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(ApiError::bad_request(
                    "Captcha verification failed, please try again",
                ));
            }
            Err(e) => {
                tracing::warn!("captcha verification unavailable: {e}");
                return Err(ApiError::unavailable(
                    "Could not verify captcha, please try again later",
                ));
            }
        }
    }

    let questions = state
        .store
        .list_questions(&survey.id)
        .api_err("Failed to load questions")?;

    let answers = resolve_submission(&questions, &req.answers).map_err(ApiError::unprocessable)?;

    let response = Response {
        id: Uuid::new_v4().to_string(),
        survey_id: survey.id.clone(),
        respondent_id: user.as_ref().map(|u| u.id.clone()),
        ip_address: ip,
        answers,
        submitted_at: Utc::now(),
    };
    state
        .store
        .create_response(&response)
        .api_err("Failed to save response")?;

    session
        .data
        .completed
        .insert(survey.id.clone(), response.id.clone());
    state
        .store
        .save_session(&session)
        .api_err("Failed to save session")?;

    let next = if survey.allow_review {
        NextStep::Review
    } else if survey.send_confirmation_email {
        // Best-effort; a failed email never fails the submission
        if let Some(email) = user.as_ref().map(|u| u.email.as_str()).filter(|e| !e.is_empty())
        {
            let mail = OutboundMail {
                to: email.to_string(),
                subject: format!("Thanks for completing: {}", survey.title),
                body: format!(
                    "Thank you for completing \"{}\". Your response has been recorded.",
                    survey.title
                ),
            };
            if let Err(e) = state.mailer.send(mail) {
                tracing::warn!("Failed to send confirmation email: {e}");
            }
        }
        NextStep::ThankYou
    } else {
        NextStep::Survey
    };

    let receipt = SubmissionReceipt {
        response_id: response.id,
        next,
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(receipt))).into_response())
}

pub async fn review_response(
    user: CurrentUser,
    ClientIp(ip): ClientIp,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let response = state
        .store
        .get_response(&id)
        .api_err("Failed to load response")?
        .or_not_found("Response not found")?;

    let survey = state
        .store
        .get_survey(&response.survey_id)
        .api_err("Failed to load survey")?
        .or_not_found("Survey not found")?;

    let user = user.0;
    let is_creator = user.as_ref().is_some_and(|u| u.id == survey.creator_id);

    if !survey.allow_review && !is_creator {
        return Err(ApiError::forbidden(
            "This survey does not allow reviewing responses",
        ));
    }

    let allowed = match &user {
        Some(user) => response.respondent_id.as_deref() == Some(user.id.as_str()) || is_creator,
        None => {
            response.respondent_id.is_none()
                && response.ip_address.is_some()
                && response.ip_address == ip
        }
    };
    if !allowed {
        return Err(ApiError::forbidden("You cannot view this response"));
    }

    let questions = state
        .store
        .list_questions(&survey.id)
        .api_err("Failed to load questions")?;

    let items: Vec<ReviewItem> = questions
        .iter()
        .filter(|q| q.kind.is_answerable())
        .map(|q| ReviewItem {
            question_id: q.id.clone(),
            text: q.text.clone(),
            kind: q.kind,
            answer: response.answers.get(&q.id).cloned(),
        })
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(ReviewResponse {
        response_id: response.id,
        survey_id: survey.id,
        survey_title: survey.title,
        submitted_at: response.submitted_at,
        items,
    })))
}
