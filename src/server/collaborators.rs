use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use chrono::Utc;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::access::{require_can_manage_collaborators, survey_access};
use crate::server::dto::{
    AddCollaboratorRequest, CollaboratorResponse, UpdateCollaboratorRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::surveys::load_live_survey;
use crate::types::{Collaborator, Role, Survey};

pub fn collaborators_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/surveys/{id}/collaborators", get(list_collaborators))
        .route("/surveys/{id}/collaborators", post(add_collaborator))
        .route(
            "/surveys/{id}/collaborators/{user_id}",
            patch(update_collaborator),
        )
        .route(
            "/surveys/{id}/collaborators/{user_id}",
            delete(remove_collaborator),
        )
}

fn load_managed_survey(
    state: &AppState,
    auth: &RequireUser,
    survey_id: &str,
) -> Result<Survey, ApiError> {
    let survey = load_live_survey(state, survey_id)?;
    let access = survey_access(state.store.as_ref(), Some(&auth.user), &survey)?;
    require_can_manage_collaborators(&access)?;
    Ok(survey)
}

pub async fn list_collaborators(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let survey = load_managed_survey(&state, &auth, &id)?;

    let entries = state
        .store
        .list_collaborators(&survey.id)
        .api_err("Failed to list collaborators")?;

    let items: Vec<CollaboratorResponse> = entries
        .into_iter()
        .map(|(collab, user)| CollaboratorResponse {
            user_id: user.id,
            username: user.username,
            email: user.email,
            role: collab.role,
            created_at: collab.created_at,
        })
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(items)))
}

pub async fn add_collaborator(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddCollaboratorRequest>,
) -> impl IntoResponse {
    let survey = load_managed_survey(&state, &auth, &id)?;
    let store = state.store.as_ref();

    let identifier = req.user.trim();
    if identifier.is_empty() {
        return Err(ApiError::bad_request("Provide a username or email"));
    }

    let user = store
        .get_user_by_username(identifier)
        .api_err("Failed to look up user")?
        .map_or_else(|| store.get_user_by_email(identifier), |u| Ok(Some(u)))
        .api_err("Failed to look up user")?
        .or_not_found("No user with that username or email")?;

    // The creator is always an owner; adding them just materializes the row
    let role = if user.id == survey.creator_id {
        Role::Owner
    } else {
        req.role.unwrap_or(Role::Viewer)
    };

    let collab = Collaborator {
        survey_id: survey.id.clone(),
        user_id: user.id.clone(),
        role,
        created_at: Utc::now(),
    };
    store
        .upsert_collaborator(&collab)
        .api_err("Failed to save collaborator")?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(CollaboratorResponse {
            user_id: user.id,
            username: user.username,
            email: user.email,
            role,
            created_at: collab.created_at,
        })),
    ))
}

pub async fn update_collaborator(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, String)>,
    Json(req): Json<UpdateCollaboratorRequest>,
) -> impl IntoResponse {
    let survey = load_managed_survey(&state, &auth, &id)?;
    let store = state.store.as_ref();

    if user_id == survey.creator_id {
        return Err(ApiError::conflict(
            "The creator's owner role cannot be changed",
        ));
    }

    let mut collab = store
        .get_collaborator(&survey.id, &user_id)
        .api_err("Failed to load collaborator")?
        .or_not_found("Collaborator not found")?;

    // Demoting the last owner would leave the survey unmanageable
    if collab.role == Role::Owner && req.role != Role::Owner {
        let owners = store
            .count_owner_rows(&survey.id)
            .api_err("Failed to count owners")?;
        if owners <= 1 {
            return Err(ApiError::conflict(
                "Cannot demote the last owner of the survey",
            ));
        }
    }

    collab.role = req.role;
    store
        .upsert_collaborator(&collab)
        .api_err("Failed to save collaborator")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(collab)))
}

pub async fn remove_collaborator(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let survey = load_managed_survey(&state, &auth, &id)?;
    let store = state.store.as_ref();

    if user_id == survey.creator_id {
        return Err(ApiError::conflict(
            "The creator cannot be removed from the owners",
        ));
    }

    let collab = store
        .get_collaborator(&survey.id, &user_id)
        .api_err("Failed to load collaborator")?
        .or_not_found("Collaborator not found")?;

    if collab.role == Role::Owner {
        let owners = store
            .count_owner_rows(&survey.id)
            .api_err("Failed to count owners")?;
        if owners <= 1 {
            return Err(ApiError::conflict(
                "Cannot remove the last owner of the survey",
            ));
        }
    }

    store
        .delete_collaborator(&survey.id, &user_id)
        .api_err("Failed to remove collaborator")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
