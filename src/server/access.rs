use crate::server::response::{ApiError, StoreResultExt};
use crate::store::Store;
use crate::types::{Role, Survey, SurveyAccess, User};

/// Resolves the caller's access to a survey.
///
/// The creator is always an owner, independent of any stored collaborator
/// row; other users get the role of their row, if one exists. Pure read, no
/// side effects.
pub fn survey_access(
    store: &dyn Store,
    user: Option<&User>,
    survey: &Survey,
) -> Result<SurveyAccess, ApiError> {
    let Some(user) = user else {
        return Ok(SurveyAccess::none());
    };

    if survey.creator_id == user.id {
        return Ok(SurveyAccess::with_role(Role::Owner));
    }

    let role = store
        .get_collaborator(&survey.id, &user.id)
        .api_err("Failed to check collaborator")?
        .map(|c| c.role);

    Ok(SurveyAccess { role })
}

pub fn require_can_edit(access: &SurveyAccess) -> Result<(), ApiError> {
    if !access.can_edit() {
        return Err(ApiError::forbidden("You cannot edit this survey"));
    }
    Ok(())
}

pub fn require_can_view_results(access: &SurveyAccess) -> Result<(), ApiError> {
    if !access.can_view_results() {
        return Err(ApiError::forbidden(
            "You cannot view this survey's results",
        ));
    }
    Ok(())
}

pub fn require_can_publish(access: &SurveyAccess) -> Result<(), ApiError> {
    if !access.can_publish() {
        return Err(ApiError::forbidden("Only the owner can publish or unpublish"));
    }
    Ok(())
}

pub fn require_can_delete(access: &SurveyAccess) -> Result<(), ApiError> {
    if !access.can_delete() {
        return Err(ApiError::forbidden("Only the owner can delete this survey"));
    }
    Ok(())
}

pub fn require_can_manage_collaborators(access: &SurveyAccess) -> Result<(), ApiError> {
    if !access.can_manage_collaborators() {
        return Err(ApiError::forbidden(
            "Only the owner can manage collaborators",
        ));
    }
    Ok(())
}
