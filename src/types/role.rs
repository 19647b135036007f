use std::fmt;

use serde::{Deserialize, Serialize};

/// Role a user holds on a survey, granted through a collaborator row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "owner" => Some(Role::Owner),
            "editor" => Some(Role::Editor),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved access a caller has to a single survey.
///
/// The survey's creator is always an implicit owner, independent of any
/// stored collaborator row; everyone else gets the role of their
/// collaborator row, or no role at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurveyAccess {
    pub role: Option<Role>,
}

impl SurveyAccess {
    #[must_use]
    pub const fn none() -> Self {
        Self { role: None }
    }

    #[must_use]
    pub const fn with_role(role: Role) -> Self {
        Self { role: Some(role) }
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.role == Some(Role::Owner)
    }

    #[must_use]
    pub fn can_edit(&self) -> bool {
        matches!(self.role, Some(Role::Owner) | Some(Role::Editor))
    }

    #[must_use]
    pub fn can_view_results(&self) -> bool {
        self.role.is_some()
    }

    #[must_use]
    pub fn can_publish(&self) -> bool {
        self.is_owner()
    }

    #[must_use]
    pub fn can_delete(&self) -> bool {
        self.is_owner()
    }

    #[must_use]
    pub fn can_manage_collaborators(&self) -> bool {
        self.is_owner()
    }
}
