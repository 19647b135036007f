mod answer;
mod models;
mod role;

pub use answer::{Answer, AnswerMap};
pub use models::*;
pub use role::{Role, SurveyAccess};
