pub mod access;
mod accounts;
mod collaborators;
pub mod dto;
mod questions;
pub mod response;
mod results;
mod router;
mod surveys;
mod take;
pub mod validation;

pub use accounts::accounts_router;
pub use collaborators::collaborators_router;
pub use questions::questions_router;
pub use results::results_router;
pub use router::{AppState, create_router};
pub use surveys::surveys_router;
pub use take::take_router;
