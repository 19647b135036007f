mod password;
mod session;

pub use password::PasswordHasher;
pub use session::{
    ActiveSession, AuthError, ClientIp, CurrentUser, RequireUser, SESSION_HEADER, SessionId,
    session_layer,
};
