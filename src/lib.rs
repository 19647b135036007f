//! # Canvass
//!
//! A survey server, usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! canvass = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use canvass::captcha::CaptchaVerifier;
//! use canvass::mail::LogMailer;
//! use canvass::server::{AppState, create_router};
//! use canvass::share::TokenSigner;
//! use canvass::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/canvass.db").unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(
//!     Arc::new(store),
//!     TokenSigner::new(*b"replace-with-a-32-byte-secret-ke"),
//!     CaptchaVerifier::Static { allow: true },
//!     Arc::new(LogMailer),
//!     None,
//! ));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod auth;
pub mod captcha;
pub mod config;
pub mod error;
pub mod form;
pub mod mail;
pub mod report;
pub mod server;
pub mod share;
pub mod store;
pub mod types;
