//! Registration, login, MFA enrolment and session endpoints.

mod cookie;
pub mod login;
pub mod mfa;
pub mod register;
pub mod session;
mod state;
pub mod types;

pub use state::{AuthConfig, AuthState};
