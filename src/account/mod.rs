//! Account lifecycle: registration and the login state machine.

mod login;
mod password;
mod register;

pub use login::{LoginCoordinator, LoginOutcome};
pub use password::{Argon2Hasher, PasswordHasher};
pub use register::Registrar;
