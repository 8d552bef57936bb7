pub mod auth;
pub mod gate;

pub use auth::{require_auth, AuthContext};
pub use gate::request_gate;
