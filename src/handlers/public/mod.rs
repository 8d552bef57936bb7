// Public handlers: token acquisition and account creation. No trusted
// caller context exists here, so every input is validated.
pub mod auth;
