// Protected handlers. All routes here sit behind the authenticated handler
// wrapper and receive a resolved AuthContext.
pub mod auth;
pub mod devis;
