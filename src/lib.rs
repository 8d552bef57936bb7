pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod pdf;
pub mod services;
pub mod state;
pub mod store;

#[cfg(test)]
pub mod testing;
