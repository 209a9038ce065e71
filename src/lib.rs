pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod memory;
pub mod rate_limit;
pub mod state;
pub mod todos;
pub mod validation;
