pub mod auth;
pub mod config;
pub mod crypto;
pub mod database;
pub mod errors;
pub mod jobs;
pub mod server;
pub mod services;
