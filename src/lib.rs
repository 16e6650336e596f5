pub mod app;
pub mod artifacts;
pub mod auth;
pub mod config;
pub mod deploy;
pub mod fabric;
pub mod rewrite;
pub mod shared;
