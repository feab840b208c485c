// docs-auth - Library root

pub mod config;
pub mod error;
pub mod auth;
pub mod render;
pub mod ui;
