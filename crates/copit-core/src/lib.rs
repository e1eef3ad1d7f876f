//! Core library for copit: GitHub login, API access and the local stores
//! behind the terminal UI.

pub mod api;
pub mod auth;
pub mod config;
pub mod download;
pub mod local_files;
pub mod models;
pub mod store;

pub use config::Config;
