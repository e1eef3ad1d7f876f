//! REST client for the GitHub API.
//!
//! This module provides the `ApiClient` for listing repositories, browsing
//! repository contents and downloading files. Requests are authorized with
//! an OAuth token obtained through the device flow in [`crate::auth`].

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
