//! REST API client module for the shop-management backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! backend API: authentication (login, profile, token refresh) and the
//! dashboard data fetches.
//!
//! Every endpoint wraps its payload in a `{succeeded, data, message}`
//! envelope; the client unwraps it into a typed result.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
