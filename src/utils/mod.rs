//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use url::{get_domain, is_http, resolve};
