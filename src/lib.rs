// src/lib.rs

//! PromoPilot automation pipeline library

pub mod actions;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod services;
pub mod store;
pub mod utils;
