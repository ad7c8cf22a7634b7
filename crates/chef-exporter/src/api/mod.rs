//! HTTP route handlers

pub mod error;
pub mod landing;
pub mod metrics;
