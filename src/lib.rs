// Inkpost - ownership-checked blog backend

// Core types and primitives
pub mod core;

// Storage, identity and request plumbing
pub mod infrastructure;

// Typed entity access and ownership checks
pub mod framework;

// Domain records and their collections
pub mod entities;
pub mod models;

// Post, comment and account operations
pub mod services;

// HTTP surface
pub mod app_state;
pub mod blog_interface;

// Common utilities
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
