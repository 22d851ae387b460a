//! # Lisan Common Library
//!
//! Shared code for the Lisan language-learning backend:
//! - Database initialization, migrations and models
//! - Configuration loading
//! - Password hashing and bearer-token signing
//! - Learning-path rules (submission scoring, progressive unlock)

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod learning;

pub use error::{Error, Result};
