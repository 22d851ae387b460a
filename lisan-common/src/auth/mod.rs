//! Credentials: password hashing and signed bearer tokens
//!
//! Pure functions plus the token-secret bootstrap. No HTTP framework types
//! live here; request extraction is in the API crate.

pub mod password;
pub mod token;

pub use password::{hash_password, hash_password_with_cost, verify_password, PASSWORD_COST};
pub use token::{
    constant_time_eq, issue_token, load_or_create_token_secret, verify_token, Claims, TokenError,
};
