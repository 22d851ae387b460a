//! bcrypt password hashes

use crate::{Error, Result};

/// Work factor for stored passwords
pub const PASSWORD_COST: u32 = 10;

/// Hash a plaintext password at [`PASSWORD_COST`]
pub fn hash_password(password: &str) -> Result<String> {
    hash_password_with_cost(password, PASSWORD_COST)
}

/// Hash with an explicit bcrypt cost (4..=31)
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a plaintext password against a stored hash
///
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
