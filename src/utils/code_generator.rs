//! Short code generation.
//!
//! Codes are drawn from a cryptographically secure generator over an
//! alphanumeric alphabet. The generator never checks for existing codes;
//! uniqueness is enforced by the storage layer.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Number of characters in a generated short code.
pub const CODE_LENGTH: usize = 15;

/// Generates a random short code of [`CODE_LENGTH`] characters.
///
/// Uses the thread-local CSPRNG (`rand::rng()`), which is seeded from the
/// operating system and periodically reseeded.
///
/// # Examples
///
/// ```
/// use shortener_core::utils::code_generator::{generate_code, CODE_LENGTH};
///
/// let code = generate_code();
/// assert_eq!(code.len(), CODE_LENGTH);
/// assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(char::from)
        .collect()
}
