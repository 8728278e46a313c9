//! Credential generation for provisioned resources.
//!
//! Passwords are generated fresh for every call and returned to the caller
//! exactly once; they are never persisted by the control plane.

use rand::Rng;

/// Characters used for generated passwords. Deliberately excludes quotes,
/// backslashes, and whitespace so values can be embedded in SQL string
/// literals and command arguments without escaping.
pub const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+";

/// Length of generated passwords.
pub const PASSWORD_LENGTH: usize = 24;

/// Number of random bytes behind a termination token (48 hex chars).
const TOKEN_BYTES: usize = 24;

/// Generate a random password from [`PASSWORD_ALPHABET`].
///
/// Each call draws independently; two calls never intentionally share
/// output.
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_ALPHABET.len());
            PASSWORD_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a random confirmation token as lowercase hex.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes[..]);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
