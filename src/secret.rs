//! Random secret generation

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;

/// Length used when the config does not say otherwise
pub const DEFAULT_LENGTH: usize = 20;

/// Generate an alphanumeric password from the OS random source.
///
/// Every call is independent; two calls never share state.
pub fn generate_secure_password(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
