//! Verification secret codes

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of a generated email verification code
pub const SECRET_CODE_LEN: usize = 32;

/// Generate a random alphanumeric secret code.
pub fn random_secret_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_CODE_LEN)
        .map(char::from)
        .collect()
}
