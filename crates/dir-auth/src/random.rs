//! Random opaque secrets.
//!
//! Accounts whose secret is not synchronized still need a value in a
//! non-null credential column. They receive the hash of a random secret
//! that is discarded immediately, so it can never be used to log in.

use rand::distr::{Alphanumeric, SampleString};

/// Length of generated placeholder secrets.
pub const PLACEHOLDER_SECRET_LENGTH: usize = 64;

/// Generates a cryptographically secure random alphanumeric string.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a placeholder secret for accounts without a synchronized one.
///
/// The value has about 380 bits of entropy (log2(62^64)).
#[must_use]
pub fn placeholder_secret() -> String {
    random_alphanumeric(PLACEHOLDER_SECRET_LENGTH)
}
