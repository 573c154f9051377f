//! Credential hashing and verification using Argon2id.
//!
//! Locally stored credentials are only ever hashes: the directory bind is the
//! authority on secrets, the local column exists for fallback logins and to
//! satisfy non-null constraints.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{AuthError, AuthResult};

/// Password hashing configuration.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        // OWASP recommended settings for Argon2id
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
            hash_length: 32,
        }
    }
}

impl PasswordPolicy {
    /// Creates a new password policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the memory cost in KiB.
    #[must_use]
    pub const fn memory_cost(mut self, kib: u32) -> Self {
        self.memory_cost = kib;
        self
    }

    /// Sets the time cost (iterations).
    #[must_use]
    pub const fn time_cost(mut self, iterations: u32) -> Self {
        self.time_cost = iterations;
        self
    }

    /// Sets the parallelism factor.
    #[must_use]
    pub const fn parallelism(mut self, p: u32) -> Self {
        self.parallelism = p;
        self
    }

    #[allow(clippy::missing_const_for_fn)] // Params::new is not const
    fn build_params(&self) -> Result<Params, argon2::Error> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.hash_length as usize),
        )
    }
}

/// Password hasher using Argon2id.
#[derive(Debug, Clone)]
pub struct PasswordHasherService {
    policy: PasswordPolicy,
}

impl PasswordHasherService {
    /// Creates a new password hasher with the given policy.
    #[must_use]
    pub const fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    /// Creates a new password hasher with default policy.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(PasswordPolicy::default())
    }

    /// Returns the policy.
    #[must_use]
    pub const fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Hashes a password.
    ///
    /// Returns the PHC-formatted hash string.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        let params = self
            .policy
            .build_params()
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verifies a password against a hash.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedHash` if `hash` is not a PHC string and
    /// `AuthError::InvalidCredentials` if the password does not match.
    pub fn verify(&self, password: &str, hash: &str) -> AuthResult<()> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AuthError::MalformedHash(e.to_string()))?;

        // Argon2::default() can verify any Argon2 variant
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }

    /// Returns true if `password` verifies against `hash`.
    ///
    /// Malformed hashes never match.
    #[must_use]
    pub fn matches(&self, password: &str, hash: &str) -> bool {
        self.verify(password, hash).is_ok()
    }

    /// Checks if a hash needs to be re-hashed.
    ///
    /// Returns `true` for values that are not Argon2id PHC strings or were
    /// created with different parameters.
    #[must_use]
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return true;
        };

        if parsed.algorithm != argon2::ARGON2ID_IDENT {
            return true;
        }

        let params = &parsed.params;
        let m_cost = params.get_decimal("m").unwrap_or(0);
        let t_cost = params.get_decimal("t").unwrap_or(0);
        let p_cost = params.get_decimal("p").unwrap_or(0);

        m_cost != self.policy.memory_cost
            || t_cost != self.policy.time_cost
            || p_cost != self.policy.parallelism
    }
}

impl Default for PasswordHasherService {
    fn default() -> Self {
        Self::with_defaults()
    }
}
