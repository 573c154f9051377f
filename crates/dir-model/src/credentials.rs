//! Submitted credentials.

use std::collections::BTreeMap;
use std::fmt;

/// Key under which the secret is submitted.
pub const PASSWORD_KEY: &str = "password";

/// Named credential fields for a single resolution attempt.
///
/// The secret is never included in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    fields: BTreeMap<String, String>,
}

impl Credentials {
    /// Creates empty credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Adds the secret.
    #[must_use]
    pub fn with_password(self, password: impl Into<String>) -> Self {
        self.with(PASSWORD_KEY, password)
    }

    /// Gets a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Gets the secret.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.get(PASSWORD_KEY)
    }

    /// Checks if a field is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Returns true if no fields were submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.fields {
            if key == PASSWORD_KEY {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}
