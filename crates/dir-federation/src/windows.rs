//! Windows/SSO authentication.
//!
//! The web server has already authenticated the user and exposes the
//! identity in a server variable (`AUTH_USER` by default). No bind takes
//! place; the entry is located by `windows.locate_users_by` and imported.

use std::collections::HashMap;

use crate::error::FederationResult;
use crate::event::DirectoryEvent;
use crate::pipeline::{
    AuthOutcome, AuthSource, AuthenticatedUser, AuthenticationPipeline, ImportOrder,
};

/// Identity taken from an SSO server variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsIdentity {
    /// NetBIOS domain, when the value was `DOMAIN\user`.
    pub domain: Option<String>,
    /// Account name.
    pub username: String,
}

impl WindowsIdentity {
    /// Parses `DOMAIN\user` or a bare `user`.
    ///
    /// Returns `None` for empty values.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let (domain, username) = match value.split_once('\\') {
            Some((domain, username)) => (Some(domain.trim()), username.trim()),
            None => (None, value),
        };

        if username.is_empty() {
            return None;
        }

        Some(Self {
            domain: domain.filter(|d| !d.is_empty()).map(str::to_string),
            username: username.to_string(),
        })
    }
}

impl AuthenticationPipeline {
    /// Authenticates the user named by the configured server variable.
    ///
    /// With the default [`ImportOrder::ImportFirst`] the account is imported
    /// and saved before the rule chain runs, so a rejected user still has
    /// an up-to-date local account.
    ///
    /// # Errors
    ///
    /// Returns directory, storage and import errors.
    pub async fn attempt_windows(
        &self,
        server: &HashMap<String, String>,
    ) -> FederationResult<AuthOutcome> {
        let windows = &self.resolver.config().windows;
        let Some(identity) = server
            .get(&windows.server_key)
            .and_then(|value| WindowsIdentity::parse(value))
        else {
            tracing::debug!(key = %windows.server_key, "No Windows identity supplied");
            return Ok(AuthOutcome::NotFound);
        };

        let Some(entry) = self
            .resolver
            .resolve_by_attribute(&windows.locate_users_by, &identity.username)
            .await?
        else {
            tracing::debug!(username = %identity.username, "Windows user not found in directory");
            return Ok(AuthOutcome::NotFound);
        };

        let account = match self.windows_order {
            ImportOrder::ImportFirst => {
                let account = match self.import(&entry, None).await? {
                    Ok(account) => account,
                    Err(outcome) => return Ok(outcome),
                };
                let account = self.persist(&entry, None, account).await?;
                if !self.validate(&entry, account.as_ref()) {
                    return Ok(AuthOutcome::Rejected);
                }
                account
            }
            ImportOrder::ValidateFirst => {
                let existing = match &self.importer {
                    Some(importer) => importer.locate(&entry).await?,
                    None => None,
                };
                if !self.validate(&entry, existing.as_ref()) {
                    return Ok(AuthOutcome::Rejected);
                }
                let account = match self.import(&entry, None).await? {
                    Ok(account) => account,
                    Err(outcome) => return Ok(outcome),
                };
                self.persist(&entry, None, account).await?
            }
        };

        self.events.emit(&DirectoryEvent::AuthenticatedWithWindows {
            entry: entry.clone(),
            account: account.clone(),
        });

        Ok(AuthOutcome::Success(AuthenticatedUser {
            entry: Some(entry),
            account,
            source: AuthSource::Windows,
        }))
    }
}
