//! Batch import.
//!
//! Imports one user or every user matching an optional raw filter, in the
//! batch credential context. Per-entry failures are recorded in the
//! [`SyncResult`] and never abort the run.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dir_model::DirectoryEntry;
use dir_storage::AccountSearchCriteria;
use serde::{Deserialize, Serialize};

use crate::error::{FederationError, FederationResult};
use crate::importer::Importer;
use crate::password::SyncContext;
use crate::pipeline::AuthenticationPipeline;
use crate::resolver::UserResolver;

// ============================================================================
// Options
// ============================================================================

/// What a batch import covers and how it treats account state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Import only the user with this lookup value.
    pub username: Option<String>,
    /// Raw directory filter narrowing the import.
    pub filter: Option<String>,
    /// Soft-delete accounts whose directory entry is disabled.
    pub delete_disabled: bool,
    /// Restore soft-deleted accounts whose directory entry is enabled.
    pub restore_enabled: bool,
    /// Soft-delete imported accounts of the domain absent from the directory.
    pub delete_missing: bool,
}

impl BatchOptions {
    /// Creates options importing every user.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Imports a single user.
    #[must_use]
    pub fn user(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Narrows the import with a raw filter.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Soft-deletes accounts of disabled entries.
    #[must_use]
    pub const fn delete_disabled(mut self) -> Self {
        self.delete_disabled = true;
        self
    }

    /// Restores accounts of enabled entries.
    #[must_use]
    pub const fn restore_enabled(mut self) -> Self {
        self.restore_enabled = true;
        self
    }

    /// Soft-deletes accounts whose entry is gone.
    #[must_use]
    pub const fn delete_missing(mut self) -> Self {
        self.delete_missing = true;
        self
    }

    /// Checks that the options can be combined.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `delete_missing` is combined with
    /// a user or filter.
    pub fn validate(&self) -> FederationResult<()> {
        if self.delete_missing && (self.username.is_some() || self.filter.is_some()) {
            return Err(FederationError::config(
                "delete_missing cannot be combined with a user or filter",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Sync Results
// ============================================================================

/// Result of a batch import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// Number of accounts created.
    pub added: usize,

    /// Number of existing accounts updated.
    pub updated: usize,

    /// Number of accounts soft-deleted.
    pub removed: usize,

    /// Number of accounts restored.
    pub restored: usize,

    /// Number of entries that failed to import.
    pub failed: usize,

    /// When the import started.
    pub started_at: DateTime<Utc>,

    /// When the import completed.
    pub completed_at: DateTime<Utc>,

    /// Status message.
    pub status: String,

    /// Errors encountered (if any).
    pub errors: Vec<SyncError>,
}

impl SyncResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            added: 0,
            updated: 0,
            removed: 0,
            restored: 0,
            failed: 0,
            started_at,
            completed_at: started_at,
            status: String::new(),
            errors: Vec::new(),
        }
    }

    /// Marks the import as complete.
    #[must_use]
    pub fn complete(mut self) -> Self {
        self.completed_at = Utc::now();
        self.status = format!(
            "Import completed: {} added, {} updated, {} removed, {} restored, {} failed",
            self.added, self.updated, self.removed, self.restored, self.failed
        );
        self
    }

    /// Records an account creation.
    pub fn record_added(&mut self) {
        self.added += 1;
    }

    /// Records an account update.
    pub fn record_updated(&mut self) {
        self.updated += 1;
    }

    /// Records a soft delete.
    pub fn record_removed(&mut self) {
        self.removed += 1;
    }

    /// Records a restore.
    pub fn record_restored(&mut self) {
        self.restored += 1;
    }

    /// Records a failure.
    pub fn record_failure(&mut self, error: SyncError) {
        self.failed += 1;
        self.errors.push(error);
    }

    /// Returns the number of directory entries processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.added + self.updated + self.failed
    }

    /// Returns true if any entry failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Failure for a single entry or account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncError {
    /// Directory identifier.
    pub guid: String,

    /// Distinguished name (if available).
    pub dn: Option<String>,

    /// Error message.
    pub message: String,
}

impl SyncError {
    /// Creates a failure record.
    #[must_use]
    pub fn new(guid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            dn: None,
            message: message.into(),
        }
    }

    /// Sets the distinguished name.
    #[must_use]
    pub fn with_dn(mut self, dn: impl Into<String>) -> Self {
        self.dn = Some(dn.into());
        self
    }
}

// ============================================================================
// Batch importer
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct EntryOutcome {
    added: bool,
    removed: bool,
    restored: bool,
}

/// Imports directory users in bulk.
pub struct BatchImporter {
    resolver: UserResolver,
    importer: Importer,
    domain: String,
}

impl BatchImporter {
    /// Creates a batch importer for `domain`.
    ///
    /// The importer is switched to the batch credential context.
    #[must_use]
    pub fn new(resolver: UserResolver, importer: Importer, domain: impl Into<String>) -> Self {
        Self {
            resolver,
            importer: importer.with_context(SyncContext::Batch),
            domain: domain.into(),
        }
    }

    /// Creates a batch importer sharing a pipeline's resolver and importer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pipeline stores nothing locally.
    pub fn from_pipeline(
        pipeline: &AuthenticationPipeline,
        domain: impl Into<String>,
    ) -> FederationResult<Self> {
        let importer = pipeline.importer().cloned().ok_or_else(|| {
            FederationError::config("batch import requires a local account store")
        })?;
        Ok(Self::new(pipeline.resolver().clone(), importer, domain))
    }

    /// Returns the domain tag.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Lists the entries a run would import.
    ///
    /// # Errors
    ///
    /// Returns the directory's error.
    pub async fn entries(&self, options: &BatchOptions) -> FederationResult<Vec<DirectoryEntry>> {
        if let Some(username) = &options.username {
            let attribute = &self.resolver.config().locate_users_by;
            let entry = self.resolver.resolve_by_attribute(attribute, username).await?;
            return Ok(entry.into_iter().collect());
        }

        self.resolver.search(options.filter.as_deref()).await
    }

    /// Runs the import.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid options, or a directory or
    /// store error that prevents listing entries or accounts. Failures of
    /// single entries are recorded in the result instead.
    pub async fn run(&self, options: &BatchOptions) -> FederationResult<SyncResult> {
        options.validate()?;

        let mut result = SyncResult::new(Utc::now());
        let entries = self.entries(options).await?;
        tracing::info!(domain = %self.domain, count = entries.len(), "Importing directory users");

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            seen.insert(entry.guid().to_string());

            match self.import_entry(entry, options).await {
                Ok(outcome) => {
                    if outcome.added {
                        result.record_added();
                    } else {
                        result.record_updated();
                    }
                    if outcome.removed {
                        result.record_removed();
                    }
                    if outcome.restored {
                        result.record_restored();
                    }
                }
                Err(err) => {
                    tracing::warn!(dn = entry.dn(), error = %err, "Failed to import user");
                    result.record_failure(
                        SyncError::new(entry.guid(), err.to_string()).with_dn(entry.dn()),
                    );
                }
            }
        }

        if options.delete_missing {
            self.delete_missing(&seen, &mut result).await?;
        }

        let result = result.complete();
        tracing::info!(domain = %self.domain, status = %result.status, "Import finished");
        Ok(result)
    }

    async fn import_entry(
        &self,
        entry: &DirectoryEntry,
        options: &BatchOptions,
    ) -> FederationResult<EntryOutcome> {
        let mut account = self.importer.run(entry, None).await?;
        let mut outcome = EntryOutcome {
            added: !account.exists(),
            ..EntryOutcome::default()
        };

        let disabled = entry.is_disabled();
        if options.delete_disabled && disabled && !account.is_trashed() {
            account.trash();
            outcome.removed = true;
        } else if options.restore_enabled && !disabled && account.is_trashed() {
            account.restore();
            outcome.restored = true;
        }

        self.importer.save(entry, None, account).await?;
        Ok(outcome)
    }

    async fn delete_missing(
        &self,
        seen: &HashSet<String>,
        result: &mut SyncResult,
    ) -> FederationResult<()> {
        let store = self.importer.store();
        let schema = self.importer.schema();
        let criteria = AccountSearchCriteria::new()
            .domain(self.domain.clone())
            .imported_only();

        for mut account in store.search(&criteria).await? {
            let missing = schema.guid(&account).is_some_and(|guid| !seen.contains(guid));
            if !missing {
                continue;
            }

            let guid = schema.guid(&account).unwrap_or_default().to_string();
            account.trash();
            match store.save(&mut account).await {
                Ok(()) => {
                    tracing::debug!(guid = %guid, "Soft-deleted account missing from directory");
                    result.record_removed();
                }
                Err(err) => result.record_failure(SyncError::new(guid, err.to_string())),
            }
        }
        Ok(())
    }
}
