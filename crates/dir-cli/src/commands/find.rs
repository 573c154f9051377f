//! Find command implementation.

use std::sync::Arc;

use colored::Colorize;
use dir_federation::NullEventSink;
use dir_model::{DirectoryEntry, LocalAccount};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::FindArgs;
use crate::output::{output, output_json};
use crate::{CliError, CliResult, OutputFormat};

use super::Context;

/// One attribute value of a directory entry.
#[derive(Debug, Tabled, Serialize)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    attribute: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// A directory user and the state of its local account.
#[derive(Debug, Serialize)]
struct FoundUser<'a> {
    entry: &'a DirectoryEntry,
    account: AccountStatus,
}

/// Whether a directory user has a local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum AccountStatus {
    /// Accounts are not stored locally.
    NotStored,
    /// No local account exists yet.
    NotImported,
    /// A live local account exists.
    Imported,
    /// The local account is soft-deleted.
    Trashed,
}

impl AccountStatus {
    fn of(account: Option<&LocalAccount>) -> Self {
        match account {
            None => Self::NotImported,
            Some(account) if account.is_trashed() => Self::Trashed,
            Some(_) => Self::Imported,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::NotStored => "not stored",
            Self::NotImported => "not imported",
            Self::Imported => "imported",
            Self::Trashed => "trashed",
        }
    }
}

/// Runs the find command.
///
/// # Errors
///
/// Returns `NotFound` if no entry matches, or the directory or store error.
pub async fn run_find(args: FindArgs, context: &Context) -> CliResult<()> {
    let pipeline = context.pipeline(Arc::new(NullEventSink), false).await?;
    let attribute = &context.domain_config()?.locate_users_by;

    let entry = pipeline
        .resolver()
        .resolve_by_attribute(attribute, &args.username)
        .await?
        .ok_or_else(|| CliError::not_found("user", &args.username))?;

    let status = match pipeline.importer() {
        Some(importer) => AccountStatus::of(importer.locate(&entry).await?.as_ref()),
        None => AccountStatus::NotStored,
    };

    match context.output {
        OutputFormat::Table => {
            println!("{} {}", "DN:".bold(), entry.dn());
            println!("{} {}", "GUID:".bold(), entry.guid());
            if let Some(domain) = entry.domain() {
                println!("{} {}", "Domain:".bold(), domain);
            }
            println!("{} {}", "Local account:".bold(), status.label());
            println!();
            output(&attribute_rows(&entry), OutputFormat::Table)
        }
        OutputFormat::Json => output_json(&FoundUser {
            entry: &entry,
            account: status,
        }),
    }
}

fn attribute_rows(entry: &DirectoryEntry) -> Vec<AttributeRow> {
    entry
        .attributes()
        .iter()
        .flat_map(|(attribute, values)| {
            values.iter().map(move |value| AttributeRow {
                attribute: attribute.clone(),
                value: value.clone(),
            })
        })
        .collect()
}
