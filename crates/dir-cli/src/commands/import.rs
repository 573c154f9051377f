//! Import command implementation.

use std::sync::Arc;

use dir_federation::{
    BatchImporter, BatchOptions, LogEventSink, NullEventSink, SharedEventSink, SyncResult,
};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::ImportArgs;
use crate::output::{confirm, info, output, output_json, success, warning};
use crate::{CliError, CliResult, OutputFormat};

use super::Context;

/// One line of the import summary.
#[derive(Debug, Tabled, Serialize)]
struct SummaryRow {
    #[tabled(rename = "Result")]
    label: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

/// One failed entry.
#[derive(Debug, Tabled, Serialize)]
struct FailureRow {
    #[tabled(rename = "GUID")]
    guid: String,
    #[tabled(rename = "DN")]
    dn: String,
    #[tabled(rename = "Error")]
    message: String,
}

/// Runs the import command.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be built, the options conflict,
/// or the directory cannot be listed. Failures of single entries are
/// reported in the summary instead.
pub async fn run_import(args: ImportArgs, context: &Context) -> CliResult<()> {
    let events: SharedEventSink = if args.no_log {
        Arc::new(NullEventSink)
    } else {
        Arc::new(LogEventSink::new(context.config.settings.logging))
    };

    let pipeline = context.pipeline(events, true).await?;
    let importer = BatchImporter::from_pipeline(&pipeline, context.domain.clone())?;
    let options = options(&args);
    options.validate()?;

    if !args.yes {
        let count = importer.entries(&options).await?.len();
        if count == 0 {
            info("No users found to import.");
            return Ok(());
        }
        if !confirm(&format!(
            "Import {count} user(s) into domain '{}'?",
            context.domain
        ))? {
            return Err(CliError::Aborted);
        }
    }

    let result = importer.run(&options).await?;
    report(&result, context.output)
}

fn options(args: &ImportArgs) -> BatchOptions {
    let mut options = BatchOptions::new();
    if let Some(user) = &args.user {
        options = options.user(user.clone());
    }
    if let Some(filter) = &args.filter {
        options = options.filter(filter.clone());
    }
    if args.delete {
        options = options.delete_disabled();
    }
    if args.restore {
        options = options.restore_enabled();
    }
    if args.delete_missing {
        options = options.delete_missing();
    }
    options
}

fn report(result: &SyncResult, format: OutputFormat) -> CliResult<()> {
    if format == OutputFormat::Json {
        return output_json(result);
    }

    output(&summary_rows(result), format)?;

    if result.has_errors() {
        println!();
        warning(&format!("{} user(s) failed to import", result.failed));
        output(&failure_rows(result), format)?;
    } else {
        success(&format!("Imported {} user(s)", result.total()));
    }

    Ok(())
}

fn summary_rows(result: &SyncResult) -> Vec<SummaryRow> {
    vec![
        SummaryRow { label: "Added", count: result.added },
        SummaryRow { label: "Updated", count: result.updated },
        SummaryRow { label: "Trashed", count: result.removed },
        SummaryRow { label: "Restored", count: result.restored },
        SummaryRow { label: "Failed", count: result.failed },
    ]
}

fn failure_rows(result: &SyncResult) -> Vec<FailureRow> {
    result
        .errors
        .iter()
        .map(|error| FailureRow {
            guid: error.guid.clone(),
            dn: error.dn.clone().unwrap_or_default(),
            message: error.message.clone(),
        })
        .collect()
}
