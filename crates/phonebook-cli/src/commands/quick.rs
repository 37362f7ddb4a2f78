use phonebook_core::models::DirectoryId;
use phonebook_core::quick_action::{QuickActionOutcome, QuickActionResolver};

use crate::error::CliError;

pub async fn run_quick_add(
    resolver: &QuickActionResolver,
    directory_id: DirectoryId,
    guid: &str,
) -> Result<QuickActionOutcome, CliError> {
    let outcome = resolver.apply_create(directory_id, guid).await?;
    println!("{outcome}");
    Ok(outcome)
}

pub async fn run_quick_update(
    resolver: &QuickActionResolver,
    directory_id: DirectoryId,
    guid: &str,
) -> Result<QuickActionOutcome, CliError> {
    let outcome = resolver.apply_update(directory_id, guid).await?;
    if let QuickActionOutcome::Applied { changes } = &outcome {
        for change in changes {
            println!(
                "  {}: {} -> {}",
                change.field.as_str(),
                change.old.as_deref().unwrap_or("none"),
                change.new.as_deref().unwrap_or("none")
            );
        }
    }
    println!("{outcome}");
    Ok(outcome)
}
