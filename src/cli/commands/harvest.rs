//! Sweep, backfill, and single-target harvest commands.

use std::time::Duration;

use chrono::NaiveDate;
use console::style;
use indicatif::ProgressBar;

use crate::config::Settings;
use crate::harvest::CaseOutcome;
use crate::models::{SourceKind, SweepOutcome};

use super::build_harvester;

/// Run one harvest sweep.
pub async fn cmd_sweep(settings: &Settings) -> anyhow::Result<()> {
    let harvester = build_harvester(settings)?;

    let spinner = working_spinner("Sweeping the docket...");
    let outcome = harvester.run_sweep().await;
    spinner.finish_and_clear();
    print_sweep_outcome(&outcome?);
    Ok(())
}

/// Indeterminate spinner for portal-bound work; cases are paced with
/// multi-second delays, so a counter would mislead more than it helps.
fn working_spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Sweep historical untracked cases.
pub async fn cmd_backfill(
    settings: &Settings,
    min_hearing_date: NaiveDate,
    limit: u32,
) -> anyhow::Result<()> {
    let harvester = build_harvester(settings)?;

    let min_hearing = min_hearing_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("invalid date: {min_hearing_date}"))?
        .and_utc();

    println!(
        "{} Backfilling up to {} cases heard since {}...",
        style("→").cyan(),
        limit,
        min_hearing_date
    );
    let spinner = working_spinner("Working through the backlog...");
    let outcome = harvester.run_backfill(min_hearing, limit).await;
    spinner.finish_and_clear();
    print_sweep_outcome(&outcome?);
    Ok(())
}

/// Fetch one case immediately.
pub async fn cmd_test_case(settings: &Settings, case_number: &str) -> anyhow::Result<()> {
    if !crate::utils::is_case_number(case_number) {
        anyhow::bail!("'{case_number}' does not look like a docket case number");
    }
    let harvester = build_harvester(settings)?;

    println!("{} Fetching case {}...", style("→").cyan(), case_number);
    match harvester.process_single(case_number).await? {
        CaseOutcome::Fetched { document_id } => {
            println!(
                "{} Order retrieved and registered as document {}",
                style("✓").green(),
                document_id
            );
        }
        CaseOutcome::NoOrder => {
            println!(
                "{} No signed order on the portal yet; retry scheduled",
                style("!").yellow()
            );
        }
        CaseOutcome::Skipped { document_id } => match document_id {
            Some(id) => {
                println!(
                    "{} Already registered downstream as document {}",
                    style("!").yellow(),
                    id
                );
            }
            None => println!("{} Case is already settled; nothing to do", style("!").yellow()),
        },
        CaseOutcome::RateLimited => {
            println!(
                "{} Portal is throttling requests; try again later",
                style("✗").red()
            );
        }
        CaseOutcome::Failed { message } => {
            println!("{} Fetch failed: {}", style("✗").red(), message);
        }
    }
    Ok(())
}

/// Fetch every matching document for one well from the bulk portal.
pub async fn cmd_well(
    settings: &Settings,
    well_id: &str,
    form: Option<&str>,
    kind: &str,
) -> anyhow::Result<()> {
    let kind = SourceKind::from_str(kind).ok_or_else(|| {
        anyhow::anyhow!("unknown source kind '{kind}' (pooling_order, completion_report, drilling_permit)")
    })?;
    let harvester = build_harvester(settings)?;

    println!("{} Listing documents for well {}...", style("→").cyan(), well_id);
    let registered = harvester.harvest_well(well_id, form, kind, None).await?;

    if registered.is_empty() {
        println!("{} No documents retrieved", style("!").yellow());
    } else {
        println!(
            "{} Registered {} document(s):",
            style("✓").green(),
            registered.len()
        );
        for id in registered {
            println!("  {id}");
        }
    }
    Ok(())
}

fn print_sweep_outcome(outcome: &SweepOutcome) {
    println!(
        "{} Sweep {} finished ({:?})",
        style("✓").green(),
        outcome.run_id,
        outcome.stopped
    );
    println!("  checked:    {}", outcome.checked);
    println!("  fetched:    {}", style(outcome.fetched).green());
    println!("  no order:   {}", outcome.no_order);
    println!("  skipped:    {}", outcome.skipped);
    println!("  errors:     {}", style(outcome.errors).red());
    println!("  retries:    {}", outcome.retries_attempted);
    println!("  reconciled: {}", outcome.reconciled);
}
