//! Stats command.

use console::style;

use crate::config::Settings;
use crate::models::HarvestStatus;

use super::build_harvester;

/// Show harvest statistics.
pub async fn cmd_stats(settings: &Settings) -> anyhow::Result<()> {
    let harvester = build_harvester(settings)?;
    let report = harvester.harvest_report()?;

    println!("{}", style("Harvest status").bold());
    let mut tracked = 0u64;
    for status in HarvestStatus::all() {
        let count = report
            .totals_by_status
            .get(status.as_str())
            .copied()
            .unwrap_or(0);
        tracked += count;
        if count > 0 {
            println!("  {:<12} {}", status.as_str(), count);
        }
    }
    println!("  {:<12} {}", "tracked", style(tracked).bold());
    println!("  {:<12} {}", "documents", report.with_document);
    println!("  {:<12} {}", "backlog", report.backlog);
    println!("  {:<12} {}", "retry queue", report.retry_queue);

    if !report.by_county.is_empty() {
        println!();
        println!("{}", style("By county").bold());
        let mut counties: Vec<_> = report.by_county.iter().collect();
        counties.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (county, count) in counties.into_iter().take(15) {
            println!("  {county:<20} {count}");
        }
    }

    if !report.daily.is_empty() {
        println!();
        println!("{}", style("Recent activity").bold());
        println!("  date        checked  found  no-order  errors  runs");
        for day in &report.daily {
            println!(
                "  {}  {:>7}  {:>5}  {:>8}  {:>6}  {:>4}",
                day.date, day.cases_checked, day.orders_found, day.no_order, day.errors, day.runs
            );
        }
    }

    Ok(())
}
