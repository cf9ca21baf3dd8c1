use anyhow::bail;
use colored::*;

use ipalloc_common::config::Config;
use ipalloc_core::scanner::{ScanOutcome, ScanReport};

use crate::commands::{build_driver, connect_store};
use crate::terminal::print;

pub async fn scan(cfg: &Config) -> anyhow::Result<()> {
    let store = connect_store(cfg).await?;
    let driver = build_driver(cfg, store)?;

    match driver.run_pass().await {
        ScanOutcome::Completed(report) => {
            print_report(&report);
            Ok(())
        }
        ScanOutcome::Abandoned(reason) => bail!("scan pass abandoned: {reason}"),
    }
}

fn print_report(report: &ScanReport) {
    print::header("scan report");
    print::aligned_line("Segments", report.segments);
    print::aligned_line("Skipped segments", report.skipped_segments);
    print::aligned_line("Addresses", report.submitted);
    print::aligned_line("Alive", report.alive.to_string().green().bold());
    print::aligned_line("Inserted", report.inserted);
    print::aligned_line("Updated", report.updated);
    let failed = if report.failed > 0 {
        report.failed.to_string().red().bold()
    } else {
        report.failed.to_string().normal()
    };
    print::aligned_line("Failed", failed);
    print::aligned_line(
        "Elapsed",
        format!("{:.2}s", report.elapsed.as_secs_f64()).yellow(),
    );
    print::fat_separator();
}
