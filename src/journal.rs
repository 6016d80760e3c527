use anyhow::Result;
use chrono::{DateTime, Local};
use std::{fs::OpenOptions, io::Write, path::Path};

use crate::domain::{BatchSummary, OutcomeStatus, SwapOutcome};

/// Appends one timestamped markdown section: summary line, then a row per outcome.
pub fn append_batch_report(report_path: impl AsRef<Path>, outcomes: &[SwapOutcome]) -> Result<()> {
    let now: DateTime<Local> = Local::now();
    let summary = BatchSummary::from_outcomes(outcomes);

    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(report_path)?;

    writeln!(f, "## Swap run {}\n", now.to_rfc3339())?;
    writeln!(f, "- Result: {}\n", summary)?;
    writeln!(f, "| Token | Status | Signature / detail |")?;
    writeln!(f, "|---|---|---|")?;
    for o in outcomes {
        let token = o.symbol.as_deref().unwrap_or(&o.mint_address);
        let detail = match o.status {
            OutcomeStatus::Success => o.signature.as_deref().unwrap_or(""),
            _ => o.error_detail.as_deref().unwrap_or(""),
        };
        writeln!(f, "| {} | {:?} | {} |", token, o.status, detail.replace('|', "\\|"))?;
    }
    writeln!(f, "\n---\n")?;

    Ok(())
}
