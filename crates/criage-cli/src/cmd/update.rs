//! Update command

use anyhow::{Context, Result, bail};
use criage_core::ops::UpdateOutcome;
use crossterm::style::Stylize;

use super::Session;

/// Update one package, or every local package when `name` is `None`.
pub async fn update(session: &Session, name: Option<&str>, global: bool) -> Result<()> {
    let pm = session.manager()?;

    let Some(name) = name else {
        let summary = pm.update_all().await;
        pm.close();
        if !session.quiet {
            println!();
            println!(
                "  {} updated, {} up to date, {} failed",
                summary.updated.len(),
                summary.up_to_date.len(),
                summary.failed.len()
            );
            for (name, from, to) in &summary.updated {
                println!("  {} {from} -> {to}", name.as_str().cyan());
            }
        }
        if !summary.is_success() {
            let failed: Vec<&str> = summary.failed.iter().map(|(n, _)| n.as_str()).collect();
            bail!("Failed to update: {}", failed.join(", "));
        }
        return Ok(());
    };

    let outcome = pm
        .update(name, global)
        .await
        .with_context(|| format!("Failed to update {name}"))?;
    pm.close();
    if !session.quiet {
        match outcome {
            UpdateOutcome::UpToDate { version } => println!("{name} is up to date ({version})"),
            UpdateOutcome::Updated { from, to } => println!("{name} updated {from} -> {to}"),
        }
    }
    Ok(())
}
