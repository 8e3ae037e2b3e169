//! Uninstall command

use anyhow::{Context, Result};

use super::Session;

pub async fn uninstall(session: &Session, name: &str, global: bool, purge: bool) -> Result<()> {
    let pm = session.manager()?;
    pm.uninstall(name, global, purge)
        .await
        .with_context(|| format!("Failed to uninstall {name}"))?;
    pm.close();
    Ok(())
}
