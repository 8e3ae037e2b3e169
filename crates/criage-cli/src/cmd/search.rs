//! Search command

use std::io::{Write, stdout};

use anyhow::Result;
use crossterm::style::Stylize;

use super::Session;
use crate::ui::Theme;
use crate::ui::list::{write_search_header, write_search_row};

/// Search every enabled repository
pub async fn search(session: &Session, query: &str) -> Result<()> {
    let start = std::time::Instant::now();
    let pm = session.manager()?;
    let results = pm.search(query).await;
    pm.close();

    let theme = Theme::default();
    let mut out = stdout().lock();

    if results.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "  {} No packages found matching '{}'",
            theme.icons.info.blue(),
            query.white()
        )?;
        return Ok(());
    }

    writeln!(out)?;
    write_search_header(&mut out, &theme)?;
    for hit in &results {
        write_search_row(
            &mut out,
            &theme,
            &hit.name,
            &hit.version,
            &hit.repository,
            &hit.description,
        )?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "  {} results, {:.2}s",
        results.len(),
        start.elapsed().as_secs_f64()
    )?;
    Ok(())
}
