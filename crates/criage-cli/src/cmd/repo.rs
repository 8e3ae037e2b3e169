//! Repository commands

use std::io::{Write, stdout};

use anyhow::{Context, Result};
use crossterm::style::Stylize;

use super::Session;
use crate::ui::Theme;
use crate::ui::list::{write_field, write_search_header, write_search_row};
use crate::ui::theme::format_size;

/// Print the server's self-description
pub async fn info(session: &Session, target: Option<&str>) -> Result<()> {
    let pm = session.manager()?;
    let info = pm
        .repository_info(target)
        .await
        .context("Failed to fetch repository info")?;
    pm.close();

    let theme = Theme::default();
    let mut out = stdout().lock();
    writeln!(out)?;
    for (key, value) in &info.0 {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        write_field(&mut out, &theme, key, &rendered)?;
    }
    Ok(())
}

pub async fn stats(session: &Session, target: Option<&str>) -> Result<()> {
    let pm = session.manager()?;
    let stats = pm
        .repository_stats(target)
        .await
        .context("Failed to fetch repository statistics")?;
    pm.close();

    let theme = Theme::default();
    let mut out = stdout().lock();
    writeln!(out)?;
    write_field(&mut out, &theme, "packages", &stats.total_packages.to_string())?;
    write_field(&mut out, &theme, "downloads", &stats.total_downloads.to_string())?;
    write_field(&mut out, &theme, "size", &format_size(stats.total_size))?;
    if let Some(at) = stats.last_updated {
        write_field(&mut out, &theme, "updated", &at.format("%Y-%m-%d %H:%M").to_string())?;
    }
    write_field(&mut out, &theme, "popular", &stats.popular_packages.join(", "))?;
    let formats: Vec<String> = stats
        .formats_count
        .iter()
        .map(|(format, count)| format!("{format}: {count}"))
        .collect();
    write_field(&mut out, &theme, "formats", &formats.join(", "))?;
    Ok(())
}

/// Ask the repository to rebuild its index
pub async fn refresh(session: &Session, target: Option<&str>, token: Option<&str>) -> Result<()> {
    let pm = session.manager()?;
    pm.refresh_repository_index(target, token)
        .await
        .context("Failed to refresh repository index")?;
    pm.close();
    Ok(())
}

pub async fn packages(session: &Session, target: Option<&str>, page: u32, limit: u32) -> Result<()> {
    let pm = session.manager()?;
    let repo = pm.repository(target)?;
    let listing = pm
        .repository_packages(target, page, limit)
        .await
        .context("Failed to list repository packages")?;
    pm.close();

    let theme = Theme::default();
    let mut out = stdout().lock();
    writeln!(out)?;
    if listing.packages.is_empty() {
        writeln!(out, "  {} No packages on this page.", theme.icons.info.blue())?;
        return Ok(());
    }

    write_search_header(&mut out, &theme)?;
    for pkg in &listing.packages {
        let latest = if pkg.latest_version.is_empty() {
            pkg.versions.last().map(|v| v.version.as_str()).unwrap_or_default()
        } else {
            pkg.latest_version.as_str()
        };
        write_search_row(&mut out, &theme, &pkg.name, latest, &repo.name, &pkg.description)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "  page {} of {}, {} packages",
        listing.page,
        listing.total_pages.max(1),
        listing.total
    )?;
    Ok(())
}
