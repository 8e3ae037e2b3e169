//! Authoring commands: create, build, publish, metadata

use std::io::{Write, stdout};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use criage_core::ops::{BuildRequest, PublishRequest};
use criage_schema::ArchiveFormat;
use crossterm::style::Stylize;

use super::Session;
use crate::ui::Theme;
use crate::ui::list::write_field;
use crate::ui::theme::format_size;

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to read the current directory")
}

/// Scaffold a new package under the current directory
pub fn create(session: &Session, name: &str, author: &str, description: &str) -> Result<()> {
    let pm = session.manager()?;
    let root = pm
        .create_package(&current_dir()?, name, author, description)
        .with_context(|| format!("Failed to create package {name}"))?;

    if !session.quiet {
        let theme = Theme::default();
        println!(
            "  {} Created {} in {}",
            theme.icons.success.green(),
            name.cyan(),
            root.display()
        );
        println!();
        println!("  Next steps:");
        println!("    cd {name}");
        println!("    criage build");
    }
    Ok(())
}

pub async fn build(
    session: &Session,
    output: Option<PathBuf>,
    format: Option<ArchiveFormat>,
    level: Option<i32>,
) -> Result<()> {
    let pm = session.manager()?;
    let req = BuildRequest {
        source_dir: current_dir()?,
        output,
        format,
        level,
    };
    let built = pm.build(&req).await.context("Build failed")?;
    pm.close();

    if !session.quiet {
        let theme = Theme::default();
        println!(
            "  {} Built {} ({}, {})",
            theme.icons.success.green(),
            built.path.display(),
            built.format,
            format_size(built.size)
        );
    }
    Ok(())
}

pub async fn publish(session: &Session, registry: Option<String>, token: Option<String>) -> Result<()> {
    let pm = session.manager()?;
    pm.config()
        .ensure_directories()
        .context("Failed to create scratch directory")?;
    let req = PublishRequest {
        source_dir: current_dir()?,
        registry_url: registry,
        token,
    };
    let (name, version) = pm.publish(&req).await.context("Publish failed")?;
    pm.close();

    if !session.quiet {
        let theme = Theme::default();
        println!(
            "  {} Published {} {}",
            theme.icons.success.green(),
            name.as_str().cyan(),
            version
        );
    }
    Ok(())
}

/// Print the metadata embedded in an archive
pub async fn metadata(session: &Session, archive: &Path) -> Result<()> {
    let pm = session.manager()?;
    let meta = pm
        .archive_metadata(archive)
        .await
        .with_context(|| format!("Failed to read metadata from {}", archive.display()))?;

    let theme = Theme::default();
    let mut out = stdout().lock();
    writeln!(out)?;
    write_field(&mut out, &theme, "compression", &meta.compression_type)?;
    write_field(&mut out, &theme, "created by", &meta.created_by)?;
    if let Some(at) = meta.created_at {
        write_field(&mut out, &theme, "created at", &at.format("%Y-%m-%d %H:%M:%S").to_string())?;
    }

    if let Some(manifest) = &meta.package_manifest {
        writeln!(out)?;
        writeln!(out, "  {}", "Package manifest".with(theme.colors.header))?;
        writeln!(out, "{}", serde_json::to_string_pretty(manifest)?)?;
    }
    if let Some(build) = &meta.build_manifest {
        writeln!(out)?;
        writeln!(out, "  {}", "Build manifest".with(theme.colors.header))?;
        writeln!(out, "{}", serde_json::to_string_pretty(build)?)?;
    }
    Ok(())
}
