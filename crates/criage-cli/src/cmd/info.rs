//! Info command

use std::io::{Write, stdout};

use anyhow::Result;
use crossterm::style::Stylize;

use super::Session;
use crate::ui::Theme;
use crate::ui::list::write_field;
use crate::ui::theme::format_size;

/// Show an installed package's record
pub fn info(session: &Session, name: &str, global: bool) -> Result<()> {
    let pm = session.manager()?;
    let pkg = pm.info(name, global)?;

    let theme = Theme::default();
    let mut out = stdout().lock();

    writeln!(out)?;
    writeln!(
        out,
        "  {} {}",
        pkg.name.as_str().white().bold(),
        pkg.version.as_str().dark_grey()
    )?;
    if !pkg.description.is_empty() {
        writeln!(out, "  {}", pkg.description)?;
    }
    writeln!(out)?;

    write_field(&mut out, &theme, "author", &pkg.author)?;
    write_field(&mut out, &theme, "path", &pkg.install_path.display().to_string())?;
    write_field(&mut out, &theme, "scope", if pkg.global { "global" } else { "local" })?;
    write_field(
        &mut out,
        &theme,
        "installed",
        &format!("{}, {}", format_size(pkg.size), pkg.install_date.format("%Y-%m-%d %H:%M")),
    )?;
    let deps: Vec<String> = pkg
        .dependencies
        .iter()
        .map(|(name, range)| format!("{name} {range}"))
        .collect();
    write_field(&mut out, &theme, "requires", &deps.join(", "))?;
    let scripts: Vec<&str> = pkg.scripts.keys().map(String::as_str).collect();
    write_field(&mut out, &theme, "scripts", &scripts.join(", "))?;
    Ok(())
}
