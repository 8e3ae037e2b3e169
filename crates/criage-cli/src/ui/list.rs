//! Column-aligned rows for `criage list`, `criage search` and
//! `criage repo packages`.

use std::io::{self, Write};

use crossterm::style::Stylize;

use super::theme::{Theme, format_size};

pub fn write_list_header(out: &mut impl Write, theme: &Theme) -> io::Result<()> {
    let header = format!(
        "  {:<nw$} {:<vw$} {:>sw$}   {}",
        "name",
        "version",
        "size",
        "installed",
        nw = theme.layout.name_width,
        vw = theme.layout.version_width,
        sw = theme.layout.size_width,
    );
    writeln!(out, "{}", header.with(theme.colors.header))
}

pub fn write_list_row(
    out: &mut impl Write,
    theme: &Theme,
    name: &str,
    version: &str,
    size: u64,
    date: &str,
) -> io::Result<()> {
    let name_part = format!("{name:<width$}", width = theme.layout.name_width);
    let version_part = format!("{version:<width$}", width = theme.layout.version_width);
    let size_part = if size > 0 {
        format!("{:>width$}", format_size(size), width = theme.layout.size_width)
    } else {
        " ".repeat(theme.layout.size_width)
    };

    writeln!(
        out,
        "  {} {} {}   {}",
        name_part.with(theme.colors.package_name),
        version_part.with(theme.colors.version),
        size_part.with(theme.colors.secondary),
        date.with(theme.colors.secondary)
    )
}

pub fn write_list_footer(out: &mut impl Write, theme: &Theme, count: usize, total_size: u64) -> io::Result<()> {
    writeln!(out)?;
    let msg = format!("  {count} packages, {}", format_size(total_size));
    writeln!(out, "{}", msg.with(theme.colors.secondary))
}

pub fn write_search_header(out: &mut impl Write, theme: &Theme) -> io::Result<()> {
    let header = format!(
        "  {:<nw$} {:<vw$} {:<12} {}",
        "name",
        "version",
        "repository",
        "description",
        nw = theme.layout.name_width,
        vw = theme.layout.version_width,
    );
    writeln!(out, "{}", header.with(theme.colors.header))
}

pub fn write_search_row(
    out: &mut impl Write,
    theme: &Theme,
    name: &str,
    version: &str,
    repository: &str,
    description: &str,
) -> io::Result<()> {
    let name_part = format!("{name:<width$}", width = theme.layout.name_width);
    let version_part = format!("{version:<width$}", width = theme.layout.version_width);
    let repo_part = format!("{repository:<12}");

    writeln!(
        out,
        "  {} {} {} {}",
        name_part.with(theme.colors.package_name),
        version_part.with(theme.colors.version),
        repo_part.with(theme.colors.secondary),
        description.with(theme.colors.secondary)
    )
}

/// One `label  value` line of a detail block.
pub fn write_field(out: &mut impl Write, theme: &Theme, label: &str, value: &str) -> io::Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    writeln!(
        out,
        "  {} {value}",
        format!("{label:<width$}", width = theme.layout.label_width).with(theme.colors.header)
    )
}
