use std::io::{Write, stdout};

use anyhow::Result;

use super::Session;
use crate::ui::Theme;
use crate::ui::list::{write_list_footer, write_list_header, write_list_row};

/// List installed packages of one scope
pub async fn list(session: &Session, global: bool, outdated: bool) -> Result<()> {
    let pm = session.manager()?;
    let packages = pm.list(global, outdated).await;
    pm.close();

    let theme = Theme::default();
    let mut out = stdout().lock();

    if packages.is_empty() {
        writeln!(out)?;
        if outdated {
            writeln!(out, "  All packages are up to date.")?;
        } else {
            writeln!(out, "  No packages installed.")?;
            writeln!(out, "  Run 'criage install <package>' to get started.")?;
        }
        return Ok(());
    }

    writeln!(out)?;
    write_list_header(&mut out, &theme)?;
    let mut total_size = 0;
    for pkg in &packages {
        total_size += pkg.size;
        let date = pkg.install_date.format("%Y-%m-%d").to_string();
        write_list_row(&mut out, &theme, &pkg.name, &pkg.version, pkg.size, &date)?;
    }
    write_list_footer(&mut out, &theme, packages.len(), total_size)?;
    Ok(())
}
