//! Install command

use anyhow::{Context, Result, bail};
use criage_core::ops::{InstallOutcome, InstallRequest};

use super::Session;
use crate::parse_package_spec;

#[derive(Debug, Default)]
pub struct InstallArgs {
    pub global: bool,
    pub version: Option<String>,
    pub force: bool,
    pub dev: bool,
    pub arch: Option<String>,
    pub os: Option<String>,
}

/// Install one package, `pkg` or `pkg@version`.
pub async fn install(session: &Session, spec: &str, args: InstallArgs) -> Result<()> {
    let (name, spec_version) = parse_package_spec(spec);
    let version = match (spec_version, args.version) {
        (Some(a), Some(b)) if a != b => {
            bail!("Conflicting versions for {name}: '{a}' from {spec} and '{b}' from --version")
        }
        (Some(v), _) => Some(v.to_string()),
        (None, v) => v,
    };

    let pm = session.manager()?;
    pm.config()
        .ensure_directories()
        .context("Failed to create install directories")?;

    let req = InstallRequest {
        name: name.to_string(),
        version,
        global: args.global,
        force: args.force,
        dev: args.dev,
        arch: args.arch,
        os: args.os,
    };
    let outcome = pm
        .install(&req)
        .await
        .with_context(|| format!("Failed to install {name}"))?;
    pm.close();

    if let InstallOutcome::AlreadyInstalled(info) = outcome {
        if !session.quiet {
            println!(
                "{} {} is already installed (use --force to reinstall)",
                info.name, info.version
            );
        }
    }
    Ok(())
}
