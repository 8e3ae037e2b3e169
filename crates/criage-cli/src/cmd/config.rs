//! Config command

use anyhow::{Context, Result};
use criage_core::Config;

fn load() -> Result<Config> {
    Config::load().context("Failed to load configuration")
}

pub fn get(key: &str) -> Result<()> {
    let value = load()?.get_value(key)?;
    println!("{value}");
    Ok(())
}

/// Set a value and write the file back
pub fn set(key: &str, value: &str) -> Result<()> {
    let mut config = load()?;
    config
        .set_value(key, value)
        .with_context(|| format!("Failed to set {key}"))?;
    config.save().context("Failed to save configuration")?;
    println!("{key} = {}", config.get_value(key)?);
    Ok(())
}

pub fn list() -> Result<()> {
    for (key, value) in load()?.entries()? {
        println!("{key} = {value}");
    }
    Ok(())
}
