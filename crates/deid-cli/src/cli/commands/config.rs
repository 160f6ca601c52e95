//! `deid config` – print the effective configuration.

use std::path::Path;

use anyhow::Result;
use deid_core::config::{self, DeidConfig};

pub fn run_config(cfg: &DeidConfig, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
