//! `init-config` command.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::ConfigLoader;

#[derive(Debug, Serialize)]
pub struct InitConfigOutput {
    pub path: String,
    pub overwritten: bool,
}

impl CommandOutput for InitConfigOutput {
    fn to_human(&self) -> String {
        if self.overwritten {
            format!("Overwrote configuration at {}", self.path)
        } else {
            format!("Wrote default configuration to {}", self.path)
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn init_config(path: &Path, force: bool, json_mode: bool) -> Result<()> {
    let exists = path.exists();
    if exists && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    ConfigLoader::write_default(path)?;
    output(
        &InitConfigOutput {
            path: path.display().to_string(),
            overwritten: exists,
        },
        json_mode,
    );
    Ok(())
}
