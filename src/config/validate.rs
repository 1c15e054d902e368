// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BootrunError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BootrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_commands(cfg)?;
    validate_paths(cfg)?;
    Ok(())
}

fn validate_commands(cfg: &RawConfigFile) -> Result<()> {
    if cfg.generator.cmd.trim().is_empty() {
        return Err(BootrunError::ConfigError(
            "[generator].cmd must not be empty".to_string(),
        ));
    }

    if cfg.compiler.program.trim().is_empty() {
        return Err(BootrunError::ConfigError(
            "[compiler].program must not be empty".to_string(),
        ));
    }

    if let Some(runtime) = &cfg.worker.runtime {
        if runtime.trim().is_empty() {
            return Err(BootrunError::ConfigError(
                "[worker].runtime must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    let paths = &cfg.paths;

    if paths.script.as_os_str().is_empty() || paths.artifact.as_os_str().is_empty() {
        return Err(BootrunError::ConfigError(
            "[paths].script and [paths].artifact must not be empty".to_string(),
        ));
    }

    // Invalidating the artifact would otherwise delete the script.
    if paths.script == paths.artifact {
        return Err(BootrunError::ConfigError(format!(
            "[paths].script and [paths].artifact must differ (both are {:?})",
            paths.script
        )));
    }

    Ok(())
}
