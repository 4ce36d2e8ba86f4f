//! Configuration loading
//!
//! A TOML file provides the base; `RPCD__` environment variables override
//! single keys with `__` as the nesting separator, e.g.
//! `RPCD__TOKEN__SECRET` or `RPCD__SHUTDOWN_DEADLINE_SECS`.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use grpc_server::ServerConfig;
use std::path::Path;

pub const ENV_PREFIX: &str = "RPCD";

pub fn load(path: Option<&Path>) -> Result<ServerConfig> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to read configuration")?;

    let settings: ServerConfig = config
        .try_deserialize()
        .context("invalid configuration")?;
    settings.validate()?;

    Ok(settings)
}
