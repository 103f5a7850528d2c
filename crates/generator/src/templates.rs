use compose::{ComposeFile, Service};
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{GenerateError, Result};

pub const BASE_MANIFEST: &str = "docker-compose.base.yml";
pub const INSTANCE_TEMPLATE: &str = "firefox.service.template.yml";
pub const FORWARD_PROXY_TEMPLATE: &str = "tinyproxy.service.template.yml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePaths {
    pub base: PathBuf,
    pub instance: PathBuf,
    pub forward_proxy: PathBuf,
}

impl TemplatePaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            base: dir.join(BASE_MANIFEST),
            instance: dir.join(INSTANCE_TEMPLATE),
            forward_proxy: dir.join(FORWARD_PROXY_TEMPLATE),
        }
    }
}

impl Default for TemplatePaths {
    fn default() -> Self {
        Self {
            base: PathBuf::from(BASE_MANIFEST),
            instance: PathBuf::from(INSTANCE_TEMPLATE),
            forward_proxy: PathBuf::from(FORWARD_PROXY_TEMPLATE),
        }
    }
}

/// Decoded input documents for one run.
#[derive(Debug, Clone)]
pub struct Templates {
    pub base: ComposeFile,
    pub instance: Service,
    pub forward_proxy: Option<Service>,
}

impl Templates {
    /// The forwarding-proxy template is only read when the run enables it,
    /// so it may be absent otherwise.
    pub fn load(paths: &TemplatePaths, config: &Config) -> Result<Self> {
        let base = load_document(&paths.base)?;
        let instance = load_document(&paths.instance)?;
        let forward_proxy = if config.forward_proxy {
            Some(load_document(&paths.forward_proxy)?)
        } else {
            None
        };

        Ok(Self {
            base,
            instance,
            forward_proxy,
        })
    }
}

fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).map_err(|error| match error.kind() {
        io::ErrorKind::NotFound => GenerateError::MissingTemplate {
            path: path.to_path_buf(),
        },
        _ => GenerateError::ReadTemplate {
            path: path.to_path_buf(),
            error,
        },
    })?;

    let document = compose::from_yaml(&contents).map_err(|error| GenerateError::ParseTemplate {
        path: path.to_path_buf(),
        error,
    })?;
    tracing::info!(path = %path.display(), "loaded template");

    Ok(document)
}
