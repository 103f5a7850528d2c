//! Generates a docker compose manifest running N VNC-enabled Firefox
//! instances behind a shared egress proxy.

mod config;
mod error;
mod manifest;
pub mod monitoring;
mod output;
mod templates;

pub use config::{Config, parse_flag};
pub use error::{GenerateError, Result};
pub use manifest::{
    BASE_DISPLAY_PORT, CONTROL_PORT, FORWARD_PROXY_PORT, FORWARD_PROXY_SERVICE, INSTANCE_PREFIX,
    MAX_INSTANCES, PROXY_SERVICE, display_port, generate, instance_container_name,
    instance_environment, instance_service_name, instance_volume_name,
};
pub use output::{FileSink, ManifestSink, OUTPUT_FILE, StdoutSink, Summary};
pub use templates::{
    BASE_MANIFEST, FORWARD_PROXY_TEMPLATE, INSTANCE_TEMPLATE, TemplatePaths, Templates,
};

pub mod vars {
    pub use crate::config::{
        DARK_MODE, DISPLAY_HEIGHT, DISPLAY_WIDTH, INSTANCES, PROXY_AUTH_KEY, STARTUP_URL,
        USE_TINYPROXY, VNC_PASSWORD, VNC_SECURE, WITH_MONITORING,
    };
}

/// Loads the templates, generates the manifest and hands it to `sink`.
///
/// Nothing reaches the sink unless the whole document was assembled.
pub fn run(config: &Config, paths: &TemplatePaths, sink: &dyn ManifestSink) -> Result<Summary> {
    let templates = Templates::load(paths, config)?;
    let compose = generate(config, templates)?;
    sink.write(&compose)?;

    Ok(Summary::new(config, sink.describe()))
}
