use crate::error::{GenerateError, Result};
use crate::manifest::{BASE_DISPLAY_PORT, MAX_INSTANCES};

pub const INSTANCES: &str = "INSTANCES";
pub const STARTUP_URL: &str = "STARTUP_URL";
pub const USE_TINYPROXY: &str = "USE_TINYPROXY";
pub const VNC_PASSWORD: &str = "VNC_PASSWORD";
pub const VNC_SECURE: &str = "VNC_SECURE";
pub const DISPLAY_WIDTH: &str = "DISPLAY_WIDTH";
pub const DISPLAY_HEIGHT: &str = "DISPLAY_HEIGHT";
pub const DARK_MODE: &str = "DARK_MODE";
pub const WITH_MONITORING: &str = "WITH_MONITORING";
pub const PROXY_AUTH_KEY: &str = "PROXY_AUTH_KEY";

const TRUTHY: [&str; 5] = ["true", "1", "t", "y", "yes"];

/// Case-insensitive; anything outside the truthy set is false.
pub fn parse_flag(value: &str) -> bool {
    TRUTHY.contains(&value.to_lowercase().as_str())
}

/// Generation parameters, captured once at start-up and passed by reference
/// through the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub instances: u32,
    pub startup_url: String,
    pub forward_proxy: bool,
    pub vnc_password: String,
    pub vnc_secure: bool,
    pub display_width: String,
    pub display_height: String,
    pub dark_mode: String,
    pub monitoring: bool,
    pub proxy_auth_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instances: 1,
            startup_url: String::new(),
            forward_proxy: false,
            vnc_password: "password".to_string(),
            vnc_secure: false,
            display_width: "1280".to_string(),
            display_height: "720".to_string(),
            dark_mode: "1".to_string(),
            monitoring: false,
            proxy_auth_key: String::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves every parameter through `lookup`, falling back to the
    /// defaults for keys it does not know.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let flag = |key: &str, default: bool| lookup(key).map_or(default, |v| parse_flag(&v));

        let instances = match lookup(INSTANCES) {
            Some(value) => parse_instances(&value)?,
            None => defaults.instances,
        };

        Ok(Config {
            instances,
            startup_url: string(STARTUP_URL, defaults.startup_url),
            forward_proxy: flag(USE_TINYPROXY, defaults.forward_proxy),
            vnc_password: string(VNC_PASSWORD, defaults.vnc_password),
            vnc_secure: flag(VNC_SECURE, defaults.vnc_secure),
            display_width: string(DISPLAY_WIDTH, defaults.display_width),
            display_height: string(DISPLAY_HEIGHT, defaults.display_height),
            dark_mode: string(DARK_MODE, defaults.dark_mode),
            monitoring: flag(WITH_MONITORING, defaults.monitoring),
            proxy_auth_key: string(PROXY_AUTH_KEY, defaults.proxy_auth_key),
        })
    }
}

fn parse_instances(value: &str) -> Result<u32> {
    let invalid = |reason: String| GenerateError::Config {
        variable: INSTANCES,
        value: value.to_string(),
        reason,
    };

    let instances: u32 = value.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
    if instances > MAX_INSTANCES {
        return Err(invalid(format!(
            "at most {} instances fit above display port {}",
            MAX_INSTANCES, BASE_DISPLAY_PORT
        )));
    }
    Ok(instances)
}
