use compose::{
    ComposeFile, DependsOn, DependsOnCondition, Environment, Port, Service, VolumeMount, Volumes,
};

use crate::config::Config;
use crate::error::{GenerateError, Result};
use crate::monitoring;
use crate::templates::Templates;

pub const PROXY_SERVICE: &str = "proxy";
pub const CONTROL_PORT: u16 = 5345;

/// Instance `i` listens on `BASE_DISPLAY_PORT + i`.
pub const BASE_DISPLAY_PORT: u16 = 5900;
pub const MAX_INSTANCES: u32 = (u16::MAX - BASE_DISPLAY_PORT) as u32;

pub const FORWARD_PROXY_SERVICE: &str = "tinyproxy";
pub const FORWARD_PROXY_PORT: u16 = 8888;

pub const INSTANCE_PREFIX: &str = "firefox-";
const INSTANCE_DATA_DIR: &str = "/config";

pub fn instance_service_name(index: u32) -> String {
    format!("{}{}", INSTANCE_PREFIX, index)
}

pub fn instance_container_name(index: u32) -> String {
    format!("firefox-vnc-{}", index)
}

pub fn instance_volume_name(index: u32) -> String {
    format!("firefox_data_{}", index)
}

/// Callers guarantee `index <= MAX_INSTANCES`.
pub fn display_port(index: u32) -> u16 {
    BASE_DISPLAY_PORT + index as u16
}

/// Builds the output manifest from the loaded templates.
///
/// The base manifest is consumed and mutated in place; the instance template
/// is cloned once per instance so no two instances share any sub-structure.
pub fn generate(config: &Config, templates: Templates) -> Result<ComposeFile> {
    let Templates {
        base: mut compose,
        instance,
        forward_proxy,
    } = templates;

    configure_proxy(proxy_mut(&mut compose)?, config);

    if config.forward_proxy {
        let forward_proxy = forward_proxy.ok_or(GenerateError::MissingService {
            service: FORWARD_PROXY_SERVICE,
        })?;
        compose
            .services
            .insert(FORWARD_PROXY_SERVICE.to_string(), forward_proxy);
    }

    for index in 1..=config.instances {
        let port = display_port(index);
        let service = instantiate(&instance, config, index, port);
        compose.services.insert(instance_service_name(index), service);
        proxy_mut(&mut compose)?.ports.push(Port::same(port));

        tracing::debug!(index, port, "added instance");
    }

    if compose.volumes.as_ref().is_some_and(|volumes| !volumes.is_empty()) {
        tracing::warn!("replacing volumes declared by the base manifest");
    }
    compose.volumes = Some(instance_volumes(config.instances));

    if config.monitoring {
        monitoring::attach(&mut compose);
    }

    Ok(compose)
}

fn proxy_mut(compose: &mut ComposeFile) -> Result<&mut Service> {
    compose
        .service_mut(PROXY_SERVICE)
        .ok_or(GenerateError::MissingService {
            service: PROXY_SERVICE,
        })
}

fn configure_proxy(proxy: &mut Service, config: &Config) {
    proxy.ports = vec![Port::same(CONTROL_PORT)];
    proxy
        .environment_mut()
        .push("PROXY_AUTH_KEY", config.proxy_auth_key.as_str());
}

fn instantiate(template: &Service, config: &Config, index: u32, port: u16) -> Service {
    let mut service = template.clone();

    let mut depends_on = DependsOn::new().with(PROXY_SERVICE, DependsOnCondition::ServiceHealthy);
    if config.forward_proxy {
        depends_on = depends_on.with(FORWARD_PROXY_SERVICE, DependsOnCondition::ServiceHealthy);
    }
    service.depends_on = Some(depends_on);

    service.container_name = Some(instance_container_name(index));
    service.volumes = vec![VolumeMount::named(
        &instance_volume_name(index),
        INSTANCE_DATA_DIR,
    )];
    service.environment = Some(instance_environment(config, port));

    service
}

/// Environment of one instance, built from scratch; the template's own
/// environment is discarded.
pub fn instance_environment(config: &Config, port: u16) -> Environment {
    let mut env = Environment::new();
    env.push("VNC_LISTENING_PORT", port.to_string());
    // disables the built-in web client
    env.push("WEB_LISTENING_PORT", "-1");
    env.push("FF_OPEN_URL", config.startup_url.as_str());
    env.push("VNC_PASSWORD", config.vnc_password.as_str());
    env.push("DISPLAY_WIDTH", config.display_width.as_str());
    env.push("DISPLAY_HEIGHT", config.display_height.as_str());
    env.push("DARK_MODE", config.dark_mode.as_str());

    if config.vnc_secure {
        env.push("SECURE_CONNECTION_VNC_METHOD", "TLS");
        env.push("SECURE_CONNECTION", "1");
    }

    if config.forward_proxy {
        let host = format!("\"{}\"", FORWARD_PROXY_SERVICE);
        env.push("FF_PREF_PROXY_TYPE", "network.proxy.type=1");
        env.push("FF_PREF_PROXY_HTTP_HOST", format!("network.proxy.http={}", host));
        env.push(
            "FF_PREF_PROXY_HTTP_PORT",
            format!("network.proxy.http_port={}", FORWARD_PROXY_PORT),
        );
        env.push("FF_PREF_PROXY_SSL_HOST", format!("network.proxy.ssl={}", host));
        env.push(
            "FF_PREF_PROXY_SSL_PORT",
            format!("network.proxy.ssl_port={}", FORWARD_PROXY_PORT),
        );
        env.push(
            "FF_PREF_NO_PROXY_ON",
            "network.proxy.no_proxies_on=\"localhost,127.0.0.1\"",
        );
    } else {
        env.push("FF_PREF_PROXY_TYPE", "network.proxy.type=0");
    }

    env
}

fn instance_volumes(instances: u32) -> Volumes {
    (1..=instances)
        .map(|index| (instance_volume_name(index), None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use compose::{Command, Network, ServiceNetworks};

    const BASE: &str = r#"
services:
  proxy:
    image: egress-proxy
    healthcheck:
      test: ["CMD", "true"]
"#;

    const INSTANCE: &str = r#"
image: jlesage/firefox
shm_size: 2gb
environment:
  - TEMPLATE_ONLY=1
"#;

    fn templates(forward_proxy: bool) -> Templates {
        Templates {
            base: compose::from_yaml(BASE).unwrap(),
            instance: compose::from_yaml(INSTANCE).unwrap(),
            forward_proxy: forward_proxy
                .then(|| compose::from_yaml("image: vimagick/tinyproxy\n").unwrap()),
        }
    }

    fn config(instances: u32) -> Config {
        Config {
            instances,
            ..Config::default()
        }
    }

    fn instance_names(compose: &ComposeFile) -> Vec<&str> {
        compose
            .services
            .keys()
            .map(String::as_str)
            .filter(|name| name.starts_with(INSTANCE_PREFIX))
            .collect()
    }

    fn port_strings(service: &Service) -> Vec<String> {
        service.ports.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_two_instances_without_extras() {
        let compose = generate(&config(2), templates(false)).unwrap();

        assert_eq!(
            compose.services.keys().collect::<Vec<_>>(),
            vec!["proxy", "firefox-1", "firefox-2"]
        );
        assert_eq!(
            port_strings(compose.service("proxy").unwrap()),
            vec!["5345:5345", "5901:5901", "5902:5902"]
        );
        assert_eq!(
            compose.volumes.as_ref().unwrap().keys().collect::<Vec<_>>(),
            vec!["firefox_data_1", "firefox_data_2"]
        );

        let env = compose.service("firefox-1").unwrap().environment.as_ref().unwrap();
        assert_eq!(env.get("VNC_LISTENING_PORT"), Some("5901"));
        assert_eq!(env.get("FF_PREF_PROXY_TYPE"), Some("network.proxy.type=0"));
        assert!(compose.networks.is_none());
    }

    #[test]
    fn test_counts_match_instances() {
        for instances in [0, 1, 5, 17] {
            let compose = generate(&config(instances), templates(false)).unwrap();
            let n = instances as usize;

            assert_eq!(instance_names(&compose).len(), n);
            assert_eq!(compose.volumes.as_ref().unwrap().len(), n);
            assert_eq!(compose.service("proxy").unwrap().ports.len(), n + 1);
        }
    }

    #[test]
    fn test_instance_ports_and_names() {
        let compose = generate(&config(3), templates(false)).unwrap();
        let proxy_ports = port_strings(compose.service("proxy").unwrap());

        for index in 1..=3 {
            let service = compose.service(&instance_service_name(index)).unwrap();
            let port = 5900 + index;

            assert_eq!(
                service.environment.as_ref().unwrap().get("VNC_LISTENING_PORT"),
                Some(port.to_string().as_str())
            );
            assert!(proxy_ports.contains(&format!("{}:{}", port, port)));
            assert_eq!(
                service.container_name.as_deref(),
                Some(format!("firefox-vnc-{}", index).as_str())
            );
            assert_eq!(
                service.volumes,
                vec![VolumeMount::Short(format!("firefox_data_{}:/config", index))]
            );
            assert_eq!(
                service.depends_on.as_ref().unwrap().condition(PROXY_SERVICE),
                Some(DependsOnCondition::ServiceHealthy)
            );
        }
    }

    #[test]
    fn test_instances_do_not_share_template_state() {
        let compose = generate(&config(2), templates(false)).unwrap();
        let first = compose.service("firefox-1").unwrap();
        let second = compose.service("firefox-2").unwrap();

        assert_ne!(first.environment, second.environment);
        assert_eq!(first.extra, second.extra);
        assert!(!first.environment.as_ref().unwrap().contains("TEMPLATE_ONLY"));
    }

    #[test]
    fn test_proxy_receives_auth_key() {
        let config = Config {
            proxy_auth_key: "s3cret".to_string(),
            ..config(1)
        };
        let compose = generate(&config, templates(false)).unwrap();
        let proxy = compose.service("proxy").unwrap();

        assert_eq!(
            proxy.environment.as_ref().unwrap().get("PROXY_AUTH_KEY"),
            Some("s3cret")
        );
        assert!(proxy.extra.contains_key("healthcheck"));
    }

    #[test]
    fn test_auth_key_follows_merged_environment() {
        let base = r#"
x-common: &common
  environment:
    - LOG_LEVEL=info
services:
  proxy:
    <<: *common
    image: egress-proxy
"#;
        let templates = Templates {
            base: compose::from_yaml(base).unwrap(),
            ..templates(false)
        };
        let compose = generate(&config(1), templates).unwrap();
        let proxy = compose.service("proxy").unwrap();

        let env: Vec<String> = proxy
            .environment
            .as_ref()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(env, vec!["LOG_LEVEL=info", "PROXY_AUTH_KEY="]);
        assert!(!proxy.extra.contains_key("<<"));
    }

    #[test]
    fn test_instance_keys_follow_assembly_order() {
        let compose = generate(&config(1), templates(false)).unwrap();
        let written = serde_yaml::to_value(compose.service("firefox-1").unwrap()).unwrap();
        let keys: Vec<&str> = written
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(serde_yaml::Value::as_str)
            .collect();

        assert_eq!(
            keys,
            vec![
                "image",
                "shm_size",
                "environment",
                "depends_on",
                "container_name",
                "volumes",
            ]
        );
    }

    #[test]
    fn test_forward_proxy_enabled() {
        let config = Config {
            forward_proxy: true,
            ..config(2)
        };
        let compose = generate(&config, templates(true)).unwrap();

        assert!(compose.service(FORWARD_PROXY_SERVICE).is_some());
        for name in ["firefox-1", "firefox-2"] {
            let service = compose.service(name).unwrap();
            let env = service.environment.as_ref().unwrap();

            assert_eq!(
                service.depends_on.as_ref().unwrap().condition(FORWARD_PROXY_SERVICE),
                Some(DependsOnCondition::ServiceHealthy)
            );
            assert_eq!(env.get("FF_PREF_PROXY_TYPE"), Some("network.proxy.type=1"));
            assert_eq!(
                env.get("FF_PREF_PROXY_HTTP_HOST"),
                Some("network.proxy.http=\"tinyproxy\"")
            );
            assert_eq!(
                env.get("FF_PREF_PROXY_HTTP_PORT"),
                Some("network.proxy.http_port=8888")
            );
            assert_eq!(
                env.get("FF_PREF_PROXY_SSL_HOST"),
                Some("network.proxy.ssl=\"tinyproxy\"")
            );
            assert_eq!(
                env.get("FF_PREF_PROXY_SSL_PORT"),
                Some("network.proxy.ssl_port=8888")
            );
            assert!(!env.iter().any(|var| var.to_string() == "FF_PREF_PROXY_TYPE=network.proxy.type=0"));
        }
    }

    #[test]
    fn test_forward_proxy_disabled() {
        let compose = generate(&config(1), templates(false)).unwrap();
        let service = compose.service("firefox-1").unwrap();
        let env = service.environment.as_ref().unwrap();

        assert!(compose.service(FORWARD_PROXY_SERVICE).is_none());
        assert!(!service.depends_on.as_ref().unwrap().contains(FORWARD_PROXY_SERVICE));
        assert!(!env.contains("FF_PREF_PROXY_HTTP_HOST"));
        assert!(!env.contains("FF_PREF_PROXY_SSL_PORT"));
        assert_eq!(env.get("FF_PREF_PROXY_TYPE"), Some("network.proxy.type=0"));
    }

    #[test]
    fn test_secure_display_toggles_two_entries() {
        let plain = instance_environment(&config(1), 5901);
        let secure = instance_environment(
            &Config {
                vnc_secure: true,
                ..config(1)
            },
            5901,
        );

        assert_eq!(secure.len(), plain.len() + 2);
        assert_eq!(secure.get("SECURE_CONNECTION_VNC_METHOD"), Some("TLS"));
        assert_eq!(secure.get("SECURE_CONNECTION"), Some("1"));
        assert!(!plain.contains("SECURE_CONNECTION_VNC_METHOD"));
        assert!(!plain.contains("SECURE_CONNECTION"));
    }

    #[test]
    fn test_environment_order() {
        let env = instance_environment(&config(1), 5901);
        let entries: Vec<String> = env.iter().map(ToString::to_string).collect();

        assert_eq!(
            entries,
            vec![
                "VNC_LISTENING_PORT=5901",
                "WEB_LISTENING_PORT=-1",
                "FF_OPEN_URL=",
                "VNC_PASSWORD=password",
                "DISPLAY_WIDTH=1280",
                "DISPLAY_HEIGHT=720",
                "DARK_MODE=1",
                "FF_PREF_PROXY_TYPE=network.proxy.type=0",
            ]
        );
    }

    #[test]
    fn test_base_volumes_are_replaced() {
        let mut templates = templates(false);
        templates.base.volumes = Some([("stale".to_string(), None)].into_iter().collect());

        let compose = generate(&config(1), templates).unwrap();
        assert_eq!(
            compose.volumes.unwrap().keys().collect::<Vec<_>>(),
            vec!["firefox_data_1"]
        );
    }

    #[test]
    fn test_monitoring_stack() {
        let config = Config {
            monitoring: true,
            forward_proxy: true,
            ..config(2)
        };
        let compose = generate(&config, templates(true)).unwrap();

        let prometheus = compose.service(monitoring::MONITORING_SERVICE).unwrap();
        assert_eq!(
            prometheus.command,
            Some(Command::Exec(vec![
                "--config.file=/etc/prometheus/prometheus.yml".to_string()
            ]))
        );
        assert_eq!(
            compose.volumes.as_ref().unwrap().keys().collect::<Vec<_>>(),
            vec!["firefox_data_1", "firefox_data_2", "prometheus_data"]
        );
        assert_eq!(
            compose
                .networks
                .as_ref()
                .unwrap()
                .get(monitoring::MONITORING_NETWORK),
            Some(&Some(Network::bridge()))
        );

        let attached = ServiceNetworks::List(vec![monitoring::MONITORING_NETWORK.to_string()]);
        for (name, service) in compose.services.iter() {
            if name.starts_with(INSTANCE_PREFIX) {
                assert_eq!(service.networks, None, "{} should not be attached", name);
            } else {
                assert_eq!(service.networks.as_ref(), Some(&attached), "{}", name);
            }
        }
    }

    #[test]
    fn test_missing_proxy_service() {
        let mut templates = templates(false);
        templates.base.services = Default::default();

        let err = generate(&config(1), templates).unwrap_err();
        assert!(matches!(
            err,
            GenerateError::MissingService {
                service: PROXY_SERVICE
            }
        ));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let config = Config {
            forward_proxy: true,
            monitoring: true,
            vnc_secure: true,
            ..config(4)
        };
        let first = generate(&config, templates(true)).unwrap().to_yaml().unwrap();
        let second = generate(&config, templates(true)).unwrap().to_yaml().unwrap();

        assert_eq!(first, second);
    }
}
