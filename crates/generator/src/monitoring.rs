use compose::{Command, ComposeFile, Network, Port, Service, ServiceNetworks, VolumeMount};

use crate::manifest::INSTANCE_PREFIX;

pub const MONITORING_SERVICE: &str = "prometheus";
pub const MONITORING_VOLUME: &str = "prometheus_data";
pub const MONITORING_NETWORK: &str = "gemini_proxy_network";

const PROMETHEUS_IMAGE: &str = "prom/prometheus:v2.37.0";
const PROMETHEUS_PORT: u16 = 9090;

fn prometheus() -> Service {
    let mut service = Service::default();
    service.image = Some(PROMETHEUS_IMAGE.to_string());
    service.container_name = Some(MONITORING_SERVICE.to_string());
    service.restart = Some("unless-stopped".to_string());
    service.volumes = vec![
        VolumeMount::named("./monitoring/prometheus", "/etc/prometheus"),
        VolumeMount::named(MONITORING_VOLUME, "/prometheus"),
    ];
    service.command = Some(Command::Exec(vec![
        "--config.file=/etc/prometheus/prometheus.yml".to_string(),
    ]));
    service.ports = vec![Port::same(PROMETHEUS_PORT)];
    service
}

/// Adds the Prometheus collector, its data volume and a bridge network.
///
/// Every service except the generated instances joins the network.
pub fn attach(compose: &mut ComposeFile) {
    compose
        .services
        .insert(MONITORING_SERVICE.to_string(), prometheus());
    compose
        .volumes
        .get_or_insert_with(Default::default)
        .insert(MONITORING_VOLUME.to_string(), None);
    compose.networks = Some(
        [(MONITORING_NETWORK.to_string(), Some(Network::bridge()))]
            .into_iter()
            .collect(),
    );

    for (name, service) in compose.services.iter_mut() {
        if !name.starts_with(INSTANCE_PREFIX) {
            service.networks = Some(ServiceNetworks::List(vec![MONITORING_NETWORK.to_string()]));
        }
    }

    tracing::info!(service = MONITORING_SERVICE, "attached monitoring stack");
}
