use crate::config::NetworkConfig;
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info, instrument};
use url::Url;

/// Outcome of probing one external service
#[derive(Debug, Clone)]
pub struct ServiceHealth {
    pub service: &'static str,
    pub url: Url,
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl ServiceHealth {
    /// Reachable and not failing server-side. The indexer answers a bare GET
    /// with a client error, which still means it is up.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status.is_some_and(|status| status < 500)
    }
}

/// Probe the indexer, node and proof server of `network`.
#[instrument(skip_all, fields(network = %network.id))]
pub async fn check_services(network: &NetworkConfig, timeout: Duration) -> Vec<ServiceHealth> {
    let client = match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            error!("❌ Failed to build HTTP client: {e}");
            return Vec::new();
        }
    };

    let services = [
        ("indexer", &network.indexer),
        ("node", &network.node),
        ("proof server", &network.proof_server),
    ];

    let mut results = Vec::with_capacity(services.len());
    for (service, url) in services {
        results.push(probe(&client, service, url).await);
    }
    results
}

async fn probe(client: &Client, service: &'static str, url: &Url) -> ServiceHealth {
    info!("Checking {service} at {url}...");

    match client.get(url.clone()).send().await {
        Ok(response) => {
            let status = response.status();
            let health = ServiceHealth {
                service,
                url: url.clone(),
                status: Some(status.as_u16()),
                error: None,
            };
            if health.is_healthy() {
                info!("✅ {service} is reachable");
                info!("   Status: {status}");
            } else {
                info!("⚠️ {service} returned status: {status}");
            }
            health
        }
        Err(e) => {
            error!("❌ Failed to reach {service}: {e}");
            ServiceHealth {
                service,
                url: url.clone(),
                status: None,
                error: Some(e.to_string()),
            }
        }
    }
}
