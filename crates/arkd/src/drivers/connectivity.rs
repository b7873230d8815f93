//! Internet reachability probe.
//!
//! Online means any probe target answered with a 2xx status in any of a few
//! rounds. All targets of a round are requested concurrently.

use crate::capabilities::ConnectivityProbe;
use async_trait::async_trait;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::debug;

const PROBE_TARGETS: [&str; 2] = ["https://www.google.com", "https://www.cloudflare.com"];
const PROBE_ROUNDS: usize = 3;
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpConnectivity {
    client: reqwest::Client,
    targets: Vec<String>,
}

impl HttpConnectivity {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_targets(PROBE_TARGETS.iter().map(|t| t.to_string()).collect())
    }

    pub fn with_targets(targets: Vec<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self { client, targets })
    }

    async fn round(&self) -> bool {
        let mut set = JoinSet::new();
        for target in &self.targets {
            let request = self.client.get(target).send();
            let target = target.clone();
            set.spawn(async move {
                match request.await {
                    Ok(response) => (200..=204).contains(&response.status().as_u16()),
                    Err(e) => {
                        debug!("Probe {} failed: {}", target, e);
                        false
                    }
                }
            });
        }

        while let Some(result) = set.join_next().await {
            if matches!(result, Ok(true)) {
                set.abort_all();
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivity {
    async fn check(&self) -> bool {
        for _ in 0..PROBE_ROUNDS {
            if self.round().await {
                return true;
            }
        }
        false
    }
}
