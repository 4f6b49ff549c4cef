//! Post-start contract verification worker.
//!
//! Rollup chains ship with a set of well-known proxy predeploys. Once the
//! backend reports healthy, the worker asks it for each proxy's
//! implementation addresses and then requests verification of each one, so
//! the explorer UI shows decoded contracts instead of raw bytecode. The
//! whole pass is best effort and runs until done or cancelled.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::signal::Latch;

/// OP Stack predeploy proxies worth verifying on any rollup chain.
const WELL_KNOWN_PROXIES: &[(&str, &str)] = &[
    ("L2CrossDomainMessenger", "0x4200000000000000000000000000000000000007"),
    ("L2StandardBridge", "0x4200000000000000000000000000000000000010"),
    ("L2ToL1MessagePasser", "0x4200000000000000000000000000000000000016"),
];

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    healthy: bool,
}

#[derive(Debug, Deserialize)]
struct SmartContractResponse {
    #[serde(default)]
    implementations: Vec<Implementation>,
}

#[derive(Debug, Deserialize)]
struct Implementation {
    address: String,
}

pub struct Verifier {
    chain: String,
    backend_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
}

impl Verifier {
    pub fn new(chain: impl Into<String>, backend_url: impl Into<String>) -> Self {
        // Static configuration; the builder only fails if the TLS backend
        // cannot initialize, and the worker must not run without a timeout.
        let client = reqwest::Client::builder()
            .user_agent("scopeup")
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("build http client");
        Self {
            chain: chain.into(),
            backend_url: backend_url.into(),
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Waits for the backend to come up, then runs one verification pass.
    /// Returns early if `cancel` trips first.
    pub async fn run(&self, cancel: Latch) {
        tokio::select! {
            _ = cancel.tripped() => {
                debug!(chain = %self.chain, "verification cancelled before backend came up");
                return;
            }
            _ = self.wait_until_healthy() => {}
        }

        info!(chain = %self.chain, "backend healthy, verifying well-known contracts");
        for (name, proxy) in WELL_KNOWN_PROXIES {
            if cancel.is_tripped() {
                return;
            }
            let implementations = match self.implementation_addresses(proxy).await {
                Ok(implementations) => implementations,
                Err(err) => {
                    // The backend answered the health check but not this;
                    // assume it is going away and stop the pass.
                    warn!(chain = %self.chain, contract = name, error = %err, "failed to look up implementations");
                    return;
                }
            };
            for address in implementations {
                self.trigger_verification(name, &address).await;
            }
        }
    }

    async fn wait_until_healthy(&self) {
        loop {
            if self.is_healthy().await {
                return;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/api/health", self.backend_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp
                .json::<HealthResponse>()
                .await
                .map(|h| h.healthy)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Fetching a smart contract's detail page is also what makes the
    /// backend resolve and verify it, so lookup and trigger share a route.
    async fn implementation_addresses(&self, contract: &str) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/api/v2/smart-contracts/{contract}", self.backend_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<SmartContractResponse>()
            .await?;
        Ok(resp.implementations.into_iter().map(|i| i.address).collect())
    }

    async fn trigger_verification(&self, name: &str, address: &str) {
        let url = format!("{}/api/v2/smart-contracts/{address}", self.backend_url);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(chain = %self.chain, contract = name, %address, "requested contract verification");
            }
            Ok(resp) => {
                warn!(chain = %self.chain, contract = name, %address, status = %resp.status(), "contract verification request rejected");
            }
            Err(err) => {
                warn!(chain = %self.chain, contract = name, %address, error = %err, "contract verification request failed");
            }
        }
    }
}
