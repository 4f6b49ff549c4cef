//! Fleet-level lifecycle over a set of instances.
//!
//! Instances start in configuration order, so a dependent chain's L1
//! explorer exists before the L2 one comes up. A start failure aborts the
//! sequence; stop is unconditional and sweeps every instance regardless of
//! individual failures.

use anyhow::Context;
use scopeup_config::{ExplorerConfig, ShutdownPolicy};
use tracing::error;

use crate::compose::ComposeRunner;
use crate::instance::Instance;
use crate::signal::Latch;
use crate::workspace::WorkspaceManager;

pub struct Orchestrator {
    instances: Vec<Instance>,
}

impl Orchestrator {
    /// Prepares the global workspace and builds one instance per config.
    pub async fn new(
        configs: Vec<ExplorerConfig>,
        manager: WorkspaceManager,
        compose: ComposeRunner,
        policy: ShutdownPolicy,
        app_shutdown: Latch,
    ) -> anyhow::Result<Self> {
        manager
            .create_global()
            .await
            .context("prepare global workspace")?;

        let instances = configs
            .into_iter()
            .map(|config| {
                Instance::new(
                    config,
                    manager.clone(),
                    compose.clone(),
                    app_shutdown.clone(),
                    policy,
                )
            })
            .collect();
        Ok(Self { instances })
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Starts every instance in order, stopping at the first failure.
    /// Already-started instances keep running; the caller decides whether
    /// to stop them.
    pub async fn start(&self, ctx: &Latch) -> anyhow::Result<()> {
        for instance in &self.instances {
            if let Err(err) = instance.start(ctx).await {
                error!(chain = %instance.name(), error = %err, "failed to start explorer instance");
                return Err(err).with_context(|| format!("start instance {}", instance.name()));
            }
        }
        Ok(())
    }

    /// Stops every instance, attempting all of them even when some fail,
    /// and reports the failures as one error.
    pub async fn stop(&self) -> anyhow::Result<()> {
        let mut failures = Vec::new();
        for instance in &self.instances {
            if let Err(err) = instance.stop().await {
                error!(chain = %instance.name(), error = %err, "failed to stop explorer instance");
                failures.push(format!("{}: {err:#}", instance.name()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("failed to stop instances: {}", failures.join("; "));
        }
    }

    /// One banner for the whole fleet.
    pub fn config_summary(&self) -> String {
        let mut out = String::from("Running explorer instances:\n\n");
        for instance in &self.instances {
            out.push_str(&instance.config_summary());
            out.push('\n');
        }
        out
    }
}
