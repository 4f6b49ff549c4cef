//! Per-instance filesystem workspaces.
//!
//! Every instance gets its own directory under a global root, seeded with
//! the compose manifest and env templates plus the chain's genesis file.
//! Teardown is gated behind [`WorkspaceManager::validate`]: a directory
//! that doesn't look exactly like a workspace we created is never removed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{error, info};

use crate::compose::ComposeRunner;

pub const COMPOSE_MANIFEST: &str = "docker-compose.yml";
pub const BACKEND_ENV: &str = "common-backend.env";
pub const FRONTEND_ENV: &str = "common-frontend.env";
pub const GENESIS_FILE: &str = "genesis.json";
pub const LOG_FILE: &str = "logs";

const COMPOSE_TEMPLATE: &str = include_str!("../templates/docker-compose.yml");
const BACKEND_ENV_TEMPLATE: &str = include_str!("../templates/common-backend.env");
const FRONTEND_ENV_TEMPLATE: &str = include_str!("../templates/common-frontend.env");

/// Placeholder seed written when a chain has no genesis file configured.
const GENESIS_PLACEHOLDER: &str = "{}\n";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to read workspace directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("workspace directory is empty")]
    Empty,
    #[error("unexpected entry in workspace: {0}")]
    UnexpectedEntry(String),
    #[error("missing expected entry: {0}")]
    MissingEntry(String),
}

fn expected_entries() -> BTreeSet<&'static str> {
    [
        COMPOSE_MANIFEST,
        BACKEND_ENV,
        FRONTEND_ENV,
        GENESIS_FILE,
        LOG_FILE,
    ]
    .into_iter()
    .collect()
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    compose: ComposeRunner,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, compose: ComposeRunner) -> Self {
        Self {
            root: root.into(),
            compose,
        }
    }

    /// Default global root: `$SCOPEUP_WORKSPACE_ROOT` or `<tmp>/scopeup`.
    pub fn default_root() -> PathBuf {
        std::env::var("SCOPEUP_WORKSPACE_ROOT")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("scopeup"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures the global root exists. Idempotent.
    pub async fn create_global(&self) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create global workspace {}", self.root.display()))?;
        Ok(self.root.clone())
    }

    /// Creates a fresh instance workspace seeded with the template artifacts
    /// and the chain's genesis file (or a placeholder when absent).
    pub async fn create_instance(&self, seed: Option<&Path>) -> anyhow::Result<PathBuf> {
        self.create_global().await?;

        let genesis = match seed {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read genesis seed {}", path.display()))?,
            None => GENESIS_PLACEHOLDER.to_string(),
        };

        let dir = self
            .root
            .join(format!("instance-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir(&dir)
            .await
            .with_context(|| format!("create instance workspace {}", dir.display()))?;

        let files = [
            (COMPOSE_MANIFEST, COMPOSE_TEMPLATE),
            (BACKEND_ENV, BACKEND_ENV_TEMPLATE),
            (FRONTEND_ENV, FRONTEND_ENV_TEMPLATE),
            (GENESIS_FILE, genesis.as_str()),
        ];
        for (name, content) in files {
            tokio::fs::write(dir.join(name), content)
                .await
                .with_context(|| format!("write workspace artifact {name}"))?;
        }

        Ok(dir)
    }

    /// Safety gate before any recursive delete: the directory must contain
    /// exactly the expected artifact set, nothing more, nothing less.
    pub async fn validate(&self, dir: &Path) -> Result<(), WorkspaceError> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut actual = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await? {
            actual.insert(entry.file_name().to_string_lossy().into_owned());
        }

        if actual.is_empty() {
            return Err(WorkspaceError::Empty);
        }

        let expected = expected_entries();
        if let Some(extra) = actual.iter().find(|name| !expected.contains(name.as_str())) {
            return Err(WorkspaceError::UnexpectedEntry(extra.clone()));
        }
        if let Some(missing) = expected.iter().find(|name| !actual.contains(**name)) {
            return Err(WorkspaceError::MissingEntry(missing.to_string()));
        }
        Ok(())
    }

    /// Tears an instance workspace down: validates it, stops its containers
    /// via `compose down`, then removes the directory. On any failure the
    /// directory is left in place for inspection.
    pub async fn destroy(&self, dir: &Path) -> anyhow::Result<()> {
        self.validate(dir)
            .await
            .with_context(|| format!("not a scopeup workspace: {}", dir.display()))?;

        self.compose.down(dir).await?;

        tokio::fs::remove_dir_all(dir)
            .await
            .with_context(|| format!("remove workspace {}", dir.display()))?;
        Ok(())
    }

    /// Best-effort sweep over every instance workspace under the root,
    /// logging and continuing past individual failures. Used by the offline
    /// `clean` command, not by normal shutdown.
    pub async fn cleanup_all(&self) -> anyhow::Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read global workspace {}", self.root.display()));
            }
        };

        while let Some(entry) = entries.next_entry().await.context("read workspace entry")? {
            let path = entry.path();
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            info!(workspace = %path.display(), "cleaning up instance workspace");
            if let Err(err) = self.destroy(&path).await {
                error!(workspace = %path.display(), error = %err, "failed to clean up instance workspace");
            }
        }
        Ok(())
    }
}
