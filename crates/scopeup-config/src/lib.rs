//! Static configuration for the explorer stacks scopeup manages.
//!
//! A [`NetworkConfig`] describes the chains of a local network; calling
//! [`NetworkConfig::explorer_configs`] derives one immutable
//! [`ExplorerConfig`] per chain: assigned ports, docker image coordinates,
//! and the resolved dependent-chain reference for rollup chains.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_FRONTEND_STARTING_PORT: u16 = 3000;
pub const DEFAULT_BACKEND_STARTING_PORT: u16 = 4000;
pub const DEFAULT_POSTGRES_STARTING_PORT: u16 = 7432;

const BACKEND_REPO: &str = "blockscout";
const BACKEND_REPO_OPTIMISM: &str = "blockscout-optimism";
const BACKEND_TAG: &str = "7.0.0";
const BACKEND_TAG_OPTIMISM: &str = "7.0.0-postrelease-bac46e76";
const FRONTEND_TAG: &str = "v1.37.4";
const FRONTEND_TAG_OPTIMISM: &str = "interop";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate chain name: {0}")]
    DuplicateChainName(String),
    #[error("chain {chain} depends on unknown chain {depends_on}")]
    UnknownDependency { chain: String, depends_on: String },
    #[error("chain {chain} depends on {depends_on}, which must appear earlier in the chain list")]
    ForwardDependency { chain: String, depends_on: String },
    #[error("chain {0} declares a dependency but no l1_system_config_contract")]
    MissingSystemConfigContract(String),
    #[error("chain {0}: assigned port exceeds the valid port range")]
    PortRangeExhausted(String),
}

/// What happens to the rest of the fleet when one instance's subprocess
/// dies unexpectedly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// One dead instance requests shutdown of the whole process.
    #[default]
    Propagate,
    /// Other instances keep running.
    Isolate,
}

/// A single chain the local network exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    #[serde(default)]
    pub first_block: u64,
    /// Path to the chain's genesis/spec file, copied into the instance
    /// workspace at provisioning time. A placeholder is written when absent.
    #[serde(default)]
    pub genesis_file: Option<PathBuf>,
    /// Name of the chain this one settles to (an L2 referencing its L1).
    /// Must name an earlier entry in [`NetworkConfig::chains`].
    #[serde(default)]
    pub depends_on: Option<String>,
    #[serde(default)]
    pub l1_system_config_contract: Option<String>,
}

/// Dependent-chain wiring resolved from [`ChainConfig::depends_on`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    pub l1_rpc_url: String,
    pub l1_system_config_contract: String,
    /// Frontend URL of the L1 chain's own explorer instance, if one is
    /// managed by the same network.
    pub l1_explorer_url: Option<String>,
}

/// Host ports assigned to one instance's services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePorts {
    pub frontend: u16,
    pub backend: u16,
    pub postgres: u16,
}

/// Docker image coordinates for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub backend_repo: String,
    pub backend_tag: String,
    pub frontend_tag: String,
}

/// Everything one managed instance needs to know. Immutable after
/// derivation; the lifecycle code only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub first_block: u64,
    pub genesis_file: Option<PathBuf>,
    pub ports: ServicePorts,
    pub image: ImageConfig,
    pub rollup: Option<RollupConfig>,
}

impl ExplorerConfig {
    pub fn backend_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.ports.backend)
    }

    pub fn frontend_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.ports.frontend)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chains: Vec<ChainConfig>,
    #[serde(default = "default_frontend_port")]
    pub starting_frontend_port: u16,
    #[serde(default = "default_backend_port")]
    pub starting_backend_port: u16,
    #[serde(default = "default_postgres_port")]
    pub starting_postgres_port: u16,
    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,
}

fn default_frontend_port() -> u16 {
    DEFAULT_FRONTEND_STARTING_PORT
}

fn default_backend_port() -> u16 {
    DEFAULT_BACKEND_STARTING_PORT
}

fn default_postgres_port() -> u16 {
    DEFAULT_POSTGRES_STARTING_PORT
}

impl NetworkConfig {
    /// Derives one [`ExplorerConfig`] per chain, in input order, assigning
    /// sequential ports from the starting values. Dependency references are
    /// resolved here, once, against the chains already derived; a reference
    /// to a later chain is an error rather than a silent miss.
    pub fn explorer_configs(&self) -> Result<Vec<ExplorerConfig>, ConfigError> {
        let mut configs: Vec<ExplorerConfig> = Vec::with_capacity(self.chains.len());

        for (i, chain) in self.chains.iter().enumerate() {
            if configs.iter().any(|c| c.name == chain.name) {
                return Err(ConfigError::DuplicateChainName(chain.name.clone()));
            }

            let rollup = match &chain.depends_on {
                None => None,
                Some(depends_on) => {
                    let contract = chain.l1_system_config_contract.clone().ok_or_else(|| {
                        ConfigError::MissingSystemConfigContract(chain.name.clone())
                    })?;
                    let l1 = configs.iter().find(|c| &c.name == depends_on);
                    let l1 = match l1 {
                        Some(l1) => l1,
                        None => {
                            let err = if self.chains.iter().any(|c| &c.name == depends_on) {
                                ConfigError::ForwardDependency {
                                    chain: chain.name.clone(),
                                    depends_on: depends_on.clone(),
                                }
                            } else {
                                ConfigError::UnknownDependency {
                                    chain: chain.name.clone(),
                                    depends_on: depends_on.clone(),
                                }
                            };
                            return Err(err);
                        }
                    };
                    Some(RollupConfig {
                        l1_rpc_url: l1.rpc_url.clone(),
                        l1_system_config_contract: contract,
                        l1_explorer_url: Some(format!(
                            "http://host.docker.internal:{}",
                            l1.ports.frontend
                        )),
                    })
                }
            };

            let offset = u16::try_from(i)
                .map_err(|_| ConfigError::PortRangeExhausted(chain.name.clone()))?;
            configs.push(ExplorerConfig {
                name: chain.name.clone(),
                rpc_url: chain.rpc_url.clone(),
                chain_id: chain.chain_id,
                first_block: chain.first_block,
                genesis_file: chain.genesis_file.clone(),
                ports: ServicePorts {
                    frontend: checked_port(self.starting_frontend_port, offset, &chain.name)?,
                    backend: checked_port(self.starting_backend_port, offset, &chain.name)?,
                    postgres: checked_port(self.starting_postgres_port, offset, &chain.name)?,
                },
                image: image_config(rollup.is_some()),
                rollup,
            });
        }

        Ok(configs)
    }
}

fn checked_port(start: u16, offset: u16, chain: &str) -> Result<u16, ConfigError> {
    start
        .checked_add(offset)
        .ok_or_else(|| ConfigError::PortRangeExhausted(chain.to_string()))
}

fn image_config(rollup: bool) -> ImageConfig {
    if rollup {
        ImageConfig {
            backend_repo: BACKEND_REPO_OPTIMISM.to_string(),
            backend_tag: BACKEND_TAG_OPTIMISM.to_string(),
            frontend_tag: FRONTEND_TAG_OPTIMISM.to_string(),
        }
    } else {
        ImageConfig {
            backend_repo: BACKEND_REPO.to_string(),
            backend_tag: BACKEND_TAG.to_string(),
            frontend_tag: FRONTEND_TAG.to_string(),
        }
    }
}

/// Single-instance network pointed at a default local Anvil node.
pub fn default_anvil_network() -> NetworkConfig {
    NetworkConfig {
        chains: vec![ChainConfig {
            name: "Local Anvil".to_string(),
            rpc_url: "http://host.docker.internal:8545".to_string(),
            chain_id: 900,
            first_block: 0,
            genesis_file: None,
            depends_on: None,
            l1_system_config_contract: None,
        }],
        starting_frontend_port: DEFAULT_FRONTEND_STARTING_PORT,
        starting_backend_port: DEFAULT_BACKEND_STARTING_PORT,
        starting_postgres_port: DEFAULT_POSTGRES_STARTING_PORT,
        shutdown_policy: ShutdownPolicy::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(name: &str, rpc: &str, chain_id: u64) -> ChainConfig {
        ChainConfig {
            name: name.to_string(),
            rpc_url: rpc.to_string(),
            chain_id,
            first_block: 0,
            genesis_file: None,
            depends_on: None,
            l1_system_config_contract: None,
        }
    }

    fn network(chains: Vec<ChainConfig>) -> NetworkConfig {
        NetworkConfig {
            chains,
            starting_frontend_port: 3000,
            starting_backend_port: 4000,
            starting_postgres_port: 7432,
            shutdown_policy: ShutdownPolicy::default(),
        }
    }

    #[test]
    fn ports_increment_in_input_order() {
        let net = network(vec![
            chain("A", "http://host.docker.internal:8545", 900),
            chain("B", "http://host.docker.internal:9545", 901),
            chain("C", "http://host.docker.internal:9546", 902),
        ]);
        let configs = net.explorer_configs().unwrap();
        assert_eq!(configs.len(), 3);
        assert_eq!(configs[0].ports.frontend, 3000);
        assert_eq!(configs[1].ports.backend, 4001);
        assert_eq!(configs[2].ports.postgres, 7434);
    }

    #[test]
    fn plain_chain_gets_vanilla_images() {
        let net = network(vec![chain("A", "http://host.docker.internal:8545", 900)]);
        let configs = net.explorer_configs().unwrap();
        assert_eq!(configs[0].image.backend_repo, "blockscout");
        assert_eq!(configs[0].image.frontend_tag, "v1.37.4");
        assert!(configs[0].rollup.is_none());
    }

    #[test]
    fn dependency_resolves_to_earlier_chain() {
        let mut l2 = chain("OP Chain", "http://host.docker.internal:9545", 901);
        l2.depends_on = Some("L1".to_string());
        l2.l1_system_config_contract = Some("0x1234".to_string());
        let net = network(vec![chain("L1", "http://host.docker.internal:8545", 900), l2]);

        let configs = net.explorer_configs().unwrap();
        let rollup = configs[1].rollup.as_ref().unwrap();
        assert_eq!(rollup.l1_rpc_url, "http://host.docker.internal:8545");
        assert_eq!(rollup.l1_system_config_contract, "0x1234");
        assert_eq!(
            rollup.l1_explorer_url.as_deref(),
            Some("http://host.docker.internal:3000")
        );
        assert_eq!(configs[1].image.backend_repo, "blockscout-optimism");
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut l2 = chain("OP Chain", "http://host.docker.internal:9545", 901);
        l2.depends_on = Some("Nope".to_string());
        l2.l1_system_config_contract = Some("0x1234".to_string());
        let net = network(vec![l2]);

        let err = net.explorer_configs().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownDependency {
                chain: "OP Chain".to_string(),
                depends_on: "Nope".to_string(),
            }
        );
    }

    #[test]
    fn forward_dependency_is_rejected() {
        let mut l2 = chain("OP Chain", "http://host.docker.internal:9545", 901);
        l2.depends_on = Some("L1".to_string());
        l2.l1_system_config_contract = Some("0x1234".to_string());
        let net = network(vec![l2, chain("L1", "http://host.docker.internal:8545", 900)]);

        let err = net.explorer_configs().unwrap_err();
        assert!(matches!(err, ConfigError::ForwardDependency { .. }));
    }

    #[test]
    fn dependency_without_contract_is_rejected() {
        let mut l2 = chain("OP Chain", "http://host.docker.internal:9545", 901);
        l2.depends_on = Some("L1".to_string());
        let net = network(vec![chain("L1", "http://host.docker.internal:8545", 900), l2]);

        let err = net.explorer_configs().unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingSystemConfigContract("OP Chain".to_string())
        );
    }

    #[test]
    fn port_assignment_past_the_range_is_rejected() {
        let mut net = network(vec![
            chain("A", "http://host.docker.internal:8545", 900),
            chain("B", "http://host.docker.internal:9545", 901),
        ]);
        net.starting_postgres_port = u16::MAX;

        let err = net.explorer_configs().unwrap_err();
        assert_eq!(err, ConfigError::PortRangeExhausted("B".to_string()));
    }

    #[test]
    fn duplicate_chain_name_is_rejected() {
        let net = network(vec![
            chain("A", "http://host.docker.internal:8545", 900),
            chain("A", "http://host.docker.internal:9545", 901),
        ]);
        assert_eq!(
            net.explorer_configs().unwrap_err(),
            ConfigError::DuplicateChainName("A".to_string())
        );
    }
}
