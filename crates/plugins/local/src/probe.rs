//! Startup probe for locally installed DevOps executables.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::runner::{CommandRunner, CommandSpec};

/// Capability name and the command whose zero exit proves it.
const PROBES: &[(&str, &str, &[&str])] = &[
    ("docker", "docker", &["--version"]),
    ("kubectl", "kubectl", &["version", "--client"]),
    ("helm", "helm", &["version"]),
    ("git", "git", &["--version"]),
    ("azure-cli", "az", &["--version"]),
    ("terraform", "terraform", &["version"]),
];

#[cfg(windows)]
const PLATFORM_PROBES: &[(&str, &str, &[&str])] =
    &[("powershell", "powershell", &["-Command", "Get-Host"])];
#[cfg(not(windows))]
const PLATFORM_PROBES: &[(&str, &str, &[&str])] = &[];

/// Which executables were found working at startup. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    tools: BTreeMap<String, bool>,
}

impl Capabilities {
    pub fn new(tools: impl IntoIterator<Item = (String, bool)>) -> Self {
        Self {
            tools: tools.into_iter().collect(),
        }
    }

    /// True when `tool` was probed and answered with exit code 0.
    pub fn has(&self, tool: &str) -> bool {
        self.tools.get(tool).copied().unwrap_or(false)
    }

    /// Names of the available tools, sorted.
    pub fn available(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|(_, ok)| **ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Probe every known executable concurrently, each bounded by `timeout`.
///
/// Never fails: missing executables, non-zero exits, timeouts and panicked
/// probes all count as unavailable.
pub async fn probe(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Capabilities {
    let mut set = JoinSet::new();

    for (name, program, args) in PROBES.iter().chain(PLATFORM_PROBES) {
        let runner = runner.clone();
        let spec = CommandSpec::new(*program)
            .args(args.iter().copied())
            .timeout(timeout);
        set.spawn(async move {
            let available = match runner.run(&spec).await {
                Ok(output) => output.success(),
                Err(e) => {
                    debug!(tool = name, error = %e, "Probe failed");
                    false
                }
            };
            (name.to_string(), available)
        });
    }

    let mut tools = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((name, available)) => {
                tools.insert(name, available);
            }
            Err(e) => warn!(error = %e, "Probe task failed"),
        }
    }

    let capabilities = Capabilities { tools };
    info!(available = ?capabilities.available(), "Local tools probed");
    capabilities
}
