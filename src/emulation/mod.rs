// NERT: Running Named-Data Networking Experiments on Emulated Network Topologies
// Copyright (C) 2024-2025 Roland Schmid <roschmi@ethz.ch> and Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Module defining the narrow interface to the network emulation layer.

use async_trait::async_trait;
use thiserror::Error;

use crate::topology::Topology;

pub mod netns;

#[derive(Debug, Error)]
pub enum EmulationError {
    #[error("required dependency `{0}` is not installed")]
    DependencyMissing(String),
    #[error("insufficient privileges: {0}")]
    InsufficientPrivileges(String),
    #[error("host `{0}` not found in the running environment")]
    HostNotFound(String),
    #[error("the environment is not running")]
    EnvironmentNotRunning,
    #[error("setup command `{command}` failed: {stderr}")]
    Setup { command: String, stderr: String },
    #[error("command `{command}` on host `{host}` failed: {stderr}")]
    CommandFailed {
        host: String,
        command: String,
        stderr: String,
    },
    #[error("failed to {action}: {source}")]
    Io {
        action: String,
        #[source]
        source: std::io::Error,
    },
}

impl EmulationError {
    pub(crate) fn io(action: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            action: action.into(),
            source,
        }
    }
}

/// The external emulation collaborator.
///
/// Owns nothing while idle; [`Emulation::start`] materializes a topology
/// into a resource-holding [`Environment`].
#[async_trait]
pub trait Emulation {
    type Env: Environment;

    /// Remove leftover state of a previous (possibly crashed) run.
    /// Idempotent, safe to call when nothing is running.
    async fn clean_up(&self) -> Result<(), EmulationError>;

    /// Check that the required external daemons and tools are reachable.
    /// Fails fast with the name of the first missing dependency.
    async fn verify_dependencies(&self) -> Result<(), EmulationError>;

    /// Materialize the topology into a running environment with one
    /// emulated host per node and one shaped link per edge.
    async fn start(&self, topology: &Topology) -> Result<Self::Env, EmulationError>;
}

/// A live emulated network, obtained from [`Emulation::start`].
#[async_trait]
pub trait Environment: Send + Sync {
    /// Host identifiers, in topology order.
    fn hosts(&self) -> Vec<String>;

    /// Run a command on the given host and return its stdout.
    async fn cmd(&self, host: &str, command: &str) -> Result<String, EmulationError>;

    /// Start a background process on the given host and return its pid.
    /// The process is bound to the environment and dies with it.
    async fn spawn(&self, host: &str, command: &str) -> Result<u32, EmulationError>;

    /// Tear down all emulated hosts and links and release their resources.
    async fn stop(&mut self) -> Result<(), EmulationError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Call-recording collaborator double for sequencing tests.

    use std::sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    };

    use super::*;

    /// Records every lifecycle call and command in order, and can be
    /// configured to fail dependency verification or specific commands.
    #[derive(Clone, Default)]
    pub struct MockNet {
        pub calls: Arc<Mutex<Vec<String>>>,
        pub missing_dependency: Option<String>,
        pub fail_cmd_containing: Option<String>,
    }

    impl MockNet {
        pub fn recorded(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    pub struct MockEnv {
        hosts: Vec<String>,
        calls: Arc<Mutex<Vec<String>>>,
        fail_cmd_containing: Option<String>,
        running: AtomicBool,
        next_pid: AtomicU32,
    }

    impl MockEnv {
        fn check(&self, host: &str) -> Result<(), EmulationError> {
            if !self.running.load(Ordering::SeqCst) {
                return Err(EmulationError::EnvironmentNotRunning);
            }
            if !self.hosts.iter().any(|h| h == host) {
                return Err(EmulationError::HostNotFound(host.to_string()));
            }
            Ok(())
        }

        fn fail_if_configured(&self, host: &str, command: &str) -> Result<(), EmulationError> {
            if let Some(fragment) = &self.fail_cmd_containing {
                if command.contains(fragment.as_str()) {
                    return Err(EmulationError::CommandFailed {
                        host: host.to_string(),
                        command: command.to_string(),
                        stderr: "mock failure".to_string(),
                    });
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Emulation for MockNet {
        type Env = MockEnv;

        async fn clean_up(&self) -> Result<(), EmulationError> {
            self.calls.lock().unwrap().push("clean_up".to_string());
            Ok(())
        }

        async fn verify_dependencies(&self) -> Result<(), EmulationError> {
            self.calls
                .lock()
                .unwrap()
                .push("verify_dependencies".to_string());
            match &self.missing_dependency {
                Some(tool) => Err(EmulationError::DependencyMissing(tool.clone())),
                None => Ok(()),
            }
        }

        async fn start(&self, topology: &Topology) -> Result<Self::Env, EmulationError> {
            self.calls.lock().unwrap().push("start".to_string());
            Ok(MockEnv {
                hosts: topology.hosts(),
                calls: self.calls.clone(),
                fail_cmd_containing: self.fail_cmd_containing.clone(),
                running: AtomicBool::new(true),
                next_pid: AtomicU32::new(1000),
            })
        }
    }

    #[async_trait]
    impl Environment for MockEnv {
        fn hosts(&self) -> Vec<String> {
            self.hosts.clone()
        }

        async fn cmd(&self, host: &str, command: &str) -> Result<String, EmulationError> {
            self.check(host)?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("cmd {host} {command}"));
            self.fail_if_configured(host, command)?;
            if command.contains("routing-table") {
                // every other router is reachable
                let entries = self
                    .hosts
                    .iter()
                    .filter(|h| h.as_str() != host)
                    .map(|h| format!("  destination: /ndn/{h}-site/%C1.Router/{h}\n"))
                    .collect::<String>();
                return Ok(format!("Routing Table:\n{entries}"));
            }
            Ok(String::new())
        }

        async fn spawn(&self, host: &str, command: &str) -> Result<u32, EmulationError> {
            self.check(host)?;
            self.calls
                .lock()
                .unwrap()
                .push(format!("spawn {host} {command}"));
            self.fail_if_configured(host, command)?;
            Ok(self.next_pid.fetch_add(1, Ordering::SeqCst))
        }

        async fn stop(&mut self) -> Result<(), EmulationError> {
            self.calls.lock().unwrap().push("stop".to_string());
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }
    }
}
