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
//! Module launching the NDN daemons on every emulated host.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tokio::time::Instant;

use crate::emulation::{EmulationError, Environment};

/// The two cooperating daemons every host runs. The routing daemon talks to
/// the forwarding daemon, so forwarding must be up before routing starts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum DaemonKind {
    Forwarding,
    Routing,
}

impl DaemonKind {
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Forwarding => "nfd",
            Self::Routing => "nlsr",
        }
    }

    /// `NDN_LOG` module selector for this daemon.
    fn log_selector(&self) -> &'static str {
        match self {
            Self::Forwarding => "*",
            Self::Routing => "nlsr.*",
        }
    }

    /// Cheap liveness probe against the daemon's control interface.
    pub fn probe(&self) -> &'static str {
        match self {
            Self::Forwarding => "nfdc status",
            Self::Routing => "nlsrc status",
        }
    }

    /// The shell command that starts this daemon at the given log level.
    pub fn launch_command(&self, level: DaemonLogLevel) -> String {
        format!(
            "env NDN_LOG='{}={level}' {}",
            self.log_selector(),
            self.binary()
        )
    }
}

/// Log level forwarded verbatim into the daemon's own logging
/// configuration. Has no effect on the launcher itself.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    clap::ValueEnum,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum DaemonLogLevel {
    #[default]
    Debug,
    Info,
    Fatal,
}

/// One background daemon on one emulated host. Not explicitly destroyed;
/// the process dies with the environment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonHandle {
    pub host: String,
    pub kind: DaemonKind,
    pub pid: u32,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Emulation(#[from] EmulationError),
    #[error("{kind} daemon on host `{host}` not ready within {waited:?}")]
    ReadyTimeout {
        kind: DaemonKind,
        host: String,
        waited: Duration,
    },
}

/// Start one daemon of the given kind per host, in host order.
///
/// Fails with the underlying `HostNotFound` error when a named host is
/// absent rather than silently launching nothing.
pub async fn launch<E: Environment>(
    env: &E,
    hosts: &[String],
    kind: DaemonKind,
    level: DaemonLogLevel,
) -> Result<Vec<DaemonHandle>, LaunchError> {
    let command = kind.launch_command(level);
    let mut handles = Vec::with_capacity(hosts.len());
    for host in hosts {
        let pid = env.spawn(host, &command).await?;
        log::debug!("{kind} daemon launched on {host} (pid {pid})");
        handles.push(DaemonHandle {
            host: host.clone(),
            kind,
            pid,
        });
    }
    Ok(handles)
}

/// Poll each daemon's liveness probe until it answers, or fail with
/// [`LaunchError::ReadyTimeout`] once the deadline passes. Replaces a blind
/// settle sleep with an explicit readiness contract.
pub async fn await_ready<E: Environment>(
    env: &E,
    handles: &[DaemonHandle],
    ready_timeout: Duration,
    poll_interval: Duration,
) -> Result<(), LaunchError> {
    for handle in handles {
        let deadline = Instant::now() + ready_timeout;
        loop {
            match env.cmd(&handle.host, handle.kind.probe()).await {
                Ok(_) => break,
                Err(EmulationError::CommandFailed { .. }) if Instant::now() < deadline => {
                    tokio::time::sleep(poll_interval).await;
                }
                Err(EmulationError::CommandFailed { .. }) => {
                    return Err(LaunchError::ReadyTimeout {
                        kind: handle.kind,
                        host: handle.host.clone(),
                        waited: ready_timeout,
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }
        log::debug!("{} daemon ready on {}", handle.kind, handle.host);
    }
    Ok(())
}
