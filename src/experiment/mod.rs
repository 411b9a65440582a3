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
//! Module describing experiments that can be executed on the emulated testbed.

pub mod presets;
pub mod runner;

pub use presets::*;
pub use runner::*;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{daemon::DaemonLogLevel, topology::Topology};

/// Describes an experiment that can be executed on the emulated testbed.
///
/// The three historical experiment scripts differ only in topology shape
/// and a couple of optional steps; those differences are data here, not
/// separate drivers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentDescription {
    pub name: String,
    pub topology: Topology,
    pub options: ExperimentOptions,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExperimentOptions {
    /// Log level forwarded to both daemons on every host.
    pub log_level: DaemonLogLevel,
    /// Host whose daemons are silenced via `NDN_LOG="ndn.*=FATAL"` in the
    /// host's ambient environment.
    pub silence: Option<String>,
    /// Producer/consumer role assignment, including the prefix the producer
    /// advertises through the routing daemon's control interface.
    pub roles: Option<RoleConfig>,
    /// Optional application traffic to exercise the converged routes.
    pub traffic: Option<TrafficConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub producer: String,
    pub consumer: String,
    pub prefix: String,
}

impl RoleConfig {
    /// The advertise command issued once on the producer host.
    pub fn advertise_command(&self) -> String {
        format!("nlsrc advertise {}", self.prefix)
    }
}

/// Commands run on the producer and consumer hosts once routing has
/// converged. Off in every preset; the applications must already be
/// installed on the system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficConfig {
    pub producer_cmd: String,
    pub consumer_cmd: String,
}

/// Deadlines and poll interval for the readiness and convergence probes.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Timings {
    /// Deadline for each daemon's liveness probe after launch.
    pub daemon_ready: Duration,
    /// Deadline for network-wide routing convergence.
    pub convergence: Duration,
    /// Interval between consecutive probes.
    pub poll_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            daemon_ready: Duration::from_secs(15),
            convergence: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}
