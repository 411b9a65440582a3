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
//! Library for running NDN experiments on emulated network topologies.
//!
//! The library builds an abstract topology of hosts and delay-shaped links,
//! materializes it as Linux network namespaces, starts the NDN forwarding and
//! routing daemons on every emulated host, waits for routing convergence, and
//! hands the live network to an interactive console. The daemons themselves
//! (`nfd`, `nlsr`) and the host-level tooling (`ip`, `tc`) are external
//! collaborators driven as black boxes.

pub mod console;
pub mod daemon;
pub mod emulation;
pub mod experiment;
pub mod topology;
pub mod util;

pub mod prelude {
    pub use super::{
        console::{Batch, Cli, Console},
        daemon::{DaemonHandle, DaemonKind, DaemonLogLevel},
        emulation::{netns::NetnsEmulation, Emulation, EmulationError, Environment},
        experiment::{
            runner, ExperimentDescription, ExperimentOptions, ExperimentReport, Preset, Timings,
        },
        topology::{Shape, Topology},
    };
}
