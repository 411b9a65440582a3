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
use std::time::Duration;

use clap::Parser;

use nert::{
    console::{Batch, Cli},
    daemon::DaemonLogLevel,
    emulation::netns::NetnsEmulation,
    experiment::{runner, Preset, Timings},
    topology::Topology,
    util,
};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Experiment preset to run.
    #[arg(short, long, value_enum, default_value_t = Preset::EnvSetup)]
    preset: Preset,
    /// Overwrite the daemon log level of the preset.
    #[arg(short, long, value_enum)]
    log_level: Option<DaemonLogLevel>,
    /// Replace the preset's topology with custom `a:b[:10ms]` edge
    /// descriptors. Can be applied multiple times.
    #[arg(short, long, value_name = "EDGE")]
    edge: Vec<String>,
    /// Deadline for the per-daemon readiness probe, in seconds.
    #[arg(long, default_value_t = 15)]
    daemon_ready: u64,
    /// Deadline for network-wide routing convergence, in seconds.
    #[arg(long, default_value_t = 60)]
    convergence: u64,
    /// Poll interval of the readiness and convergence probes, in milliseconds.
    #[arg(long, default_value_t = 500)]
    poll_interval: u64,
    /// Name prefix of the network namespaces backing the emulated hosts.
    #[arg(long, default_value = "nert")]
    prefix: String,
    /// Skip the interactive console and tear down right after convergence.
    #[arg(short, long)]
    batch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();

    let args = Args::parse();
    let mut description = args.preset.description();
    if let Some(level) = args.log_level {
        description.options.log_level = level;
    }
    if !args.edge.is_empty() {
        description.topology = parse_edges(&args.edge)?;
    }
    let timings = Timings {
        daemon_ready: Duration::from_secs(args.daemon_ready),
        convergence: Duration::from_secs(args.convergence),
        poll_interval: Duration::from_millis(args.poll_interval),
    };

    let emulation = NetnsEmulation::new(&args.prefix);

    log::info!("running experiment {}", description.name);
    let report = if args.batch {
        runner::run(&emulation, &mut Batch, &description, &timings).await?
    } else {
        runner::run(&emulation, &mut Cli, &description, &timings).await?
    };

    log::info!(
        "experiment {} finished ({} daemons, final phase {})",
        report.name,
        report.daemons.len(),
        report.phases.last().map(|p| p.to_string()).unwrap_or_default()
    );
    if args.batch {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Parse `a:b[:delay]` edge descriptors; the delay defaults to `10ms`.
fn parse_edges(descriptors: &[String]) -> Result<Topology, Box<dyn std::error::Error>> {
    let mut edges = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let mut parts = descriptor.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), delay) if !a.is_empty() && !b.is_empty() => {
                edges.push((a.to_string(), b.to_string(), delay.unwrap_or("10ms").to_string()));
            }
            _ => {
                return Err(
                    format!("invalid edge descriptor `{descriptor}`, expected a:b[:delay]").into(),
                )
            }
        }
    }
    Ok(Topology::from_edges(edges))
}
