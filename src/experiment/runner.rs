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
//! Module that drives one experiment through its lifecycle.
//!
//! The sequence is fixed: reset leftover state, verify dependencies, start
//! the environment, launch the forwarding then the routing daemons, apply
//! the optional per-host configuration, wait for routing convergence, hand
//! the live network to the console, and stop the environment. `stop()` runs
//! on every exit path after a successful `start()`.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use tokio::time::Instant;

use super::{ExperimentDescription, Timings};
use crate::{
    console::Console,
    daemon::{self, DaemonHandle, DaemonKind},
    emulation::{Emulation, EmulationError, Environment},
};

/// The lifecycle states of one experiment run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Phase {
    Built,
    Running,
    DaemonsUp,
    RoleConfigured,
    Converged,
    Interactive,
    Stopped,
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Emulation(#[from] EmulationError),
    #[error(transparent)]
    Launch(#[from] daemon::LaunchError),
    #[error("routing did not converge within {waited:?}")]
    ConvergenceTimeout { waited: Duration },
}

/// What one run did: the phases it went through and the daemons it started.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub name: String,
    pub started_at: String,
    pub phases: Vec<Phase>,
    pub daemons: Vec<DaemonHandle>,
}

impl ExperimentReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            started_at: chrono::Local::now().format("%Y-%m-%d_%H:%M:%S").to_string(),
            phases: Vec::new(),
            daemons: Vec::new(),
        }
    }

    fn enter(&mut self, phase: Phase) {
        log::info!("[{}] entering phase {phase}", self.name);
        self.phases.push(phase);
    }
}

/// Execute one experiment from topology to teardown.
pub async fn run<M, C>(
    emulation: &M,
    console: &mut C,
    description: &ExperimentDescription,
    timings: &Timings,
) -> Result<ExperimentReport, ExperimentError>
where
    M: Emulation,
    C: Console<M::Env>,
{
    let mut report = ExperimentReport::new(&description.name);
    report.enter(Phase::Built);

    emulation.clean_up().await?;
    emulation.verify_dependencies().await?;
    let mut env = emulation.start(&description.topology).await?;
    report.enter(Phase::Running);

    // whatever happens from here on, the environment gets stopped
    let outcome = drive(&mut env, console, description, timings, &mut report).await;
    let stopped = env.stop().await;
    outcome?;
    stopped?;
    report.enter(Phase::Stopped);
    Ok(report)
}

async fn drive<E, C>(
    env: &mut E,
    console: &mut C,
    description: &ExperimentDescription,
    timings: &Timings,
    report: &mut ExperimentReport,
) -> Result<(), ExperimentError>
where
    E: Environment,
    C: Console<E>,
{
    let options = &description.options;
    let hosts = env.hosts();

    log::info!("starting nfd and nlsr on {} hosts", hosts.len());
    let forwarding = daemon::launch(env, &hosts, DaemonKind::Forwarding, options.log_level).await?;
    daemon::await_ready(env, &forwarding, timings.daemon_ready, timings.poll_interval).await?;
    let routing = daemon::launch(env, &hosts, DaemonKind::Routing, options.log_level).await?;
    daemon::await_ready(env, &routing, timings.daemon_ready, timings.poll_interval).await?;
    report.daemons.extend(forwarding);
    report.daemons.extend(routing);
    report.enter(Phase::DaemonsUp);

    if let Some(host) = &options.silence {
        env.cmd(host, "export NDN_LOG=\"ndn.*=FATAL\"").await?;
        log::debug!("daemon logs silenced on host {host}");
    }

    if let Some(roles) = &options.roles {
        log::info!(
            "advertising {} on producer {} (consumer: {})",
            roles.prefix,
            roles.producer,
            roles.consumer
        );
        env.cmd(&roles.producer, &roles.advertise_command()).await?;
        report.enter(Phase::RoleConfigured);
    }

    await_convergence(env, &hosts, timings).await?;
    report.enter(Phase::Converged);

    if let Some(traffic) = &options.traffic {
        match &options.roles {
            Some(roles) => {
                log::info!("exercising the converged routes");
                let produced = env.cmd(&roles.producer, &traffic.producer_cmd).await?;
                log::info!("producer: {}", produced.trim());
                let consumed = env.cmd(&roles.consumer, &traffic.consumer_cmd).await?;
                log::info!("consumer: {}", consumed.trim());
            }
            None => log::warn!("traffic exercise requires role configuration, skipping"),
        }
    }

    report.enter(Phase::Interactive);
    tokio::select! {
        res = console.run(env) => { res?; }
        _ = tokio::signal::ctrl_c() => {
            log::info!("interrupted, shutting the environment down");
        }
    }
    Ok(())
}

lazy_static! {
    static ref DESTINATION: Regex = Regex::new(r"(?i)destination").unwrap();
}

/// Poll every host's routing table until each sees all other routers, or
/// fail once the deadline passes. Replaces a blind convergence sleep.
async fn await_convergence<E: Environment>(
    env: &E,
    hosts: &[String],
    timings: &Timings,
) -> Result<(), ExperimentError> {
    let expected = hosts.len().saturating_sub(1);
    let deadline = Instant::now() + timings.convergence;

    let bar = ProgressBar::new(hosts.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{wide_bar} routing convergence: {pos}/{len} hosts, {elapsed}")
            .unwrap(),
    );
    bar.tick();

    loop {
        let mut converged = 0;
        for host in hosts {
            match env.cmd(host, "nlsrc routing-table").await {
                Ok(table) if DESTINATION.find_iter(&table).count() >= expected => converged += 1,
                // not an error: the daemon may still be flooding its LSAs
                Ok(_) | Err(EmulationError::CommandFailed { .. }) => {}
                Err(other) => {
                    bar.finish_and_clear();
                    return Err(other.into());
                }
            }
        }
        bar.set_position(converged as u64);
        if converged == hosts.len() {
            bar.finish_and_clear();
            log::info!("routing converged on all {} hosts", hosts.len());
            return Ok(());
        }
        if Instant::now() >= deadline {
            bar.finish_and_clear();
            return Err(ExperimentError::ConvergenceTimeout {
                waited: timings.convergence,
            });
        }
        tokio::time::sleep(timings.poll_interval).await;
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;

    use super::*;
    use crate::{
        console::Batch,
        emulation::mock::MockNet,
        experiment::{ExperimentOptions, Preset, RoleConfig, TrafficConfig},
        topology::Shape,
    };

    fn fast_timings() -> Timings {
        Timings {
            daemon_ready: Duration::from_millis(100),
            convergence: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_full_sequence_with_roles() {
        let net = MockNet::default();
        let description = Preset::InterestTestSimple.description();

        let report = run(&net, &mut Batch, &description, &fast_timings())
            .await
            .unwrap();

        assert_eq!(
            report.phases,
            vec![
                Phase::Built,
                Phase::Running,
                Phase::DaemonsUp,
                Phase::RoleConfigured,
                Phase::Converged,
                Phase::Interactive,
                Phase::Stopped,
            ]
        );
        // one forwarding and one routing daemon per host
        assert_eq!(report.daemons.len(), 8);

        let calls = net.recorded();
        let pos = |needle: &str| calls.iter().position(|c| c == needle).unwrap();
        assert!(pos("clean_up") < pos("verify_dependencies"));
        assert!(pos("verify_dependencies") < pos("start"));
        assert!(pos("start") < pos("stop"));

        // forwarding daemons are all up before the first routing daemon starts
        let last_nfd = calls
            .iter()
            .positions(|c| c.starts_with("spawn") && c.contains("nfd"))
            .max()
            .unwrap();
        let first_nlsr = calls
            .iter()
            .positions(|c| c.starts_with("spawn") && c.contains("nlsr"))
            .min()
            .unwrap();
        assert!(last_nfd < first_nlsr);
    }

    #[tokio::test]
    async fn test_advertise_exactly_once_after_launches() {
        let net = MockNet::default();
        let description = Preset::InterestTestSimple.description();

        run(&net, &mut Batch, &description, &fast_timings())
            .await
            .unwrap();

        let calls = net.recorded();
        let advertises = calls
            .iter()
            .filter(|c| c.contains("nlsrc advertise"))
            .collect_vec();
        assert_eq!(advertises, vec!["cmd b nlsrc advertise /example"]);

        let advertise = calls
            .iter()
            .position(|c| c == "cmd b nlsrc advertise /example")
            .unwrap();
        let nfd_on_b = calls
            .iter()
            .position(|c| c.starts_with("spawn b") && c.contains("nfd"))
            .unwrap();
        let nlsr_on_b = calls
            .iter()
            .position(|c| c.starts_with("spawn b") && c.contains("nlsr"))
            .unwrap();
        assert!(nfd_on_b < advertise);
        assert!(nlsr_on_b < advertise);
    }

    #[tokio::test]
    async fn test_env_setup_silences_without_roles() {
        let net = MockNet::default();
        let description = Preset::EnvSetup.description();

        let report = run(&net, &mut Batch, &description, &fast_timings())
            .await
            .unwrap();

        assert!(!report.phases.contains(&Phase::RoleConfigured));
        let calls = net.recorded();
        assert!(calls.contains(&"cmd a export NDN_LOG=\"ndn.*=FATAL\"".to_string()));
        assert!(!calls.iter().any(|c| c.contains("nlsrc advertise")));
    }

    #[tokio::test]
    async fn test_dependency_failure_short_circuits() {
        let net = MockNet {
            missing_dependency: Some("nfd".to_string()),
            ..Default::default()
        };
        let description = Preset::EnvSetup.description();

        let result = run(&net, &mut Batch, &description, &fast_timings()).await;
        assert!(matches!(
            result,
            Err(ExperimentError::Emulation(
                EmulationError::DependencyMissing(tool)
            )) if tool == "nfd"
        ));

        // no environment was started, no daemon was launched
        assert_eq!(net.recorded(), vec!["clean_up", "verify_dependencies"]);
    }

    #[tokio::test]
    async fn test_stop_runs_even_when_a_step_fails() {
        let net = MockNet {
            fail_cmd_containing: Some("advertise".to_string()),
            ..Default::default()
        };
        let description = Preset::InterestTestSimple.description();

        let result = run(&net, &mut Batch, &description, &fast_timings()).await;
        assert!(result.is_err());

        let calls = net.recorded();
        let start = calls.iter().position(|c| c == "start").unwrap();
        let stop = calls.iter().position(|c| c == "stop").unwrap();
        assert!(start < stop);
    }

    #[tokio::test]
    async fn test_convergence_timeout() {
        let net = MockNet {
            fail_cmd_containing: Some("routing-table".to_string()),
            ..Default::default()
        };
        let description = Preset::InterestTest.description();

        let result = run(&net, &mut Batch, &description, &fast_timings()).await;
        assert!(matches!(
            result,
            Err(ExperimentError::ConvergenceTimeout { .. })
        ));
        assert!(net.recorded().contains(&"stop".to_string()));
    }

    #[tokio::test]
    async fn test_traffic_exercise_runs_after_convergence() {
        let net = MockNet::default();
        let description = ExperimentDescription {
            name: "traffic".to_string(),
            topology: Shape::Star.build(),
            options: ExperimentOptions {
                roles: Some(RoleConfig {
                    producer: "b".to_string(),
                    consumer: "a".to_string(),
                    prefix: "/example".to_string(),
                }),
                traffic: Some(TrafficConfig {
                    producer_cmd: "./producer".to_string(),
                    consumer_cmd: "./consumer".to_string(),
                }),
                ..Default::default()
            },
        };

        run(&net, &mut Batch, &description, &fast_timings())
            .await
            .unwrap();

        let calls = net.recorded();
        let produce = calls.iter().position(|c| c == "cmd b ./producer").unwrap();
        let consume = calls.iter().position(|c| c == "cmd a ./consumer").unwrap();
        let advertise = calls
            .iter()
            .position(|c| c == "cmd b nlsrc advertise /example")
            .unwrap();
        assert!(advertise < produce);
        assert!(produce < consume);
    }
}
