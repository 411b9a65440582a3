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
//! Emulation backend on Linux network namespaces.
//!
//! Every host becomes a named network namespace, every link a veth pair
//! whose ends are shaped with `tc netem delay`. All host-level state is
//! reached through `sudo ip netns ...`; the NDN daemons run as background
//! children inside the namespaces and die with the environment.

use std::{
    collections::HashMap,
    process::{Output, Stdio},
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::{process::Command, sync::Mutex};

use super::{Emulation, EmulationError, Environment};
use crate::topology::Topology;

/// Tools and daemons that must be reachable before an experiment starts.
const REQUIRED_TOOLS: [&str; 6] = ["ip", "tc", "nfd", "nlsr", "nfdc", "nlsrc"];

/// Factory for namespace-backed environments.
///
/// All namespaces created by one instance share a name prefix, so a later
/// [`Emulation::clean_up`] can find and remove leftovers of a crashed run
/// without touching unrelated namespaces.
#[derive(Clone, Debug)]
pub struct NetnsEmulation {
    prefix: String,
}

impl Default for NetnsEmulation {
    fn default() -> Self {
        Self::new("nert")
    }
}

impl NetnsEmulation {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    async fn setup(
        &self,
        topology: &Topology,
        namespaces: &mut HashMap<String, String>,
    ) -> Result<(), EmulationError> {
        for host in topology.hosts() {
            let ns = ns_name(&self.prefix, &host);
            // remove a stale namespace with the same name (idempotent)
            let _ = sudo(&["ip", "netns", "del", &ns]).await;
            sudo_checked(&["ip", "netns", "add", &ns]).await?;
            sudo_checked(&["ip", "netns", "exec", &ns, "ip", "link", "set", "lo", "up"]).await?;
            log::debug!("host {host} -> namespace {ns}");
            namespaces.insert(host, ns);
        }

        for (index, link) in topology.links().iter().enumerate() {
            let ns_a = &namespaces[&link.a];
            let ns_b = &namespaces[&link.b];
            let (iface_a, iface_b) = veth_names(index);
            let (addr_a, addr_b) = link_addresses(index);

            let _ = sudo(&["ip", "link", "del", &iface_a]).await;
            sudo_checked(&[
                "ip", "link", "add", &iface_a, "type", "veth", "peer", "name", &iface_b,
            ])
            .await?;
            sudo_checked(&["ip", "link", "set", &iface_a, "netns", ns_a]).await?;
            sudo_checked(&["ip", "link", "set", &iface_b, "netns", ns_b]).await?;

            for (ns, iface, addr) in [(ns_a, &iface_a, &addr_a), (ns_b, &iface_b, &addr_b)] {
                sudo_checked(&["ip", "netns", "exec", ns, "ip", "addr", "add", addr, "dev", iface])
                    .await?;
                sudo_checked(&["ip", "netns", "exec", ns, "ip", "link", "set", iface, "up"])
                    .await?;
                // the delay string is passed through uninterpreted; a malformed
                // value surfaces as a tc error
                sudo_checked(&[
                    "ip",
                    "netns",
                    "exec",
                    ns,
                    "tc",
                    "qdisc",
                    "add",
                    "dev",
                    iface,
                    "root",
                    "netem",
                    "delay",
                    &link.delay,
                ])
                .await?;
            }
            log::debug!(
                "link {}:{iface_a} <-> {}:{iface_b} (delay {})",
                link.a,
                link.b,
                link.delay
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Emulation for NetnsEmulation {
    type Env = NetnsEnv;

    async fn clean_up(&self) -> Result<(), EmulationError> {
        let output = Command::new("ip")
            .args(["netns", "list"])
            .output()
            .await
            .map_err(|e| EmulationError::io("list network namespaces", e))?;
        let marker = format!("{}-", self.prefix);
        let stale = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .filter(|name| name.starts_with(&marker))
            .map(str::to_string)
            .collect_vec();
        for ns in &stale {
            let _ = sudo(&["ip", "netns", "del", ns]).await;
        }
        if !stale.is_empty() {
            log::info!("removed {} stale namespace(s) from a previous run", stale.len());
        }
        Ok(())
    }

    async fn verify_dependencies(&self) -> Result<(), EmulationError> {
        for tool in REQUIRED_TOOLS {
            if !binary_available(tool).await {
                return Err(EmulationError::DependencyMissing(tool.to_string()));
            }
        }
        let sudo_ok = Command::new("sudo")
            .args(["-n", "true"])
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !sudo_ok {
            return Err(EmulationError::InsufficientPrivileges(
                "passwordless sudo is required for namespace setup".to_string(),
            ));
        }
        Ok(())
    }

    async fn start(&self, topology: &Topology) -> Result<NetnsEnv, EmulationError> {
        let mut namespaces = HashMap::new();
        if let Err(e) = self.setup(topology, &mut namespaces).await {
            // release whatever was created before the failure
            for ns in namespaces.values() {
                let _ = sudo(&["ip", "netns", "del", ns]).await;
            }
            return Err(e);
        }
        log::info!(
            "emulated network up: {} hosts, {} links",
            topology.nodes().len(),
            topology.links().len()
        );
        Ok(NetnsEnv {
            prefix: self.prefix.clone(),
            hosts: topology.hosts(),
            namespaces,
            ambient: Mutex::new(HashMap::new()),
            children: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
        })
    }
}

/// A live namespace-backed network.
///
/// Holds the kernel namespaces and all background children started through
/// [`Environment::spawn`]. [`Environment::stop`] releases both; `Drop` is a
/// fallback for runs that never reach it.
pub struct NetnsEnv {
    prefix: String,
    hosts: Vec<String>,
    namespaces: HashMap<String, String>,
    ambient: Mutex<HashMap<String, Vec<(String, String)>>>,
    children: Mutex<Vec<tokio::process::Child>>,
    running: AtomicBool,
}

impl NetnsEnv {
    fn namespace_of(&self, host: &str) -> Result<String, EmulationError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(EmulationError::EnvironmentNotRunning);
        }
        self.namespaces
            .get(host)
            .cloned()
            .ok_or_else(|| EmulationError::HostNotFound(host.to_string()))
    }

    /// Build `sudo ip netns exec <ns> [env K=V ...] sh -c <command>`.
    async fn host_command(&self, host: &str, ns: &str, command: &str) -> Command {
        let vars = self
            .ambient
            .lock()
            .await
            .get(host)
            .cloned()
            .unwrap_or_default();
        let mut cmd = Command::new("sudo");
        cmd.args(["ip", "netns", "exec", ns]);
        if !vars.is_empty() {
            cmd.arg("env");
            for (key, value) in &vars {
                cmd.arg(format!("{key}={value}"));
            }
        }
        cmd.args(["sh", "-c", command]);
        cmd
    }
}

#[async_trait]
impl Environment for NetnsEnv {
    fn hosts(&self) -> Vec<String> {
        self.hosts.clone()
    }

    async fn cmd(&self, host: &str, command: &str) -> Result<String, EmulationError> {
        let ns = self.namespace_of(host)?;

        // the collaborator this replaces gives every host a persistent
        // shell, so `export K=V` must stick for later commands
        if let Some((key, value)) = parse_export(command) {
            self.ambient
                .lock()
                .await
                .entry(host.to_string())
                .or_default()
                .push((key, value));
            return Ok(String::new());
        }

        let output = self
            .host_command(host, &ns, command)
            .await
            .output()
            .await
            .map_err(|e| EmulationError::io(format!("run `{command}` on host {host}"), e))?;
        if !output.status.success() {
            return Err(EmulationError::CommandFailed {
                host: host.to_string(),
                command: command.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn spawn(&self, host: &str, command: &str) -> Result<u32, EmulationError> {
        let ns = self.namespace_of(host)?;

        let binary = command.split_whitespace().last().unwrap_or("daemon");
        let log_dir = std::env::temp_dir().join(&self.prefix).join(host);
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| EmulationError::io(format!("create log directory for host {host}"), e))?;
        let log_path = log_dir.join(format!("{binary}.log"));
        let stdout = std::fs::File::create(&log_path)
            .map_err(|e| EmulationError::io(format!("create {}", log_path.display()), e))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| EmulationError::io(format!("clone {}", log_path.display()), e))?;

        let mut cmd = self.host_command(host, &ns, command).await;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        let child = cmd
            .spawn()
            .map_err(|e| EmulationError::io(format!("spawn `{command}` on host {host}"), e))?;
        let pid = child.id().unwrap_or_default();
        self.children.lock().await.push(child);
        log::debug!("spawned `{command}` on {host} (pid {pid}, log {})", log_path.display());
        Ok(pid)
    }

    async fn stop(&mut self) -> Result<(), EmulationError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            log::debug!("environment already stopped");
            return Ok(());
        }
        let mut children = self.children.lock().await;
        for child in children.iter_mut() {
            let _ = child.kill().await;
        }
        children.clear();
        for ns in self.namespaces.values() {
            let _ = sudo(&["ip", "netns", "del", ns]).await;
        }
        log::info!("emulated network stopped, {} host(s) released", self.hosts.len());
        Ok(())
    }
}

impl Drop for NetnsEnv {
    fn drop(&mut self) {
        // children are killed by kill_on_drop; the namespaces must go too,
        // even when the run never reached stop()
        if self.running.swap(false, Ordering::SeqCst) {
            log::warn!("environment dropped while running, releasing namespaces");
            for ns in self.namespaces.values() {
                let _ = std::process::Command::new("sudo")
                    .args(["ip", "netns", "del", ns])
                    .output();
            }
        }
    }
}

fn ns_name(prefix: &str, host: &str) -> String {
    format!("{prefix}-{host}")
}

/// Interface names of the veth pair for link `index` (<= 15 chars each).
fn veth_names(index: usize) -> (String, String) {
    (format!("ve{index}a"), format!("ve{index}b"))
}

/// Each link gets its own /24, endpoint `a` takes .1 and `b` takes .2.
fn link_addresses(index: usize) -> (String, String) {
    (format!("10.0.{index}.1/24"), format!("10.0.{index}.2/24"))
}

lazy_static! {
    static ref EXPORT: Regex =
        Regex::new(r#"^\s*export\s+([A-Za-z_][A-Za-z0-9_]*)=(.*)$"#).unwrap();
}

/// Recognize `export K=V` commands, with optional quoting around the value.
fn parse_export(command: &str) -> Option<(String, String)> {
    let captures = EXPORT.captures(command.trim())?;
    let key = captures[1].to_string();
    let raw = captures[2].trim();
    let value = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(raw);
    Some((key, value.to_string()))
}

async fn binary_available(name: &str) -> bool {
    Command::new("sh")
        .args(["-c", &format!("command -v {name}")])
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run `sudo <args>`, returning raw output.
async fn sudo(args: &[&str]) -> Result<Output, EmulationError> {
    Command::new("sudo")
        .args(args)
        .output()
        .await
        .map_err(|e| EmulationError::io(format!("run sudo {}", args.join(" ")), e))
}

/// Run `sudo <args>`, failing with stderr on a non-zero exit.
async fn sudo_checked(args: &[&str]) -> Result<Output, EmulationError> {
    let output = sudo(args).await?;
    if !output.status.success() {
        return Err(EmulationError::Setup {
            command: format!("sudo {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::topology::Shape;

    #[test]
    fn test_namespace_and_interface_names() {
        assert_eq!(ns_name("nert", "a"), "nert-a");
        let (a, b) = veth_names(3);
        assert_eq!((a.as_str(), b.as_str()), ("ve3a", "ve3b"));
        assert!(a.len() <= 15 && b.len() <= 15);
    }

    #[test]
    fn test_link_addresses_are_per_link() {
        assert_eq!(
            link_addresses(0),
            ("10.0.0.1/24".to_string(), "10.0.0.2/24".to_string())
        );
        assert_ne!(link_addresses(1).0, link_addresses(2).0);
    }

    #[test]
    fn test_parse_export() {
        assert_eq!(
            parse_export("export NDN_LOG=\"ndn.*=FATAL\""),
            Some(("NDN_LOG".to_string(), "ndn.*=FATAL".to_string()))
        );
        assert_eq!(
            parse_export("export HOME='/tmp'"),
            Some(("HOME".to_string(), "/tmp".to_string()))
        );
        assert_eq!(
            parse_export("export PLAIN=value"),
            Some(("PLAIN".to_string(), "value".to_string()))
        );
        assert_eq!(parse_export("echo export nothing"), None);
        assert_eq!(parse_export("nlsrc advertise /example"), None);
    }

    /// Root, `ip` and `tc` are enough for the environment itself; the NDN
    /// daemons are only needed once something is launched.
    async fn emulation_privileges() -> bool {
        for tool in ["ip", "tc"] {
            if !binary_available(tool).await {
                return false;
            }
        }
        Command::new("sudo")
            .args(["-n", "true"])
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_start_exec_stop_roundtrip() {
        if !emulation_privileges().await {
            eprintln!("skipping: requires root and ip/tc");
            return;
        }

        let emulation = NetnsEmulation::new("nerttest");
        emulation.clean_up().await.expect("clean up");

        let topo = Shape::Star.build();
        let mut env = emulation.start(&topo).await.expect("start");
        assert_eq!(env.hosts(), vec!["a", "b", "c", "d"]);

        // host a terminates links 0 (a-b) and 1 (a-c)
        let out = env.cmd("a", "ip addr").await.expect("ip addr");
        assert!(out.contains("10.0.0.1"), "missing link address: {out}");
        assert!(out.contains("10.0.1.1"), "missing link address: {out}");

        // exported variables stick for later commands
        env.cmd("a", "export NERT_PROBE=ok").await.expect("export");
        let echoed = env.cmd("a", "echo $NERT_PROBE").await.expect("echo");
        assert_eq!(echoed.trim(), "ok");

        assert!(matches!(
            env.cmd("nope", "true").await,
            Err(EmulationError::HostNotFound(_))
        ));

        env.stop().await.expect("stop");
        assert!(matches!(
            env.cmd("a", "true").await,
            Err(EmulationError::EnvironmentNotRunning)
        ));
    }
}
