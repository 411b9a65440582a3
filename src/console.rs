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
//! Operator console over the live emulated network.

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::emulation::{EmulationError, Environment};

/// Where the sequencer hands off once the network has converged. Blocks
/// until the operator (or the implementation) decides to leave.
#[async_trait]
pub trait Console<E: Environment>: Send {
    async fn run(&mut self, env: &mut E) -> Result<(), EmulationError>;
}

/// Interactive console: `<host> <command>` lines are dispatched to the
/// named host, `exit` returns control to the sequencer for teardown.
pub struct Cli;

#[async_trait]
impl<E: Environment> Console<E> for Cli {
    async fn run(&mut self, env: &mut E) -> Result<(), EmulationError> {
        let hosts = env.hosts();
        println!("interactive console, hosts: {}", hosts.join(" "));
        println!("type `<host> <command>` to run a command, `help` for help");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!(
                "{}nert>{} ",
                termion::color::Fg(termion::color::Blue),
                termion::color::Fg(termion::color::Reset)
            );
            std::io::stdout()
                .flush()
                .map_err(|e| EmulationError::io("flush console prompt", e))?;

            let line = lines
                .next_line()
                .await
                .map_err(|e| EmulationError::io("read console input", e))?;
            let Some(line) = line else {
                // stdin closed, treat like exit
                println!();
                return Ok(());
            };

            match line.trim() {
                "" => {}
                "exit" | "quit" => return Ok(()),
                "hosts" => println!("{}", hosts.join(" ")),
                "help" => {
                    println!("  <host> <command>   run a command on the named host");
                    println!("  hosts              list the emulated hosts");
                    println!("  exit               leave the console and tear down");
                }
                request => {
                    let Some((host, command)) = request.split_once(' ') else {
                        eprintln!("usage: <host> <command>");
                        continue;
                    };
                    match env.cmd(host, command.trim()).await {
                        Ok(output) => print!("{output}"),
                        Err(
                            e @ (EmulationError::HostNotFound(_)
                            | EmulationError::CommandFailed { .. }),
                        ) => eprintln!("{e}"),
                        Err(fatal) => return Err(fatal),
                    }
                }
            }
        }
    }
}

/// Non-interactive console for unattended runs: returns immediately so the
/// sequencer proceeds straight to teardown.
pub struct Batch;

#[async_trait]
impl<E: Environment> Console<E> for Batch {
    async fn run(&mut self, _env: &mut E) -> Result<(), EmulationError> {
        log::info!("batch mode, skipping the interactive console");
        Ok(())
    }
}
