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
//! Resets leftover emulation state from a crashed previous run.

use clap::Parser;

use nert::{
    emulation::{netns::NetnsEmulation, Emulation},
    util,
};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Name prefix of the network namespaces to remove.
    #[arg(long, default_value = "nert")]
    prefix: String,
    /// Also check that the external daemons and tools are installed.
    #[arg(short, long)]
    verify: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();

    let args = Args::parse();
    let emulation = NetnsEmulation::new(&args.prefix);

    emulation.clean_up().await?;
    log::info!("emulation state reset");

    if args.verify {
        emulation.verify_dependencies().await?;
        log::info!("all dependencies available");
    }
    Ok(())
}
