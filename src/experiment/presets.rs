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
//! The built-in experiment variants.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::{ExperimentDescription, ExperimentOptions, RoleConfig};
use crate::topology::Shape;

/// The three experiment variants shipped with the testbed.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Display,
    EnumString,
    clap::ValueEnum,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Preset {
    /// Star topology, no roles; host `a` runs with silenced daemon logs.
    EnvSetup,
    /// Ring-with-branch topology, plain convergence check.
    InterestTest,
    /// Star topology with `b` as producer advertising `/example` and `a`
    /// as consumer.
    InterestTestSimple,
}

impl Preset {
    pub fn shape(&self) -> Shape {
        match self {
            Self::EnvSetup | Self::InterestTestSimple => Shape::Star,
            Self::InterestTest => Shape::RingWithBranch,
        }
    }

    pub fn description(&self) -> ExperimentDescription {
        let options = match self {
            Self::EnvSetup => ExperimentOptions {
                silence: Some("a".to_string()),
                ..Default::default()
            },
            Self::InterestTest => ExperimentOptions::default(),
            Self::InterestTestSimple => ExperimentOptions {
                roles: Some(RoleConfig {
                    producer: "b".to_string(),
                    consumer: "a".to_string(),
                    prefix: "/example".to_string(),
                }),
                ..Default::default()
            },
        };
        ExperimentDescription {
            // readable and filename-compatible, like `env-setup_Star`
            name: format!("{self}_{}", self.shape().fmt()),
            topology: self.shape().build(),
            options,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_preset_shapes() {
        assert_eq!(Preset::EnvSetup.shape(), Shape::Star);
        assert_eq!(Preset::InterestTest.shape(), Shape::RingWithBranch);
        assert_eq!(Preset::InterestTestSimple.shape(), Shape::Star);
    }

    #[test]
    fn test_env_setup_silences_host_a() {
        let description = Preset::EnvSetup.description();
        assert_eq!(description.options.silence.as_deref(), Some("a"));
        assert!(description.options.roles.is_none());
        assert!(description.options.traffic.is_none());
    }

    #[test]
    fn test_interest_test_simple_roles() {
        let description = Preset::InterestTestSimple.description();
        let roles = description.options.roles.expect("roles configured");
        assert_eq!(roles.producer, "b");
        assert_eq!(roles.consumer, "a");
        assert_eq!(roles.prefix, "/example");
        // the traffic exercise stays off until the applications exist
        assert!(description.options.traffic.is_none());
    }

    #[test]
    fn test_preset_names_are_filename_compatible() {
        assert_eq!(Preset::EnvSetup.to_string(), "env-setup");
        assert_eq!(Preset::InterestTest.to_string(), "interest-test");
        assert_eq!(
            Preset::InterestTestSimple.to_string(),
            "interest-test-simple"
        );
    }
}
