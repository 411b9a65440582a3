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
//! Module assembling abstract experiment topologies of hosts and links.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// An emulated host. Carries nothing but its identifier; the producer or
/// consumer role of a host is assigned by the experiment, not stored here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
}

/// An undirected link between two hosts.
///
/// The delay is kept as an uninterpreted string (e.g. `10ms`) and handed to
/// the emulation layer verbatim; a malformed value surfaces as an error from
/// the link-shaping tool, not from here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub a: String,
    pub b: String,
    pub delay: String,
}

/// A set of hosts and the links between them.
///
/// Built once via [`Topology::from_edges`] and immutable afterwards. Every
/// link endpoint is guaranteed to be a node of the same topology; nothing
/// beyond that is validated (in particular, connectivity is not).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl Topology {
    /// Assemble a topology from an ordered sequence of edge descriptors.
    ///
    /// Nodes are created lazily the first time their identifier is
    /// referenced; referencing the same identifier again reuses the existing
    /// node. Links are appended in input order.
    pub fn from_edges<I, S, D>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S, D)>,
        S: Into<String>,
        D: Into<String>,
    {
        let mut topo = Topology::default();
        for (a, b, delay) in edges {
            let a = topo.intern(a.into());
            let b = topo.intern(b.into());
            topo.links.push(Link {
                a,
                b,
                delay: delay.into(),
            });
        }
        topo
    }

    /// Return the node identifier, creating the node on first reference.
    fn intern(&mut self, id: String) -> String {
        if !self.nodes.iter().any(|n| n.id == id) {
            self.nodes.push(Node { id: id.clone() });
        }
        id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Host identifiers in first-reference order.
    pub fn hosts(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect_vec()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Whether the link set contains a cycle (union-find over the nodes).
    pub fn contains_cycle(&self) -> bool {
        fn root(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        let index = |id: &str| self.nodes.iter().position(|n| n.id == id).unwrap();
        let mut parent = (0..self.nodes.len()).collect_vec();
        for link in &self.links {
            let ra = root(&mut parent, index(&link.a));
            let rb = root(&mut parent, index(&link.b));
            if ra == rb {
                return true;
            }
            parent[ra] = rb;
        }
        false
    }
}

/// The topology shapes used by the experiment presets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    /// `a--b`, `a--c`, `b--d`: four hosts, three links, no cycle.
    Star,
    /// `a--b`, `b--c`, `c--a`, `c--d`: four hosts, four links, one cycle.
    RingWithBranch,
}

/// Propagation delay applied to every preset link.
const PRESET_DELAY: &str = "10ms";

impl Shape {
    /// print readable (and filename-compatible) string representation of the shape
    pub fn fmt(&self) -> String {
        match self {
            Self::Star => "Star".to_string(),
            Self::RingWithBranch => "RingWithBranch".to_string(),
        }
    }

    /// The canonical edge list of this shape.
    pub fn edges(&self) -> Vec<(&'static str, &'static str, &'static str)> {
        match self {
            Self::Star => vec![
                ("a", "b", PRESET_DELAY),
                ("a", "c", PRESET_DELAY),
                ("b", "d", PRESET_DELAY),
            ],
            Self::RingWithBranch => vec![
                ("a", "b", PRESET_DELAY),
                ("b", "c", PRESET_DELAY),
                ("c", "a", PRESET_DELAY),
                ("c", "d", PRESET_DELAY),
            ],
        }
    }

    pub fn build(&self) -> Topology {
        Topology::from_edges(self.edges())
    }
}
