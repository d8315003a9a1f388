// Copyright 2026 Stitch Authors.
// This file is part of Stitch.

// Stitch is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Stitch is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Stitch.  If not, see <http://www.gnu.org/licenses/>.

//! Trie-repair core of the snap-sync ingestion engine. Peers deliver
//! sorted leaf ranges with boundary proofs; this crate verifies them
//! against the declared state root, splices them into a partial secure
//! hexary trie, tracks the dangling frontier, and lands finished nodes
//! in the store.

#[macro_use]
extern crate log;

pub mod database;
pub mod import;
pub mod inspect;
pub mod interpolate;
pub mod neighbor;
pub mod nibble;
pub mod node;
pub mod persist;
pub mod ranges;
pub mod types;
pub mod walk;

pub use crate::database::RepairDb;
pub use crate::inspect::{DanglingLink, InspectReport};
pub use crate::interpolate::{Interpolated, LeafSpec};
pub use crate::node::{NodeHandle, NodeKind, NodeState, RepairNode, TrieNode};
pub use crate::types::Hash;
