// SPDX-License-Identifier: Apache-2.0

//! Persistence for read positions.
//!
//! Uses JSON file storage with atomic writes for reliable offset tracking.

mod json_file;
mod position_store;
mod schema;

pub use json_file::{atomic_write, read_json};
pub use position_store::{PointerLease, PositionStore};
pub use schema::{FilePointer, PERSISTED_STATE_VERSION, PersistedStateV1};
