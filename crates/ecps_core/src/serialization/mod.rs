//! # Serialization
//!
//! Snapshots, component cursors and the persisted MessagePack format.

mod cursor;
mod format;
mod snapshot;

pub use cursor::{ComponentReader, ComponentWriter, EntityLookup};
pub use format::{load_snapshot, read_snapshot, save_snapshot, write_snapshot};
pub use snapshot::{SerializedComponent, SerializedComponentInfo, SerializedEcps, SerializedEntityInfo};
