//! # ECPS Core Engine
//!
//! Entity-Component-Process Storage: a data-oriented object model that
//! groups entities by their exact component set, runs filtered callbacks
//! over them, and snapshots the whole graph into a relocatable form.
//!
//! ## Architecture Rules
//!
//! 1. **One owner per instance** - No internal locking; every call comes
//!    from the owning thread
//! 2. **Deferred structure changes** - Mutations requested while a process
//!    iterates are logged and replayed afterwards
//! 3. **Relocatable snapshots** - Entity references are stored as
//!    snapshot-local IDs, never as live IDs
//!
//! ## Example
//!
//! ```rust,ignore
//! use ecps_core::{EcpsBuilder, Process};
//!
//! let mut builder = EcpsBuilder::new();
//! let health = builder.register::<i32>("health")?;
//! let mut regen = builder.create_process(
//!     Process::new("regen", move |ecps, e| {
//!         if let Some(hp) = ecps.get_in_mut::<i32>(e, health) {
//!             *hp += 1;
//!         }
//!     })
//!     .requires(&[health]),
//! )?;
//!
//! let mut ecps = builder.build();
//! ecps.spawn().with(health, &10i32).build()?;
//! ecps.run_process(&mut regen)?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod serialization;

pub use config::EcpsConfig;
pub use ecs::{
    CleanupContext, ComponentFlags, ComponentId, ComponentRegistry, ComponentType, Ecps, EcpsBuilder, EntityBuilder,
    EntityId, EntityView, Process,
};
pub use error::{EcpsError, EcpsResult};
pub use serialization::{
    load_snapshot, read_snapshot, save_snapshot, write_snapshot, ComponentReader, ComponentWriter, EntityLookup,
    SerializedComponent, SerializedComponentInfo, SerializedEcps, SerializedEntityInfo,
};
