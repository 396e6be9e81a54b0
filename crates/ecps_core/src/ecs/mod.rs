//! # Entity Component Process Storage
//!
//! Archetype storage over raw byte records.
//!
//! ## Design Philosophy
//!
//! - Entities with identical component sets share one dense buffer
//! - Component payloads are plain bytes; typed access goes through `bytemuck`
//! - Entity IDs are 16-bit indices with 16-bit generation counters
//! - Structural mutation during iteration is always deferred

pub mod archetype;
mod command;
mod component;
mod entity;
mod flags;
mod process;
mod world;

pub use archetype::{copy_entity, Archetype, ArchetypeStore, EntityLocation, Field, RecordLayout};
pub use command::{Command, CommandBuffer, CommandIter, PackedComponents};
pub use component::{
    CleanupHook, ComponentId, ComponentRegistry, ComponentType, DeserializeHook, SerializeHook, VerifyHook,
    ENABLED_COMPONENT_NAME, ID_COMPONENT_NAME, MAX_COMPONENT_ALIGN, MAX_COMPONENT_NAME_LEN, MAX_COMPONENT_TYPES,
};
pub use entity::{EntityId, IdAllocator, MAX_ENTITY_CAPACITY};
pub use flags::{ComponentFlags, FLAG_WORDS};
pub use process::{EntityHook, Process, ProcessHook};
pub use world::{CleanupContext, Ecps, EcpsBuilder, EntityBuilder, EntityView};
