//! # ECPS Error Types
//!
//! All errors that can occur while registering types, mutating entities,
//! or moving snapshots in and out of a world.
//!
//! Lookup misses (unknown entity, missing component) are not errors: they
//! surface as `None`/`false` from the query functions.

use thiserror::Error;

use crate::ecs::EntityId;

/// Errors that can occur in the ECPS.
#[derive(Error, Debug)]
pub enum EcpsError {
    /// The registry already holds the maximum number of component types.
    #[error("too many component types: maximum is {max}")]
    TooManyComponentTypes {
        /// Fixed type capacity.
        max: usize,
    },

    /// A component name is empty, too long, or already taken.
    #[error("invalid component name {name:?}: {reason}")]
    InvalidComponentName {
        /// The rejected name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A component alignment is not a supported power of two.
    #[error("invalid alignment {align} for component {name:?}")]
    InvalidAlignment {
        /// Component name.
        name: String,
        /// The rejected alignment.
        align: usize,
    },

    /// A component ID does not name a registered type.
    #[error("unknown component id: {0}")]
    UnknownComponent(u32),

    /// Payload bytes do not match the registered component size.
    #[error("payload for component {component} is {actual} bytes, expected {expected}")]
    PayloadSizeMismatch {
        /// Component ID.
        component: u32,
        /// Registered size.
        expected: usize,
        /// Supplied size.
        actual: usize,
    },

    /// The entity ID space is exhausted.
    #[error("entity capacity reached: {capacity} ids in use")]
    EntityCapacityReached {
        /// Configured capacity.
        capacity: usize,
    },

    /// The entity does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The operation is not allowed while a process is iterating.
    #[error("operation not allowed while a process is iterating: {0}")]
    ProcessIterating(&'static str),

    /// The process belongs to another ECPS instance.
    #[error("process {name:?} belongs to instance {expected}, not {actual}")]
    ForeignProcess {
        /// Process name.
        name: String,
        /// Instance that created the process.
        expected: u32,
        /// Instance it was run on.
        actual: u32,
    },

    /// A snapshot uses a component type the live registry does not have.
    #[error("serialized component type {name:?} is not registered")]
    MissingComponentType {
        /// Serialized type name.
        name: String,
    },

    /// A snapshot uses a different version of a component type.
    #[error("component type {name:?} version mismatch: serialized {serialized}, registered {registered}")]
    ComponentVersionMismatch {
        /// Type name.
        name: String,
        /// Version stored in the snapshot.
        serialized: u32,
        /// Version in the live registry.
        registered: u32,
    },

    /// An entity in a snapshot refers to a component info it does not carry.
    #[error("unknown serialized component id: {0}")]
    UnknownSerializedComponent(u32),

    /// A serialize hook failed.
    #[error("failed to serialize component {component:?}: {reason}")]
    Serialize {
        /// Component name.
        component: String,
        /// Failure reason.
        reason: String,
    },

    /// A deserialize hook failed.
    #[error("failed to deserialize component {component:?}: {reason}")]
    Deserialize {
        /// Component name.
        component: String,
        /// Failure reason.
        reason: String,
    },

    /// Writing MessagePack data failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Reading MessagePack data failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// File system failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ECPS operations.
pub type EcpsResult<T> = Result<T, EcpsError>;
