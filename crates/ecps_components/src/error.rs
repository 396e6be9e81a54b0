//! # Component Library Error Types

use ecps_core::{EcpsError, EntityId};
use thiserror::Error;

/// Errors raised by the component helpers and the default world.
#[derive(Error, Debug)]
pub enum ComponentsError {
    /// The entity does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity exists but has no transform.
    #[error("entity {0} has no transform")]
    MissingTransform(EntityId),

    /// Attaching would make an entity its own ancestor.
    #[error("attaching {child} under {parent} would create a cycle")]
    HierarchyCycle {
        /// Requested parent.
        parent: EntityId,
        /// Requested child.
        child: EntityId,
    },

    /// Error from the core engine.
    #[error(transparent)]
    Core(#[from] EcpsError),
}

/// Result type for the component library.
pub type ComponentsResult<T> = Result<T, ComponentsError>;
