//! # ECPS Components
//!
//! General-purpose components, processes and the default world built on
//! `ecps_core`.
//!
//! ## Contents
//!
//! - [`components`]: transform, velocity, lifetime, sprite and group data
//!   plus their snapshot and cleanup hooks
//! - [`groups`]: group tags and bulk deletion
//! - [`hierarchy`]: parent/child links between transforms
//! - [`processes`]: movement and lifetime
//! - [`schedule`]: frame phases with prioritized process lists
//! - [`world`]: the default world tying it together

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod components;
pub mod error;
pub mod groups;
pub mod hierarchy;
pub mod processes;
pub mod schedule;
pub mod world;

pub use components::{Components, Group, Lifetime, ResourceNames, Sprite, Transform, Velocity};
pub use error::{ComponentsError, ComponentsResult};
pub use groups::{add_group_id, add_group_id_to_tree, delete_all_of_group};
pub use hierarchy::{attach_child, children, detach, is_descendant_of};
pub use schedule::{Phase, Schedule};
pub use world::{DefaultWorld, ScheduledProcess, DEFAULT_PHYSICS_DT};
