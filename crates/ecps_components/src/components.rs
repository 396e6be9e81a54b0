//! # General Components
//!
//! Plain-data components shared by most worlds:
//!
//! - [`Transform`]: local position, scale and rotation plus hierarchy links
//! - [`Velocity`]: linear and angular velocity
//! - [`Lifetime`]: countdown to automatic destruction
//! - [`Sprite`]: image handle, camera mask and depth
//! - [`Group`]: tag for destroying related entities together
//!
//! Entity links inside [`Transform`] are stored as raw [`EntityId`] bits
//! and serialized through the snapshot lookup, so they survive relocation.
//! Destroying an entity, or removing its transform, unlinks it from its
//! parent and turns its children into roots.
//! Sprite image handles are runtime-only; they are persisted as names from
//! a shared [`ResourceNames`] table.

use std::cell::RefCell;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use ecps_core::{ComponentId, ComponentType, EcpsBuilder, EcpsResult, EntityId};

use crate::hierarchy;

/// Snapshot version of [`Transform`].
pub const TRANSFORM_VERSION: u32 = 1;
/// Snapshot version of [`Velocity`].
pub const VELOCITY_VERSION: u32 = 1;
/// Snapshot version of [`Lifetime`].
pub const LIFETIME_VERSION: u32 = 1;
/// Snapshot version of [`Sprite`].
pub const SPRITE_VERSION: u32 = 1;
/// Snapshot version of [`Group`].
pub const GROUP_VERSION: u32 = 1;

// ============================================================================
// TRANSFORM
// ============================================================================

/// Local placement of an entity and its links in the transform tree.
///
/// Children form a singly linked list: the parent points at its first
/// child, each child at its next sibling.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// Position relative to the parent.
    pub position: [f32; 2],
    /// Scale relative to the parent.
    pub scale: [f32; 2],
    /// Rotation in radians, relative to the parent.
    pub rotation: f32,
    parent: u32,
    first_child: u32,
    next_sibling: u32,
}

impl Transform {
    /// Creates an unlinked transform at `position` with unit scale.
    #[must_use]
    pub const fn at(position: [f32; 2]) -> Self {
        Self {
            position,
            scale: [1.0, 1.0],
            rotation: 0.0,
            parent: 0,
            first_child: 0,
            next_sibling: 0,
        }
    }

    /// Parent entity, or null for a root.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> EntityId {
        EntityId::from_bits(self.parent)
    }

    /// First child, or null.
    #[inline]
    #[must_use]
    pub fn first_child(&self) -> EntityId {
        EntityId::from_bits(self.first_child)
    }

    /// Next sibling under the same parent, or null.
    #[inline]
    #[must_use]
    pub fn next_sibling(&self) -> EntityId {
        EntityId::from_bits(self.next_sibling)
    }

    pub(crate) fn set_parent(&mut self, entity: EntityId) {
        self.parent = entity.to_bits();
    }

    pub(crate) fn set_first_child(&mut self, entity: EntityId) {
        self.first_child = entity.to_bits();
    }

    pub(crate) fn set_next_sibling(&mut self, entity: EntityId) {
        self.next_sibling = entity.to_bits();
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::at([0.0, 0.0])
    }
}

// ============================================================================
// VELOCITY / LIFETIME
// ============================================================================

/// Units per second, applied by the movement process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Velocity {
    /// Linear velocity.
    pub linear: [f32; 2],
    /// Angular velocity in radians per second.
    pub angular: f32,
}

/// Destroys its entity once `elapsed` reaches `duration`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Lifetime {
    /// Seconds the entity lives.
    pub duration: f32,
    /// Seconds lived so far.
    pub elapsed: f32,
}

impl Lifetime {
    /// Creates a fresh countdown.
    #[must_use]
    pub const fn new(duration: f32) -> Self {
        Self { duration, elapsed: 0.0 }
    }

    /// Checks whether the countdown is over.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Membership in a caller-defined group of entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Group {
    /// Group number.
    pub id: u32,
}

// ============================================================================
// SPRITE
// ============================================================================

/// Drawable image reference.
///
/// `image` is a handle from [`ResourceNames`]; 0 means no image. The
/// cleanup hook releases the handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Sprite {
    /// Image handle.
    pub image: u32,
    /// Cameras that draw this sprite.
    pub camera_flags: u32,
    /// Draw order; higher draws on top.
    pub depth: i32,
}

#[derive(Debug, Default)]
struct NameTable {
    names: Vec<String>,
    refs: Vec<u32>,
}

/// Shared table of stable resource names.
///
/// Handles are 1-based and never reused, so a name always maps back to the
/// same handle for the lifetime of the table. Cloning shares the table.
#[derive(Clone, Debug, Default)]
pub struct ResourceNames {
    table: Rc<RefCell<NameTable>>,
}

impl ResourceNames {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `name`, interning it if needed, and takes a
    /// reference on it.
    pub fn acquire(&self, name: &str) -> u32 {
        let mut table = self.table.borrow_mut();
        let index = if let Some(index) = table.names.iter().position(|known| known == name) {
            index
        } else {
            table.names.push(name.to_owned());
            table.refs.push(0);
            table.names.len() - 1
        };
        table.refs[index] += 1;
        (index + 1) as u32
    }

    /// Drops a reference taken by [`ResourceNames::acquire`].
    ///
    /// # Returns
    ///
    /// `false` for handle 0, unknown handles, or handles without references.
    pub fn release(&self, handle: u32) -> bool {
        let mut table = self.table.borrow_mut();
        let Some(refs) = (handle as usize).checked_sub(1).and_then(|index| table.refs.get_mut(index)) else {
            return false;
        };
        if *refs == 0 {
            tracing::warn!(handle, "resource released more often than acquired");
            return false;
        }
        *refs -= 1;
        true
    }

    /// Returns the name behind a handle.
    #[must_use]
    pub fn name(&self, handle: u32) -> Option<String> {
        let index = (handle as usize).checked_sub(1)?;
        self.table.borrow().names.get(index).cloned()
    }

    /// Returns the handle of an interned name without taking a reference.
    #[must_use]
    pub fn handle(&self, name: &str) -> Option<u32> {
        self.table
            .borrow()
            .names
            .iter()
            .position(|known| known == name)
            .map(|index| (index + 1) as u32)
    }

    /// Number of live references to a handle.
    #[must_use]
    pub fn ref_count(&self, handle: u32) -> u32 {
        (handle as usize)
            .checked_sub(1)
            .and_then(|index| self.table.borrow().refs.get(index).copied())
            .unwrap_or(0)
    }

    /// Number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.borrow().names.len()
    }

    /// Checks if no name has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// REGISTRATION
// ============================================================================

/// IDs of the general components inside one instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Components {
    /// [`Transform`] component.
    pub transform: ComponentId,
    /// [`Velocity`] component.
    pub velocity: ComponentId,
    /// [`Lifetime`] component.
    pub lifetime: ComponentId,
    /// [`Sprite`] component.
    pub sprite: ComponentId,
    /// [`Group`] component.
    pub group: ComponentId,
}

impl Components {
    /// Registers every general component on a builder.
    ///
    /// # Errors
    ///
    /// Fails if the registry is full or a name is already taken.
    pub fn register(builder: &mut EcpsBuilder, names: &ResourceNames) -> EcpsResult<Self> {
        let transform = builder.register_component(transform_type())?;
        let velocity = builder.register_component(
            ComponentType::of::<Velocity>("Velocity")
                .with_version(VELOCITY_VERSION)
                .with_raw_serialization(),
        )?;
        let lifetime = builder.register_component(
            ComponentType::of::<Lifetime>("Lifetime")
                .with_version(LIFETIME_VERSION)
                .with_raw_serialization(),
        )?;
        let sprite = builder.register_component(sprite_type(names))?;
        let group = builder.register_component(
            ComponentType::of::<Group>("Group")
                .with_version(GROUP_VERSION)
                .with_raw_serialization(),
        )?;

        tracing::debug!("general components registered");
        Ok(Self {
            transform,
            velocity,
            lifetime,
            sprite,
            group,
        })
    }
}

fn transform_type() -> ComponentType {
    ComponentType::of::<Transform>("Transform")
        .with_version(TRANSFORM_VERSION)
        .with_serialize(|writer, bytes| {
            let tf: Transform = bytemuck::pod_read_unaligned(bytes);
            for value in [tf.position[0], tf.position[1], tf.scale[0], tf.scale[1], tf.rotation] {
                writer.write_f32(value)?;
            }
            writer.write_entity(tf.parent())?;
            writer.write_entity(tf.first_child())?;
            writer.write_entity(tf.next_sibling())
        })
        .with_deserialize(|reader, bytes| {
            let mut tf = Transform {
                position: [reader.read_f32()?, reader.read_f32()?],
                scale: [reader.read_f32()?, reader.read_f32()?],
                rotation: reader.read_f32()?,
                ..Transform::default()
            };
            tf.set_parent(reader.read_entity()?);
            tf.set_first_child(reader.read_entity()?);
            tf.set_next_sibling(reader.read_entity()?);
            bytes.copy_from_slice(bytemuck::bytes_of(&tf));
            Ok(())
        })
        .with_cleanup(|context, entity, bytes, full| {
            if full {
                return;
            }
            let tf: Transform = bytemuck::pod_read_unaligned(bytes);
            hierarchy::release_links(context, entity, &tf);
        })
}

fn sprite_type(names: &ResourceNames) -> ComponentType {
    let (on_write, on_read, on_cleanup) = (names.clone(), names.clone(), names.clone());
    ComponentType::of::<Sprite>("Sprite")
        .with_version(SPRITE_VERSION)
        .with_serialize(move |writer, bytes| {
            let sprite: Sprite = bytemuck::pod_read_unaligned(bytes);
            let name = if sprite.image == 0 {
                String::new()
            } else {
                on_write.name(sprite.image).ok_or_else(|| {
                    ecps_core::EcpsError::Encode(format!("unknown image handle {}", sprite.image))
                })?
            };
            writer.write_str(&name)?;
            writer.write_u32(sprite.camera_flags)?;
            writer.write_i32(sprite.depth)
        })
        .with_deserialize(move |reader, bytes| {
            let name = reader.read_str()?;
            let sprite = Sprite {
                image: if name.is_empty() { 0 } else { on_read.acquire(&name) },
                camera_flags: reader.read_u32()?,
                depth: reader.read_i32()?,
            };
            bytes.copy_from_slice(bytemuck::bytes_of(&sprite));
            Ok(())
        })
        .with_cleanup(move |_, _, bytes, _| {
            let mut sprite: Sprite = bytemuck::pod_read_unaligned(bytes);
            if sprite.image != 0 {
                on_cleanup.release(sprite.image);
                sprite.image = 0;
                bytes.copy_from_slice(bytemuck::bytes_of(&sprite));
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_layouts_have_no_padding() {
        assert_eq!(std::mem::size_of::<Transform>(), 32);
        assert_eq!(std::mem::size_of::<Velocity>(), 12);
        assert_eq!(std::mem::size_of::<Lifetime>(), 8);
        assert_eq!(std::mem::size_of::<Sprite>(), 12);
        assert_eq!(std::mem::size_of::<Group>(), 4);
    }

    #[test]
    fn test_transform_starts_unlinked() {
        let tf = Transform::at([1.0, 2.0]);
        assert!(tf.parent().is_null());
        assert!(tf.first_child().is_null());
        assert!(tf.next_sibling().is_null());
        assert_eq!(tf.scale, [1.0, 1.0]);
    }

    #[test]
    fn test_resource_names_are_stable() {
        let names = ResourceNames::new();
        let hero = names.acquire("hero.png");
        let tree = names.acquire("tree.png");
        assert_eq!(names.acquire("hero.png"), hero);
        assert_ne!(hero, tree);
        assert_eq!(names.ref_count(hero), 2);

        assert!(names.release(hero));
        assert!(names.release(hero));
        assert!(!names.release(hero));
        assert_eq!(names.ref_count(hero), 0);

        // Fully released names keep their handle.
        assert_eq!(names.handle("hero.png"), Some(hero));
        assert_eq!(names.name(tree).as_deref(), Some("tree.png"));
        assert!(!names.release(0));
        assert!(names.name(0).is_none());
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_register_assigns_distinct_ids() {
        let mut builder = EcpsBuilder::new();
        let components = Components::register(&mut builder, &ResourceNames::new()).unwrap();
        let ids = [
            components.transform,
            components.velocity,
            components.lifetime,
            components.sprite,
            components.group,
        ];
        for (i, a) in ids.iter().enumerate() {
            assert!(ids[i + 1..].iter().all(|b| a != b));
        }
        assert_eq!(builder.registry().find("Transform"), Some(components.transform));
        assert!(Components::register(&mut builder, &ResourceNames::new()).is_err());
    }
}
