//! # Component Type Registry
//!
//! Component types are plain descriptors: a name, a byte size, an
//! alignment, a version, and optional hooks. The registry hands out dense
//! [`ComponentId`]s in registration order.
//!
//! IDs are only stable within one process lifetime. Snapshots match types
//! by name and version, never by numeric ID.
//!
//! ## Builtins
//!
//! Two types always exist before any user type:
//! - `ID` (id 0): the entity's own packed ID, leading every record
//! - `Enabled` (id 1): zero-size flag required by every process

use std::fmt;

use bytemuck::Pod;

use super::entity::EntityId;
use super::world::CleanupContext;
use crate::error::{EcpsError, EcpsResult};
use crate::serialization::{ComponentReader, ComponentWriter};

/// Maximum number of registered component types, builtins included.
pub const MAX_COMPONENT_TYPES: usize = 128;

/// Maximum component name length in bytes.
pub const MAX_COMPONENT_NAME_LEN: usize = 32;

/// Largest supported component alignment.
pub const MAX_COMPONENT_ALIGN: usize = 16;

/// Name of the builtin ID component.
pub const ID_COMPONENT_NAME: &str = "ID";

/// Name of the builtin Enabled component.
pub const ENABLED_COMPONENT_NAME: &str = "Enabled";

/// Dense index of a registered component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentId(u32);

impl ComponentId {
    /// The builtin `ID` component.
    pub const ID: Self = Self(0);

    /// The builtin `Enabled` component.
    pub const ENABLED: Self = Self(1);

    /// Creates an ID from its raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Creates an ID from an array index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the array index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// HOOKS
// ============================================================================

/// Debug check over one component payload.
pub type VerifyHook = Box<dyn Fn(EntityId, &[u8]) -> bool>;

/// Releases resources owned by one component payload.
///
/// Receives a copy of the payload, which is discarded afterwards, and a
/// context for fixing up links held by other entities. The flag is `true`
/// when the whole world is being torn down.
pub type CleanupHook = Box<dyn Fn(&mut CleanupContext<'_>, EntityId, &mut [u8], bool)>;

/// Writes one component payload into a snapshot blob.
pub type SerializeHook = Box<dyn Fn(&mut ComponentWriter<'_>, &[u8]) -> EcpsResult<()>>;

/// Reads one component payload back from a snapshot blob.
///
/// The payload is zero-filled before the hook runs.
pub type DeserializeHook = Box<dyn Fn(&mut ComponentReader<'_>, &mut [u8]) -> EcpsResult<()>>;

// ============================================================================
// COMPONENT TYPE
// ============================================================================

/// Immutable descriptor of a component type.
///
/// ```rust,ignore
/// let position = builder.register_component(
///     ComponentType::of::<Position>("position")
///         .with_version(2)
///         .with_raw_serialization(),
/// )?;
/// ```
pub struct ComponentType {
    name: String,
    size: usize,
    align: usize,
    version: u32,
    verify: Option<VerifyHook>,
    cleanup: Option<CleanupHook>,
    serialize: Option<SerializeHook>,
    deserialize: Option<DeserializeHook>,
}

impl ComponentType {
    /// Creates a descriptor for a payload of `size` bytes.
    ///
    /// # Arguments
    ///
    /// * `name` - Serialization identity, unique per registry
    /// * `size` - Payload size in bytes, 0 for pure flags
    /// * `align` - Payload alignment, a power of two up to 16
    #[must_use]
    pub fn new(name: impl Into<String>, size: usize, align: usize) -> Self {
        Self {
            name: name.into(),
            size,
            align,
            version: 0,
            verify: None,
            cleanup: None,
            serialize: None,
            deserialize: None,
        }
    }

    /// Creates a descriptor sized and aligned for `T`.
    #[must_use]
    pub fn of<T: Pod>(name: impl Into<String>) -> Self {
        Self::new(name, std::mem::size_of::<T>(), std::mem::align_of::<T>())
    }

    /// Creates a zero-size flag descriptor.
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name, 0, 1)
    }

    /// Sets the version checked when restoring snapshots.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets the verify hook.
    #[must_use]
    pub fn with_verify(mut self, hook: impl Fn(EntityId, &[u8]) -> bool + 'static) -> Self {
        self.verify = Some(Box::new(hook));
        self
    }

    /// Sets the cleanup hook, run whenever the payload leaves the world.
    #[must_use]
    pub fn with_cleanup(
        mut self,
        hook: impl Fn(&mut CleanupContext<'_>, EntityId, &mut [u8], bool) + 'static,
    ) -> Self {
        self.cleanup = Some(Box::new(hook));
        self
    }

    /// Sets the serialize hook.
    #[must_use]
    pub fn with_serialize(
        mut self,
        hook: impl Fn(&mut ComponentWriter<'_>, &[u8]) -> EcpsResult<()> + 'static,
    ) -> Self {
        self.serialize = Some(Box::new(hook));
        self
    }

    /// Sets the deserialize hook.
    #[must_use]
    pub fn with_deserialize(
        mut self,
        hook: impl Fn(&mut ComponentReader<'_>, &mut [u8]) -> EcpsResult<()> + 'static,
    ) -> Self {
        self.deserialize = Some(Box::new(hook));
        self
    }

    /// Persists the payload bytes verbatim.
    ///
    /// Only suitable for payloads without entity references or runtime
    /// handles.
    #[must_use]
    pub fn with_raw_serialization(self) -> Self {
        self.with_serialize(|writer, bytes| writer.write_bin(bytes))
            .with_deserialize(|reader, bytes| reader.read_bin_into(bytes))
    }

    /// Returns the type name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the payload size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the payload alignment.
    #[inline]
    #[must_use]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Returns the type version.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn verify_hook(&self) -> Option<&VerifyHook> {
        self.verify.as_ref()
    }

    pub(crate) fn cleanup_hook(&self) -> Option<&CleanupHook> {
        self.cleanup.as_ref()
    }

    pub(crate) fn serialize_hook(&self) -> Option<&SerializeHook> {
        self.serialize.as_ref()
    }

    pub(crate) fn deserialize_hook(&self) -> Option<&DeserializeHook> {
        self.deserialize.as_ref()
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .field("version", &self.version)
            .field("verify", &self.verify.is_some())
            .field("cleanup", &self.cleanup.is_some())
            .field("serialize", &self.serialize.is_some())
            .field("deserialize", &self.deserialize.is_some())
            .finish()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Dense table of registered component types.
#[derive(Debug)]
pub struct ComponentRegistry {
    types: Vec<ComponentType>,
}

impl ComponentRegistry {
    /// Creates a registry holding only the builtins.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: vec![
                ComponentType::of::<u32>(ID_COMPONENT_NAME),
                ComponentType::tag(ENABLED_COMPONENT_NAME),
            ],
        }
    }

    /// Registers a component type.
    ///
    /// # Errors
    ///
    /// Fails when the type table is full, the name is empty, longer than
    /// [`MAX_COMPONENT_NAME_LEN`] or already registered, or the alignment
    /// is not a power of two up to [`MAX_COMPONENT_ALIGN`].
    pub fn register(&mut self, component: ComponentType) -> EcpsResult<ComponentId> {
        if self.types.len() >= MAX_COMPONENT_TYPES {
            tracing::error!(name = component.name(), "too many component types");
            return Err(EcpsError::TooManyComponentTypes { max: MAX_COMPONENT_TYPES });
        }

        let reason = if component.name.is_empty() {
            Some("empty")
        } else if component.name.len() > MAX_COMPONENT_NAME_LEN {
            Some("longer than 32 bytes")
        } else if self.find(&component.name).is_some() {
            Some("already registered")
        } else {
            None
        };
        if let Some(reason) = reason {
            tracing::error!(name = component.name(), reason, "component registration rejected");
            return Err(EcpsError::InvalidComponentName { name: component.name, reason });
        }

        if !component.align.is_power_of_two() || component.align > MAX_COMPONENT_ALIGN {
            tracing::error!(name = component.name(), align = component.align, "invalid alignment");
            return Err(EcpsError::InvalidAlignment {
                name: component.name,
                align: component.align,
            });
        }

        let id = ComponentId::from_index(self.types.len());
        tracing::debug!(name = component.name(), id = id.raw(), size = component.size, "component registered");
        self.types.push(component);
        Ok(id)
    }

    /// Bounds check on a component ID.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, id: ComponentId) -> bool {
        id.index() < self.types.len()
    }

    /// Returns the descriptor for an ID.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<&ComponentType> {
        self.types.get(id.index())
    }

    /// Returns the payload size for an ID.
    #[inline]
    #[must_use]
    pub fn size_of(&self, id: ComponentId) -> Option<usize> {
        self.get(id).map(ComponentType::size)
    }

    /// Finds a type by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ComponentId> {
        self.types
            .iter()
            .position(|ty| ty.name == name)
            .map(ComponentId::from_index)
    }

    /// Number of registered types, builtins included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always `false`: the builtins are present from construction.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates every type in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &ComponentType)> {
        self.types
            .iter()
            .enumerate()
            .map(|(index, ty)| (ComponentId::from_index(index), ty))
    }

    /// Checks a payload against the registered size.
    pub(crate) fn check_payload(&self, id: ComponentId, payload: &[u8]) -> EcpsResult<()> {
        let expected = self.size_of(id).ok_or(EcpsError::UnknownComponent(id.raw()))?;
        if payload.len() == expected {
            Ok(())
        } else {
            Err(EcpsError::PayloadSizeMismatch {
                component: id.raw(),
                expected,
                actual: payload.len(),
            })
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_come_first() {
        let registry = ComponentRegistry::new();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find(ID_COMPONENT_NAME), Some(ComponentId::ID));
        assert_eq!(registry.find(ENABLED_COMPONENT_NAME), Some(ComponentId::ENABLED));
        assert_eq!(registry.size_of(ComponentId::ID), Some(4));
        assert_eq!(registry.size_of(ComponentId::ENABLED), Some(0));
    }

    #[test]
    fn test_register_assigns_dense_ids() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register(ComponentType::of::<u32>("a")).unwrap();
        let b = registry.register(ComponentType::of::<[f32; 2]>("b").with_version(3)).unwrap();
        assert_eq!(a.index(), 2);
        assert_eq!(b.index(), 3);
        assert!(registry.is_valid(b));
        assert!(!registry.is_valid(ComponentId::from_index(4)));
        assert_eq!(registry.get(b).unwrap().version(), 3);
        assert_eq!(registry.get(b).unwrap().size(), 8);
    }

    #[test]
    fn test_rejects_bad_names() {
        let mut registry = ComponentRegistry::new();
        assert!(matches!(
            registry.register(ComponentType::tag("")),
            Err(EcpsError::InvalidComponentName { .. })
        ));
        assert!(matches!(
            registry.register(ComponentType::tag("x".repeat(MAX_COMPONENT_NAME_LEN + 1))),
            Err(EcpsError::InvalidComponentName { .. })
        ));
        assert!(matches!(
            registry.register(ComponentType::tag(ENABLED_COMPONENT_NAME)),
            Err(EcpsError::InvalidComponentName { .. })
        ));
        assert!(registry.register(ComponentType::tag("x".repeat(MAX_COMPONENT_NAME_LEN))).is_ok());
    }

    #[test]
    fn test_rejects_bad_alignment() {
        let mut registry = ComponentRegistry::new();
        assert!(matches!(
            registry.register(ComponentType::new("odd", 6, 3)),
            Err(EcpsError::InvalidAlignment { align: 3, .. })
        ));
        assert!(matches!(
            registry.register(ComponentType::new("huge", 64, 64)),
            Err(EcpsError::InvalidAlignment { align: 64, .. })
        ));
    }

    #[test]
    fn test_type_capacity() {
        let mut registry = ComponentRegistry::new();
        for i in 2..MAX_COMPONENT_TYPES {
            registry.register(ComponentType::tag(format!("t{i}"))).unwrap();
        }
        assert!(matches!(
            registry.register(ComponentType::tag("overflow")),
            Err(EcpsError::TooManyComponentTypes { .. })
        ));
    }

    #[test]
    fn test_check_payload() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register(ComponentType::of::<u64>("a")).unwrap();
        assert!(registry.check_payload(a, &[0; 8]).is_ok());
        assert!(matches!(
            registry.check_payload(a, &[0; 4]),
            Err(EcpsError::PayloadSizeMismatch { expected: 8, actual: 4, .. })
        ));
        assert!(matches!(
            registry.check_payload(ComponentId::from_index(99), &[]),
            Err(EcpsError::UnknownComponent(99))
        ));
    }
}
