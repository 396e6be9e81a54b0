//! # ECPS Instance
//!
//! [`EcpsBuilder`] is the registration window: component types and
//! processes are declared there, then [`EcpsBuilder::build`] seals the
//! registry into an [`Ecps`].
//!
//! ## Immediate vs Deferred
//!
//! Outside of [`Ecps::run_process`] every structural mutation applies
//! immediately. While a process iterates, the same calls are validated and
//! appended to the command log instead; the log is replayed through the
//! immediate path once iteration ends.
//!
//! IDs of entities created while iterating are claimed up front, so later
//! queued commands may target them. Such entities only become visible to
//! queries after the replay.

use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::Pod;

use super::archetype::{ArchetypeStore, EntityLocation};
use super::command::{Command, CommandBuffer};
use super::component::{ComponentId, ComponentRegistry, ComponentType};
use super::entity::{EntityId, IdAllocator};
use super::flags::ComponentFlags;
use super::process::Process;
use crate::config::EcpsConfig;
use crate::error::{EcpsError, EcpsResult};

static NEXT_INSTANCE: AtomicU32 = AtomicU32::new(1);

// ============================================================================
// BUILDER
// ============================================================================

/// Registration window of an ECPS instance.
///
/// ```rust,ignore
/// let mut builder = EcpsBuilder::new();
/// let position = builder.register::<[f32; 2]>("position")?;
/// let movement = builder.create_process(Process::new("movement", step).requires(&[position]))?;
/// let mut ecps = builder.build();
/// ```
#[derive(Debug)]
pub struct EcpsBuilder {
    instance: u32,
    config: EcpsConfig,
    registry: ComponentRegistry,
}

impl EcpsBuilder {
    /// Opens a registration window with default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            config: EcpsConfig::default(),
            registry: ComponentRegistry::new(),
        }
    }

    /// Replaces the sizing configuration.
    #[must_use]
    pub fn with_config(mut self, config: EcpsConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a component type.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::register`].
    pub fn register_component(&mut self, component: ComponentType) -> EcpsResult<ComponentId> {
        self.registry.register(component)
    }

    /// Registers a plain component sized for `T`, without hooks.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::register`].
    pub fn register<T: Pod>(&mut self, name: &str) -> EcpsResult<ComponentId> {
        self.registry.register(ComponentType::of::<T>(name))
    }

    /// Validates a process against the registry and binds it to this
    /// instance.
    ///
    /// The required set always includes `ID` and `Enabled`.
    ///
    /// # Errors
    ///
    /// Returns [`EcpsError::UnknownComponent`] for any required ID that is
    /// not registered.
    pub fn create_process(&self, mut process: Process) -> EcpsResult<Process> {
        if let Some(id) = process.requested().iter().find(|id| !self.registry.is_valid(**id)) {
            tracing::error!(process = process.name(), component = id.raw(), "process requires an unknown component");
            return Err(EcpsError::UnknownComponent(id.raw()));
        }
        let required = ComponentFlags::from_ids(process.requested())
            .union(&ComponentFlags::from_ids(&[ComponentId::ID, ComponentId::ENABLED]));
        process.bind(self.instance, required);
        tracing::debug!(process = process.name(), instance = self.instance, "process created");
        Ok(process)
    }

    /// Returns the registry as built so far.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Seals the registry and creates the instance.
    #[must_use]
    pub fn build(self) -> Ecps {
        let config = self.config;
        tracing::debug!(
            instance = self.instance,
            component_types = self.registry.len(),
            max_entities = config.max_entities,
            "ecps sealed"
        );
        Ecps {
            instance: self.instance,
            registry: self.registry,
            ids: IdAllocator::new(config.max_entities),
            store: ArchetypeStore::new(config.initial_directory_capacity, config.initial_archetype_capacity),
            commands: CommandBuffer::with_capacity(config.initial_command_buffer_bytes),
            iterating: false,
        }
    }
}

impl Default for EcpsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ENTITY VIEW
// ============================================================================

/// Transient handle on an entity's record.
///
/// Valid until the next structural mutation on the instance. Processes
/// receive one per visited entity; component access goes through the
/// `*_in` accessors of [`Ecps`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityView {
    id: EntityId,
    location: EntityLocation,
}

impl EntityView {
    pub(crate) fn new(id: EntityId, location: EntityLocation) -> Self {
        Self { id, location }
    }

    /// The entity's ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Where the record lives.
    #[inline]
    #[must_use]
    pub fn location(&self) -> EntityLocation {
        self.location
    }
}

// ============================================================================
// CLEANUP CONTEXT
// ============================================================================

/// Payload access handed to cleanup hooks.
///
/// Lets a hook rewrite data held by other entities, e.g. links pointing at
/// the entity being cleaned up. Structural mutation is not available here.
pub struct CleanupContext<'a> {
    registry: &'a ComponentRegistry,
    store: &'a mut ArchetypeStore,
    component: ComponentId,
}

impl CleanupContext<'_> {
    /// The component being cleaned up.
    #[inline]
    #[must_use]
    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// Checks whether an entity exists.
    #[inline]
    #[must_use]
    pub fn does_exist(&self, entity: EntityId) -> bool {
        self.store.contains(entity)
    }

    /// Returns another entity's typed component.
    #[must_use]
    pub fn get<T: Pod>(&self, entity: EntityId, component: ComponentId) -> Option<&T> {
        (self.registry.size_of(component)? == std::mem::size_of::<T>()).then_some(())?;
        let location = self.store.location(entity)?;
        bytemuck::try_from_bytes(self.store.component(location, component)?).ok()
    }

    /// Returns another entity's typed component, mutably.
    pub fn get_mut<T: Pod>(&mut self, entity: EntityId, component: ComponentId) -> Option<&mut T> {
        (self.registry.size_of(component)? == std::mem::size_of::<T>()).then_some(())?;
        let location = self.store.location(entity)?;
        bytemuck::try_from_bytes_mut(self.store.component_mut(location, component)?).ok()
    }
}

impl std::fmt::Debug for CleanupContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupContext")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ECPS
// ============================================================================

/// One isolated entity-component-process store.
///
/// Instances share nothing; several may coexist, e.g. for sandboxed
/// sub-worlds. Every call must come from the owning thread.
#[derive(Debug)]
pub struct Ecps {
    instance: u32,
    registry: ComponentRegistry,
    ids: IdAllocator,
    store: ArchetypeStore,
    commands: CommandBuffer,
    pub(crate) iterating: bool,
}

impl Ecps {
    /// Opens a registration window.
    #[must_use]
    pub fn builder() -> EcpsBuilder {
        EcpsBuilder::new()
    }

    /// Unique number of this instance.
    #[inline]
    #[must_use]
    pub fn instance_id(&self) -> u32 {
        self.instance
    }

    /// The sealed component registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// The archetype store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ArchetypeStore {
        &self.store
    }

    /// Checks whether a process is currently iterating.
    #[inline]
    #[must_use]
    pub fn is_iterating(&self) -> bool {
        self.iterating
    }

    /// Number of commands waiting for replay.
    #[inline]
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    // ------------------------------------------------------------------------
    // Entity lifecycle
    // ------------------------------------------------------------------------

    /// Creates an entity with `ID`, `Enabled` and the given components.
    ///
    /// # Arguments
    ///
    /// * `components` - `(component, payload)` pairs; each payload must
    ///   match the registered size. Zero-size components take `&[]`.
    ///
    /// # Errors
    ///
    /// Fails on unknown components, payload size mismatch, or when the ID
    /// space is exhausted. Nothing is created on failure.
    pub fn create_entity(&mut self, components: &[(ComponentId, &[u8])]) -> EcpsResult<EntityId> {
        for (id, payload) in components {
            self.registry.check_payload(*id, payload)?;
        }

        let Some(entity) = self.ids.claim() else {
            tracing::warn!(capacity = self.ids.capacity(), "entity creation failed: id space exhausted");
            return Err(EcpsError::EntityCapacityReached { capacity: self.ids.capacity() });
        };

        if self.iterating {
            self.commands.push_create(entity, components);
        } else {
            self.insert_entity(entity, components.iter().copied());
        }
        Ok(entity)
    }

    /// Starts building an entity.
    #[must_use]
    pub fn spawn(&mut self) -> EntityBuilder<'_> {
        EntityBuilder {
            ecps: self,
            components: Vec::new(),
            bytes: Vec::new(),
        }
    }

    /// Destroys an entity, running every cleanup hook first.
    ///
    /// # Returns
    ///
    /// `false` if the entity does not exist. While iterating, `true` means
    /// the destruction was queued.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if self.iterating {
            if !self.ids.is_valid(entity) {
                return false;
            }
            self.commands.push_destroy(entity);
            return true;
        }

        let Some(location) = self.store.location(entity) else {
            return false;
        };
        self.run_cleanup(entity, location, None, false);
        self.store.remove(entity, location);
        self.ids.release(entity);
        tracing::trace!(%entity, "entity destroyed");
        true
    }

    /// Destroys an entity given its view.
    pub fn destroy_entity_in(&mut self, view: &EntityView) -> bool {
        self.destroy_entity(view.id)
    }

    /// Destroys every entity, running cleanup hooks with the full-teardown
    /// flag set. Archetypes are kept.
    ///
    /// # Errors
    ///
    /// Not allowed while a process is iterating.
    pub fn destroy_all_entities(&mut self) -> EcpsResult<()> {
        if self.iterating {
            return Err(EcpsError::ProcessIterating("destroy_all_entities"));
        }

        let live: Vec<(EntityId, EntityLocation)> = self
            .store
            .archetypes()
            .enumerate()
            .flat_map(|(archetype, arch)| {
                arch.entities()
                    .map(move |(id, offset)| (id, EntityLocation { archetype, offset }))
            })
            .collect();
        for (entity, location) in &live {
            self.run_cleanup(*entity, *location, None, true);
        }

        self.store.clear();
        self.ids.clear();
        self.commands.clear();
        tracing::debug!(instance = self.instance, destroyed = live.len(), "all entities destroyed");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Component mutation
    // ------------------------------------------------------------------------

    /// Adds a component to an entity.
    ///
    /// With `payload == None` a newly added component starts zeroed. If the
    /// entity already has the component, a payload overwrites it and `None`
    /// leaves it untouched.
    ///
    /// # Errors
    ///
    /// Fails on unknown components, payload size mismatch, or a missing
    /// entity.
    pub fn add_component(&mut self, entity: EntityId, component: ComponentId, payload: Option<&[u8]>) -> EcpsResult<()> {
        if !self.registry.is_valid(component) {
            return Err(EcpsError::UnknownComponent(component.raw()));
        }
        if let Some(bytes) = payload {
            self.registry.check_payload(component, bytes)?;
        }
        if component == ComponentId::ID {
            return Ok(());
        }

        if self.iterating {
            if !self.ids.is_valid(entity) {
                return Err(EcpsError::EntityNotFound(entity));
            }
            self.commands.push_add(entity, component, payload);
            return Ok(());
        }

        let location = self.store.location(entity).ok_or(EcpsError::EntityNotFound(entity))?;
        let flags = self.flags_of(location);
        let location = if flags.is_on(component) {
            location
        } else {
            let mut flags = flags;
            flags.set_on(component);
            self.store.migrate(location, &flags, &self.registry)
        };

        if let Some(bytes) = payload {
            if let Some(slot) = self.store.component_mut(location, component) {
                slot.copy_from_slice(bytes);
            }
        }
        Ok(())
    }

    /// Adds a component given the entity's view.
    ///
    /// # Errors
    ///
    /// See [`Ecps::add_component`].
    pub fn add_component_to(&mut self, view: &EntityView, component: ComponentId, payload: Option<&[u8]>) -> EcpsResult<()> {
        self.add_component(view.id, component, payload)
    }

    /// Adds or overwrites a typed component.
    ///
    /// # Errors
    ///
    /// See [`Ecps::add_component`].
    pub fn insert<T: Pod>(&mut self, entity: EntityId, component: ComponentId, value: &T) -> EcpsResult<()> {
        self.add_component(entity, component, Some(bytemuck::bytes_of(value)))
    }

    /// Removes a component from an entity, running its cleanup hook.
    ///
    /// Removing a component the entity does not have succeeds and does
    /// nothing. `ID` cannot be removed.
    ///
    /// # Errors
    ///
    /// Fails on unknown components or a missing entity.
    pub fn remove_component(&mut self, entity: EntityId, component: ComponentId) -> EcpsResult<()> {
        if !self.registry.is_valid(component) {
            return Err(EcpsError::UnknownComponent(component.raw()));
        }
        if component == ComponentId::ID {
            debug_assert!(false, "the ID component cannot be removed");
            tracing::error!(%entity, "attempted to remove the ID component");
            return Ok(());
        }

        if self.iterating {
            if !self.ids.is_valid(entity) {
                return Err(EcpsError::EntityNotFound(entity));
            }
            self.commands.push_remove(entity, component);
            return Ok(());
        }

        let location = self.store.location(entity).ok_or(EcpsError::EntityNotFound(entity))?;
        let mut flags = self.flags_of(location);
        if !flags.is_on(component) {
            return Ok(());
        }

        self.run_cleanup(entity, location, Some(component), false);
        flags.set_off(component);
        self.store.migrate(location, &flags, &self.registry);
        Ok(())
    }

    /// Removes a component given the entity's view.
    ///
    /// # Errors
    ///
    /// See [`Ecps::remove_component`].
    pub fn remove_component_from(&mut self, view: &EntityView, component: ComponentId) -> EcpsResult<()> {
        self.remove_component(view.id, component)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Looks up a live entity.
    #[must_use]
    pub fn entity(&self, entity: EntityId) -> Option<EntityView> {
        self.store.location(entity).map(|location| EntityView::new(entity, location))
    }

    /// Checks whether an entity exists.
    #[inline]
    #[must_use]
    pub fn does_exist(&self, entity: EntityId) -> bool {
        self.store.contains(entity)
    }

    /// Checks whether an entity has a component.
    #[must_use]
    pub fn has_component(&self, entity: EntityId, component: ComponentId) -> bool {
        self.store
            .location(entity)
            .is_some_and(|location| self.flags_of(location).is_on(component))
    }

    /// Checks whether a viewed entity has a component.
    ///
    /// A stale view has no components.
    #[must_use]
    pub fn has_component_in(&self, view: &EntityView, component: ComponentId) -> bool {
        self.current(view)
            .is_some_and(|location| self.flags_of(location).is_on(component))
    }

    /// Returns the component set of an entity.
    #[must_use]
    pub fn components_of(&self, entity: EntityId) -> Option<ComponentFlags> {
        self.store.location(entity).map(|location| self.flags_of(location))
    }

    /// Returns a component's payload bytes.
    #[must_use]
    pub fn component(&self, entity: EntityId, component: ComponentId) -> Option<&[u8]> {
        let location = self.store.location(entity)?;
        self.store.component(location, component)
    }

    /// Returns a component's payload bytes, mutably.
    pub fn component_mut(&mut self, entity: EntityId, component: ComponentId) -> Option<&mut [u8]> {
        let location = self.store.location(entity)?;
        self.store.component_mut(location, component)
    }

    /// Returns a viewed entity's component bytes.
    ///
    /// `None` once the view is stale, i.e. its entity was destroyed or
    /// moved by a structural mutation.
    #[must_use]
    pub fn component_in(&self, view: &EntityView, component: ComponentId) -> Option<&[u8]> {
        let location = self.current(view)?;
        self.store.component(location, component)
    }

    /// Returns a viewed entity's component bytes, mutably.
    pub fn component_in_mut(&mut self, view: &EntityView, component: ComponentId) -> Option<&mut [u8]> {
        let location = self.current(view)?;
        self.store.component_mut(location, component)
    }

    /// Returns a typed component.
    ///
    /// `None` if the entity or component is missing, or if `T` does not
    /// match the registered size.
    #[must_use]
    pub fn get<T: Pod>(&self, entity: EntityId, component: ComponentId) -> Option<&T> {
        self.check_type::<T>(component)?;
        bytemuck::try_from_bytes(self.component(entity, component)?).ok()
    }

    /// Returns a typed component, mutably.
    pub fn get_mut<T: Pod>(&mut self, entity: EntityId, component: ComponentId) -> Option<&mut T> {
        self.check_type::<T>(component)?;
        bytemuck::try_from_bytes_mut(self.component_mut(entity, component)?).ok()
    }

    /// Returns a viewed entity's typed component.
    #[must_use]
    pub fn get_in<T: Pod>(&self, view: &EntityView, component: ComponentId) -> Option<&T> {
        self.check_type::<T>(component)?;
        bytemuck::try_from_bytes(self.component_in(view, component)?).ok()
    }

    /// Returns a viewed entity's typed component, mutably.
    pub fn get_in_mut<T: Pod>(&mut self, view: &EntityView, component: ComponentId) -> Option<&mut T> {
        self.check_type::<T>(component)?;
        bytemuck::try_from_bytes_mut(self.component_in_mut(view, component)?).ok()
    }

    /// Iterates live entities in index order.
    ///
    /// Entities whose creation is still queued are not included.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids.iter().filter(|id| self.store.contains(*id))
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.store.archetypes().map(|arch| arch.live_count()).sum()
    }

    /// Number of archetypes created so far.
    #[inline]
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.store.len()
    }

    // ------------------------------------------------------------------------
    // Debugging
    // ------------------------------------------------------------------------

    /// Runs every verify hook on an entity's components.
    ///
    /// # Returns
    ///
    /// `false` if the entity is missing or any hook rejects its payload.
    #[must_use]
    pub fn verify_entity(&self, entity: EntityId) -> bool {
        let Some(location) = self.store.location(entity) else {
            return false;
        };
        let mut ok = true;
        for id in self.flags_of(location).iter() {
            let (Some(ty), Some(bytes)) = (self.registry.get(id), self.store.component(location, id)) else {
                continue;
            };
            if let Some(verify) = ty.verify_hook() {
                if !verify(entity, bytes) {
                    tracing::warn!(%entity, component = ty.name(), "component failed verification");
                    ok = false;
                }
            }
        }
        ok
    }

    /// Verifies every live entity.
    ///
    /// # Returns
    ///
    /// The entities that failed.
    #[must_use]
    pub fn verify_all(&self) -> Vec<EntityId> {
        self.entities().filter(|id| !self.verify_entity(*id)).collect()
    }

    /// Logs every live entity with its archetype and components.
    pub fn dump_entities(&self, tag: &str) {
        tracing::debug!(tag, instance = self.instance, entities = self.entity_count(), "entity dump");
        for entity in self.entities() {
            let Some(location) = self.store.location(entity) else {
                continue;
            };
            let names: Vec<&str> = self
                .flags_of(location)
                .iter()
                .filter_map(|id| self.registry.get(id).map(ComponentType::name))
                .collect();
            tracing::debug!(
                tag,
                %entity,
                archetype = location.archetype,
                offset = location.offset,
                components = ?names,
                "entity"
            );
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Splits a borrow into the registry and one component payload.
    pub(crate) fn registry_and_component_mut(
        &mut self,
        entity: EntityId,
        component: ComponentId,
    ) -> Option<(&ComponentRegistry, &mut [u8])> {
        let location = self.store.location(entity)?;
        let bytes = self.store.component_mut(location, component)?;
        Some((&self.registry, bytes))
    }

    /// Component set at a location; empty if the location is out of range.
    fn flags_of(&self, location: EntityLocation) -> ComponentFlags {
        self.store.flags_at(location).copied().unwrap_or_default()
    }

    /// Location of a view, if its entity still lives there.
    fn current(&self, view: &EntityView) -> Option<EntityLocation> {
        self.store.is_current(view.id, view.location).then_some(view.location)
    }

    fn check_type<T: Pod>(&self, component: ComponentId) -> Option<()> {
        let size = self.registry.size_of(component)?;
        debug_assert_eq!(size, std::mem::size_of::<T>(), "typed access with a mismatched type");
        (size == std::mem::size_of::<T>()).then_some(())
    }

    fn insert_entity<'p>(&mut self, entity: EntityId, components: impl Iterator<Item = (ComponentId, &'p [u8])> + Clone) {
        let mut flags = ComponentFlags::from_ids(&[ComponentId::ID, ComponentId::ENABLED]);
        for (id, _) in components.clone() {
            flags.set_on(id);
        }

        let location = self.store.insert(entity, &flags, &self.registry);
        for (id, bytes) in components {
            if id == ComponentId::ID {
                continue;
            }
            if let Some(slot) = self.store.component_mut(location, id) {
                slot.copy_from_slice(bytes);
            }
        }
        tracing::trace!(%entity, archetype = location.archetype, "entity created");
    }

    /// Runs cleanup hooks for one component, or every component but `ID`.
    fn run_cleanup(&mut self, entity: EntityId, location: EntityLocation, only: Option<ComponentId>, full: bool) {
        let flags = self.flags_of(location);
        for id in flags.iter() {
            if id == ComponentId::ID || only.is_some_and(|only| only != id) {
                continue;
            }
            let Some(cleanup) = self.registry.get(id).and_then(ComponentType::cleanup_hook) else {
                continue;
            };
            let Some(mut payload) = self.store.component(location, id).map(<[u8]>::to_vec) else {
                continue;
            };
            let mut context = CleanupContext {
                registry: &self.registry,
                store: &mut self.store,
                component: id,
            };
            cleanup(&mut context, entity, &mut payload, full);
        }
    }

    /// Replays queued commands through the immediate path, in FIFO order.
    pub(crate) fn flush_commands(&mut self) {
        if self.commands.is_empty() {
            return;
        }
        debug_assert!(!self.iterating, "flushing commands while iterating");

        let commands = std::mem::take(&mut self.commands);
        tracing::trace!(count = commands.len(), "replaying deferred commands");
        for command in commands.iter() {
            self.apply(command);
        }

        let mut commands = commands;
        commands.clear();
        self.commands = commands;
    }

    fn apply(&mut self, command: Command<'_>) {
        match command {
            Command::CreateEntity { entity, components } => {
                if self.ids.is_valid(entity) && !self.store.contains(entity) {
                    self.insert_entity(entity, components.iter());
                } else {
                    tracing::debug!(%entity, "deferred create skipped");
                }
            }
            Command::DestroyEntity { entity } => {
                if !self.destroy_entity(entity) {
                    tracing::debug!(%entity, "deferred destroy skipped: entity no longer exists");
                }
            }
            Command::AddComponent { entity, component, payload } => {
                if let Err(err) = self.add_component(entity, component, payload) {
                    tracing::debug!(%entity, component = component.raw(), %err, "deferred add skipped");
                }
            }
            Command::RemoveComponent { entity, component } => {
                if let Err(err) = self.remove_component(entity, component) {
                    tracing::debug!(%entity, component = component.raw(), %err, "deferred remove skipped");
                }
            }
        }
    }
}

// ============================================================================
// ENTITY BUILDER
// ============================================================================

/// Collects components for a new entity.
///
/// ```rust,ignore
/// let e = ecps.spawn().with(position, &[0.0f32, 1.0]).with_tag(player).build()?;
/// ```
pub struct EntityBuilder<'a> {
    ecps: &'a mut Ecps,
    components: Vec<(ComponentId, std::ops::Range<usize>)>,
    bytes: Vec<u8>,
}

impl EntityBuilder<'_> {
    /// Adds a typed component.
    #[must_use]
    pub fn with<T: Pod>(self, component: ComponentId, value: &T) -> Self {
        self.with_bytes(component, bytemuck::bytes_of(value))
    }

    /// Adds a component from raw bytes.
    #[must_use]
    pub fn with_bytes(mut self, component: ComponentId, payload: &[u8]) -> Self {
        let start = self.bytes.len();
        self.bytes.extend_from_slice(payload);
        self.components.push((component, start..self.bytes.len()));
        self
    }

    /// Adds a zero-size component.
    #[must_use]
    pub fn with_tag(self, component: ComponentId) -> Self {
        self.with_bytes(component, &[])
    }

    /// Creates the entity.
    ///
    /// # Errors
    ///
    /// See [`Ecps::create_entity`].
    pub fn build(self) -> EcpsResult<EntityId> {
        let pairs: Vec<(ComponentId, &[u8])> = self
            .components
            .iter()
            .map(|(id, range)| (*id, &self.bytes[range.clone()]))
            .collect();
        self.ecps.create_entity(&pairs)
    }
}
