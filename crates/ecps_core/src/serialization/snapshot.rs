//! # Snapshots
//!
//! A snapshot is a relocatable copy of every live entity:
//!
//! - a component-info table: every registered type with a sequential
//!   internal ID, its name and version, and whether any entity used it
//! - an entity-info table: a 1-based local ID per entity, the live ID it
//!   was taken from (or restored into), and one blob per component
//!
//! The `ID` component is never stored. Blobs come from the component's
//! serialize hook; types without one are stored with an empty blob and
//! come back zero-filled.
//!
//! ## Restore
//!
//! Restoring is all-or-nothing. Every used type must match a registered
//! type by name and version. All entities are created before any payload
//! is deserialized, so payloads can reference entities later in the batch.
//! Any failure destroys every entity the batch created.

use super::cursor::{ComponentReader, ComponentWriter, EntityLookup};
use crate::ecs::{ComponentId, Ecps, EntityId};
use crate::error::{EcpsError, EcpsResult};

/// One component type as recorded in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedComponentInfo {
    /// Sequential ID inside the snapshot.
    pub internal_id: u32,
    /// Registered type name.
    pub name: String,
    /// Registered type version.
    pub version: u32,
    /// Whether any entity in the snapshot carries this type.
    pub used: bool,
}

/// One component payload of one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedComponent {
    /// Internal ID of the component info.
    pub component: u32,
    /// Bytes produced by the serialize hook.
    pub data: Vec<u8>,
}

/// One entity as recorded in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedEntityInfo {
    /// 1-based snapshot-local ID.
    pub local_id: u32,
    /// Live ID the entity was taken from, or was restored into.
    pub live_id: EntityId,
    /// Component payloads, in component ID order.
    pub components: Vec<SerializedComponent>,
}

/// Relocatable copy of a world.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerializedEcps {
    /// Component-info table.
    pub components: Vec<SerializedComponentInfo>,
    /// Entity-info table.
    pub entities: Vec<SerializedEntityInfo>,
}

impl SerializedEcps {
    /// Builds the local/live lookup from the entity-info table.
    #[must_use]
    pub fn lookup(&self) -> EntityLookup {
        EntityLookup::from_pairs(self.entities.iter().map(|info| (info.local_id, info.live_id)))
    }

    /// Returns the local ID of a live entity, 0 if absent.
    #[must_use]
    pub fn local_id(&self, live: EntityId) -> u32 {
        self.entities
            .iter()
            .find(|info| info.live_id == live && !live.is_null())
            .map_or(0, |info| info.local_id)
    }

    /// Returns the live entity behind a local ID.
    #[must_use]
    pub fn live_id(&self, local: u32) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|info| info.local_id == local && local != 0)
            .map(|info| info.live_id)
            .filter(|id| !id.is_null())
    }

    /// Finds a component info by internal ID.
    #[must_use]
    pub fn component_info(&self, internal_id: u32) -> Option<&SerializedComponentInfo> {
        self.components.iter().find(|info| info.internal_id == internal_id)
    }

    /// Number of entities in the snapshot.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Checks if the snapshot holds no entity.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Ecps {
    /// Snapshots every live entity.
    ///
    /// # Errors
    ///
    /// Not allowed while a process is iterating. Fails if a serialize
    /// hook fails.
    pub fn generate_snapshot(&self) -> EcpsResult<SerializedEcps> {
        if self.is_iterating() {
            return Err(EcpsError::ProcessIterating("generate_snapshot"));
        }

        let mut components: Vec<SerializedComponentInfo> = self
            .registry()
            .iter()
            .map(|(id, ty)| SerializedComponentInfo {
                internal_id: id.raw(),
                name: ty.name().to_owned(),
                version: ty.version(),
                used: false,
            })
            .collect();

        let mut entities: Vec<SerializedEntityInfo> = self
            .entities()
            .zip(1u32..)
            .map(|(live_id, local_id)| SerializedEntityInfo {
                local_id,
                live_id,
                components: Vec::new(),
            })
            .collect();
        let lookup = EntityLookup::from_pairs(entities.iter().map(|info| (info.local_id, info.live_id)));

        for info in &mut entities {
            let Some(flags) = self.components_of(info.live_id) else {
                continue;
            };
            for id in flags.iter().filter(|id| *id != ComponentId::ID) {
                let (Some(ty), Some(bytes)) = (self.registry().get(id), self.component(info.live_id, id)) else {
                    continue;
                };
                let mut data = Vec::new();
                if let Some(serialize) = ty.serialize_hook() {
                    serialize(&mut ComponentWriter::new(&mut data, &lookup), bytes).map_err(|err| {
                        tracing::error!(entity = %info.live_id, component = ty.name(), %err, "serialize hook failed");
                        EcpsError::Serialize {
                            component: ty.name().to_owned(),
                            reason: err.to_string(),
                        }
                    })?;
                }
                info.components.push(SerializedComponent { component: id.raw(), data });
                components[id.index()].used = true;
            }
        }

        tracing::debug!(entities = entities.len(), "snapshot generated");
        Ok(SerializedEcps { components, entities })
    }

    /// Restores a snapshot into this instance.
    ///
    /// On success every entity info's `live_id` holds the entity it was
    /// restored into.
    ///
    /// # Returns
    ///
    /// The created entities, in entity-info order.
    ///
    /// # Errors
    ///
    /// Not allowed while a process is iterating. Fails, leaving no entity
    /// behind, on a missing or mismatched component type, an unknown
    /// component reference, exhausted ID space, or a failing deserialize
    /// hook.
    pub fn restore_snapshot(&mut self, snapshot: &mut SerializedEcps) -> EcpsResult<Vec<EntityId>> {
        if self.is_iterating() {
            return Err(EcpsError::ProcessIterating("restore_snapshot"));
        }

        // Internal component ID -> live component ID, for used types only.
        let mut mapping: Vec<(u32, ComponentId)> = Vec::new();
        for info in snapshot.components.iter().filter(|info| info.used) {
            let Some(id) = self.registry().find(&info.name) else {
                tracing::error!(component = %info.name, "snapshot restore aborted: component type not registered");
                return Err(EcpsError::MissingComponentType { name: info.name.clone() });
            };
            let registered = self.registry().get(id).map_or(0, |ty| ty.version());
            if registered != info.version {
                tracing::error!(
                    component = %info.name,
                    serialized = info.version,
                    registered,
                    "snapshot restore aborted: component version mismatch"
                );
                return Err(EcpsError::ComponentVersionMismatch {
                    name: info.name.clone(),
                    serialized: info.version,
                    registered,
                });
            }
            mapping.push((info.internal_id, id));
        }

        let mut created = Vec::with_capacity(snapshot.entities.len());
        let result = self.restore_into(snapshot, &mapping, &mut created);
        if let Err(err) = result {
            tracing::error!(%err, rolled_back = created.len(), "snapshot restore failed");
            for entity in created {
                self.destroy_entity(entity);
            }
            for info in &mut snapshot.entities {
                info.live_id = EntityId::NULL;
            }
            return Err(err);
        }

        tracing::debug!(entities = created.len(), "snapshot restored");
        Ok(created)
    }

    fn restore_into(
        &mut self,
        snapshot: &mut SerializedEcps,
        mapping: &[(u32, ComponentId)],
        created: &mut Vec<EntityId>,
    ) -> EcpsResult<()> {
        // Every entity exists before any payload can reference it.
        for info in &mut snapshot.entities {
            let entity = self.create_entity(&[])?;
            created.push(entity);
            self.remove_component(entity, ComponentId::ENABLED)?;
            info.live_id = entity;
        }

        let lookup = snapshot.lookup();
        for info in &snapshot.entities {
            for serialized in &info.components {
                let id = mapping
                    .iter()
                    .find(|(internal, _)| *internal == serialized.component)
                    .map(|(_, id)| *id)
                    .ok_or(EcpsError::UnknownSerializedComponent(serialized.component))?;

                self.add_component(info.live_id, id, None)?;
                if serialized.data.is_empty() {
                    continue;
                }

                let Some((registry, bytes)) = self.registry_and_component_mut(info.live_id, id) else {
                    continue;
                };
                let Some(ty) = registry.get(id) else {
                    continue;
                };
                if let Some(deserialize) = ty.deserialize_hook() {
                    deserialize(&mut ComponentReader::new(&serialized.data, &lookup), bytes).map_err(|err| {
                        EcpsError::Deserialize {
                            component: ty.name().to_owned(),
                            reason: err.to_string(),
                        }
                    })?;
                }
            }
        }
        Ok(())
    }
}
