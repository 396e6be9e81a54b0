//! # Entity Groups
//!
//! Tag entities, or whole transform subtrees, with a [`Group`] number and
//! destroy every member in one call.

use ecps_core::{Ecps, EntityId};

use crate::components::{Components, Group};
use crate::error::{ComponentsError, ComponentsResult};
use crate::hierarchy::children;

/// Puts an entity into `group`, replacing any previous group.
///
/// # Errors
///
/// Fails if the entity does not exist.
pub fn add_group_id(ecps: &mut Ecps, components: &Components, entity: EntityId, group: u32) -> ComponentsResult<()> {
    if !ecps.does_exist(entity) {
        return Err(ComponentsError::EntityNotFound(entity));
    }
    ecps.insert(entity, components.group, &Group { id: group })?;
    Ok(())
}

/// Puts `root` and every transform descendant into `group`.
///
/// # Returns
///
/// Number of entities tagged.
///
/// # Errors
///
/// Fails if `root` does not exist.
pub fn add_group_id_to_tree(
    ecps: &mut Ecps,
    components: &Components,
    root: EntityId,
    group: u32,
) -> ComponentsResult<usize> {
    let mut pending = vec![root];
    let mut tagged = 0;
    while let Some(entity) = pending.pop() {
        add_group_id(ecps, components, entity, group)?;
        tagged += 1;
        pending.extend(children(ecps, components.transform, entity));
        // Bounded by the ID space in case the links were corrupted.
        if tagged > usize::from(u16::MAX) {
            tracing::warn!(%root, "transform tree does not terminate");
            break;
        }
    }
    Ok(tagged)
}

/// Destroys every entity in `group`.
///
/// While a process iterates the destruction is queued like any other.
///
/// # Returns
///
/// Number of entities destroyed, or queued for destruction.
pub fn delete_all_of_group(ecps: &mut Ecps, components: &Components, group: u32) -> usize {
    let members: Vec<EntityId> = ecps
        .entities()
        .filter(|entity| ecps.get::<Group>(*entity, components.group).is_some_and(|g| g.id == group))
        .collect();
    let destroyed = members.into_iter().filter(|entity| ecps.destroy_entity(*entity)).count();
    tracing::debug!(group, destroyed, "group deleted");
    destroyed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ResourceNames, Transform};
    use crate::hierarchy::attach_child;
    use ecps_core::EcpsBuilder;

    fn world() -> (Ecps, Components) {
        let mut builder = EcpsBuilder::new();
        let components = Components::register(&mut builder, &ResourceNames::new()).unwrap();
        (builder.build(), components)
    }

    fn spawn(ecps: &mut Ecps, c: &Components) -> EntityId {
        ecps.spawn().with(c.transform, &Transform::default()).build().unwrap()
    }

    #[test]
    fn test_add_group_id_overwrites() {
        let (mut ecps, c) = world();
        let e = spawn(&mut ecps, &c);

        add_group_id(&mut ecps, &c, e, 3).unwrap();
        add_group_id(&mut ecps, &c, e, 7).unwrap();
        assert_eq!(ecps.get::<Group>(e, c.group), Some(&Group { id: 7 }));

        ecps.destroy_entity(e);
        assert!(matches!(add_group_id(&mut ecps, &c, e, 1), Err(ComponentsError::EntityNotFound(_))));
    }

    #[test]
    fn test_tree_tagging_and_group_deletion() {
        let (mut ecps, c) = world();
        let root = spawn(&mut ecps, &c);
        let mid = spawn(&mut ecps, &c);
        let leaf = spawn(&mut ecps, &c);
        let sibling = spawn(&mut ecps, &c);
        let outsider = spawn(&mut ecps, &c);
        attach_child(&mut ecps, c.transform, root, mid).unwrap();
        attach_child(&mut ecps, c.transform, mid, leaf).unwrap();
        attach_child(&mut ecps, c.transform, root, sibling).unwrap();
        add_group_id(&mut ecps, &c, outsider, 2).unwrap();

        assert_eq!(add_group_id_to_tree(&mut ecps, &c, root, 1).unwrap(), 4);
        assert_eq!(delete_all_of_group(&mut ecps, &c, 1), 4);
        assert_eq!(ecps.entities().collect::<Vec<_>>(), vec![outsider]);
        assert_eq!(delete_all_of_group(&mut ecps, &c, 1), 0);
    }
}
