//! # Transform Hierarchy
//!
//! Parent/child links between [`Transform`] components. Children keep the
//! order in which they were attached. Local values are kept as they are;
//! attaching does not rebase a child into its parent's space.

use ecps_core::{CleanupContext, ComponentId, Ecps, EntityId};

use crate::components::Transform;
use crate::error::{ComponentsError, ComponentsResult};

fn transform(ecps: &Ecps, id: ComponentId, entity: EntityId) -> ComponentsResult<Transform> {
    if !ecps.does_exist(entity) {
        return Err(ComponentsError::EntityNotFound(entity));
    }
    ecps.get::<Transform>(entity, id)
        .copied()
        .ok_or(ComponentsError::MissingTransform(entity))
}

fn update(ecps: &mut Ecps, id: ComponentId, entity: EntityId, edit: impl FnOnce(&mut Transform)) {
    if let Some(tf) = ecps.get_mut::<Transform>(entity, id) {
        edit(tf);
    }
}

/// Transform access shared by the world and by cleanup hooks.
trait TransformLinks {
    fn read(&self, id: ComponentId, entity: EntityId) -> Option<Transform>;
    fn edit(&mut self, id: ComponentId, entity: EntityId, edit: impl FnOnce(&mut Transform));
}

impl TransformLinks for Ecps {
    fn read(&self, id: ComponentId, entity: EntityId) -> Option<Transform> {
        self.get::<Transform>(entity, id).copied()
    }

    fn edit(&mut self, id: ComponentId, entity: EntityId, edit: impl FnOnce(&mut Transform)) {
        update(self, id, entity, edit);
    }
}

impl TransformLinks for CleanupContext<'_> {
    fn read(&self, id: ComponentId, entity: EntityId) -> Option<Transform> {
        self.get::<Transform>(entity, id).copied()
    }

    fn edit(&mut self, id: ComponentId, entity: EntityId, edit: impl FnOnce(&mut Transform)) {
        if let Some(tf) = self.get_mut::<Transform>(entity, id) {
            edit(tf);
        }
    }
}

/// Removes `entity` from its parent's child list. `tf` is the entity's
/// transform as it was before unlinking.
fn unlink(links: &mut impl TransformLinks, id: ComponentId, entity: EntityId, tf: &Transform) {
    let parent = tf.parent();
    if parent.is_null() {
        return;
    }

    let next = tf.next_sibling();
    let Some(first) = links.read(id, parent).map(|ptf| ptf.first_child()) else {
        tracing::debug!(%entity, %parent, "detaching from a parent that no longer exists");
        return;
    };
    if first == entity {
        links.edit(id, parent, |ptf| ptf.set_first_child(next));
        return;
    }

    let mut current = first;
    for _ in 0..=u16::MAX {
        let Some(sibling) = links.read(id, current) else {
            break;
        };
        if sibling.next_sibling() == entity {
            links.edit(id, current, |stf| stf.set_next_sibling(next));
            return;
        }
        current = sibling.next_sibling();
    }
    tracing::warn!(%entity, %parent, "entity missing from its parent's child list");
}

/// Cleanup for a transform leaving the world: the entity leaves its
/// parent's child list and its children become roots.
pub(crate) fn release_links(context: &mut CleanupContext<'_>, entity: EntityId, tf: &Transform) {
    let id = context.component();
    unlink(context, id, entity, tf);

    let mut child = tf.first_child();
    for _ in 0..=u16::MAX {
        let Some(ctf) = context.read(id, child) else {
            break;
        };
        context.edit(id, child, |orphan| {
            orphan.set_parent(EntityId::NULL);
            orphan.set_next_sibling(EntityId::NULL);
        });
        child = ctf.next_sibling();
    }
}

/// Checks whether `entity` is `ancestor` or lies below it.
#[must_use]
pub fn is_descendant_of(ecps: &Ecps, id: ComponentId, entity: EntityId, ancestor: EntityId) -> bool {
    let mut current = entity;
    // Bounded by the ID space in case the links were corrupted.
    for _ in 0..=u16::MAX {
        if current.is_null() {
            return false;
        }
        if current == ancestor {
            return true;
        }
        match ecps.get::<Transform>(current, id) {
            Some(tf) => current = tf.parent(),
            None => return false,
        }
    }
    tracing::warn!(%entity, "transform parent chain does not terminate");
    false
}

/// Attaches `child` as the last child of `parent`.
///
/// The child is detached from any previous parent first.
///
/// # Errors
///
/// Fails if either entity is missing or has no transform, or if `parent`
/// is `child` or one of its descendants.
pub fn attach_child(ecps: &mut Ecps, id: ComponentId, parent: EntityId, child: EntityId) -> ComponentsResult<()> {
    transform(ecps, id, parent)?;
    transform(ecps, id, child)?;
    if is_descendant_of(ecps, id, parent, child) {
        tracing::debug!(%parent, %child, "attach refused: would create a cycle");
        return Err(ComponentsError::HierarchyCycle { parent, child });
    }

    detach(ecps, id, child)?;

    let first = transform(ecps, id, parent)?.first_child();
    if first.is_null() {
        update(ecps, id, parent, |tf| tf.set_first_child(child));
    } else {
        let last = children(ecps, id, parent).last().copied().unwrap_or(first);
        update(ecps, id, last, |tf| tf.set_next_sibling(child));
    }
    update(ecps, id, child, |tf| tf.set_parent(parent));
    Ok(())
}

/// Detaches an entity from its parent. Roots are left as they are.
///
/// # Errors
///
/// Fails if the entity is missing or has no transform.
pub fn detach(ecps: &mut Ecps, id: ComponentId, entity: EntityId) -> ComponentsResult<()> {
    let tf = transform(ecps, id, entity)?;
    if tf.parent().is_null() {
        return Ok(());
    }

    unlink(ecps, id, entity, &tf);
    update(ecps, id, entity, |tf| {
        tf.set_parent(EntityId::NULL);
        tf.set_next_sibling(EntityId::NULL);
    });
    Ok(())
}

/// Lists the direct children of an entity, in attachment order.
#[must_use]
pub fn children(ecps: &Ecps, id: ComponentId, parent: EntityId) -> Vec<EntityId> {
    let mut out = Vec::new();
    let mut next = ecps
        .get::<Transform>(parent, id)
        .map_or(EntityId::NULL, Transform::first_child);
    while !next.is_null() && out.len() <= usize::from(u16::MAX) {
        out.push(next);
        next = ecps
            .get::<Transform>(next, id)
            .map_or(EntityId::NULL, Transform::next_sibling);
    }
    out
}
