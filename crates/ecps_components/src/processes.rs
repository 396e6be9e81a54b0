//! # General Processes
//!
//! Fixed-step processes over the general components. Each takes the step
//! length at construction and must be bound with
//! [`EcpsBuilder::create_process`](ecps_core::EcpsBuilder::create_process).

use ecps_core::Process;

use crate::components::{Components, Lifetime, Transform, Velocity};

/// Moves every entity with a transform and a velocity.
#[must_use]
pub fn movement(components: &Components, dt: f32) -> Process {
    let Components { transform, velocity, .. } = *components;
    Process::new("movement", move |ecps, entity| {
        let Some(v) = ecps.get_in::<Velocity>(entity, velocity).copied() else {
            return;
        };
        if let Some(tf) = ecps.get_in_mut::<Transform>(entity, transform) {
            tf.position[0] += v.linear[0] * dt;
            tf.position[1] += v.linear[1] * dt;
            tf.rotation += v.angular * dt;
        }
    })
    .requires(&[transform, velocity])
}

/// Advances lifetimes and destroys expired entities.
///
/// Destruction goes through the deferred log, so expired entities are
/// still visible to the rest of the pass.
#[must_use]
pub fn lifetime(components: &Components, dt: f32) -> Process {
    let id = components.lifetime;
    Process::new("lifetime", move |ecps, entity| {
        let expired = match ecps.get_in_mut::<Lifetime>(entity, id) {
            Some(lifetime) => {
                lifetime.elapsed += dt;
                lifetime.is_expired()
            }
            None => false,
        };
        if expired {
            tracing::trace!(entity = %entity.id(), "lifetime expired");
            ecps.destroy_entity_in(entity);
        }
    })
    .requires(&[id])
}
