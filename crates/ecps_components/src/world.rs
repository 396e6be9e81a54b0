//! # Default World
//!
//! One ECPS instance with the general components registered, the general
//! processes scheduled, and room for game-specific extensions.

use std::path::Path;

use ecps_core::{load_snapshot, save_snapshot, Ecps, EcpsBuilder, EcpsConfig, EntityId, Process};

use crate::components::{Components, ResourceNames};
use crate::error::ComponentsResult;
use crate::processes;
use crate::schedule::{Phase, Schedule};

/// Fixed simulation step used when none is given.
pub const DEFAULT_PHYSICS_DT: f32 = 1.0 / 60.0;

/// A process produced by a world extension, with its placement.
pub type ScheduledProcess = (Phase, i8, Process);

/// Ready-to-run world.
///
/// ```rust,ignore
/// let mut world = DefaultWorld::new(EcpsConfig::default())?;
/// let player = world.ecps_mut().spawn().with(world.components().transform, &Transform::default()).build()?;
/// world.run_frame()?;
/// ```
#[derive(Debug)]
pub struct DefaultWorld {
    ecps: Ecps,
    components: Components,
    names: ResourceNames,
    schedule: Schedule,
}

impl DefaultWorld {
    /// Builds a world with the general components and processes only.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration.
    pub fn new(config: EcpsConfig) -> ComponentsResult<Self> {
        Self::with_extension(config, DEFAULT_PHYSICS_DT, |_, _| Ok(Vec::new()))
    }

    /// Builds a world and lets `extend` register extra component types and
    /// processes before the registry is sealed.
    ///
    /// # Arguments
    ///
    /// * `config` - Instance sizing
    /// * `physics_dt` - Step length of the physics-tick processes
    /// * `extend` - Registers extra types; returns extra processes, bound
    ///   through the builder it was given
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, a registration error, or an error
    /// returned by `extend`.
    pub fn with_extension(
        config: EcpsConfig,
        physics_dt: f32,
        extend: impl FnOnce(&mut EcpsBuilder, &Components) -> ComponentsResult<Vec<ScheduledProcess>>,
    ) -> ComponentsResult<Self> {
        config.validate()?;
        let names = ResourceNames::new();
        let mut builder = EcpsBuilder::new().with_config(config);
        let components = Components::register(&mut builder, &names)?;

        let mut schedule = Schedule::new();
        schedule.add(Phase::PhysicsTick, 0, builder.create_process(processes::movement(&components, physics_dt))?);
        schedule.add(Phase::PhysicsTick, 0, builder.create_process(processes::lifetime(&components, physics_dt))?);
        for (phase, priority, process) in extend(&mut builder, &components)? {
            schedule.add(phase, priority, process);
        }

        let ecps = builder.build();
        tracing::info!(instance = ecps.instance_id(), ?schedule, "default world ready");
        Ok(Self {
            ecps,
            components,
            names,
            schedule,
        })
    }

    /// The instance.
    #[inline]
    #[must_use]
    pub fn ecps(&self) -> &Ecps {
        &self.ecps
    }

    /// The instance, mutably.
    #[inline]
    pub fn ecps_mut(&mut self) -> &mut Ecps {
        &mut self.ecps
    }

    /// IDs of the general components.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Resource names shared with the sprite hooks.
    #[inline]
    #[must_use]
    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    /// The phase schedule.
    #[inline]
    pub fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    /// Runs one phase.
    ///
    /// # Errors
    ///
    /// See [`Schedule::run_phase`].
    pub fn run_phase(&mut self, phase: Phase) -> ComponentsResult<usize> {
        Ok(self.schedule.run_phase(phase, &mut self.ecps)?)
    }

    /// Runs every phase in frame order.
    ///
    /// # Errors
    ///
    /// See [`Schedule::run_frame`].
    pub fn run_frame(&mut self) -> ComponentsResult<usize> {
        Ok(self.schedule.run_frame(&mut self.ecps)?)
    }

    /// Saves every live entity to a file.
    ///
    /// # Errors
    ///
    /// Fails if a serialize hook or the file write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> ComponentsResult<()> {
        let snapshot = self.ecps.generate_snapshot()?;
        save_snapshot(path, &snapshot)?;
        Ok(())
    }

    /// Loads a file saved with [`DefaultWorld::save`] and restores it next
    /// to the current entities.
    ///
    /// # Returns
    ///
    /// The restored entities, in saved order.
    ///
    /// # Errors
    ///
    /// Fails on I/O or decode errors, or if the restore is rejected. A
    /// rejected restore leaves no entity behind.
    pub fn load(&mut self, path: impl AsRef<Path>) -> ComponentsResult<Vec<EntityId>> {
        let mut snapshot = load_snapshot(path)?;
        Ok(self.ecps.restore_snapshot(&mut snapshot)?)
    }

    /// Destroys every entity, releasing their resources.
    ///
    /// # Errors
    ///
    /// Not allowed while a process is iterating.
    pub fn clear(&mut self) -> ComponentsResult<()> {
        Ok(self.ecps.destroy_all_entities()?)
    }
}
