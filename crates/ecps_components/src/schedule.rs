//! # Phase Schedule
//!
//! Frame phases, each with its own prioritized process list. A process is
//! inserted after every process of higher or equal priority, so higher
//! priorities run first and equal priorities keep insertion order.

use ecps_core::{Ecps, EcpsResult, Process};

/// Frame phases, in the order [`Schedule::run_frame`] runs them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Game logic, once per frame.
    Process,
    /// Fixed-step simulation.
    PhysicsTick,
    /// Immediate-mode drawing.
    Draw,
    /// Render submission.
    Render,
    /// End-of-frame cleanup.
    Cleanup,
}

impl Phase {
    /// Every phase, in frame order.
    pub const ALL: [Phase; 5] = [Phase::Process, Phase::PhysicsTick, Phase::Draw, Phase::Render, Phase::Cleanup];

    const fn index(self) -> usize {
        self as usize
    }
}

struct Scheduled {
    priority: i8,
    process: Process,
}

/// Owns the processes of every phase.
#[derive(Default)]
pub struct Schedule {
    phases: [Vec<Scheduled>; 5],
}

impl Schedule {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bound process to a phase.
    pub fn add(&mut self, phase: Phase, priority: i8, process: Process) {
        let list = &mut self.phases[phase.index()];
        let at = list.partition_point(|scheduled| scheduled.priority >= priority);
        tracing::debug!(?phase, process = process.name(), priority, position = at, "process scheduled");
        list.insert(at, Scheduled { priority, process });
    }

    /// Removes the first process with `name` from a phase.
    pub fn remove(&mut self, phase: Phase, name: &str) -> Option<Process> {
        let list = &mut self.phases[phase.index()];
        let at = list.iter().position(|scheduled| scheduled.process.name() == name)?;
        Some(list.remove(at).process)
    }

    /// Process names of a phase, in run order.
    #[must_use]
    pub fn names(&self, phase: Phase) -> Vec<&str> {
        self.phases[phase.index()]
            .iter()
            .map(|scheduled| scheduled.process.name())
            .collect()
    }

    /// Number of processes in a phase.
    #[must_use]
    pub fn len(&self, phase: Phase) -> usize {
        self.phases[phase.index()].len()
    }

    /// Checks if no phase has a process.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.iter().all(Vec::is_empty)
    }

    /// Runs every process of a phase in order.
    ///
    /// # Returns
    ///
    /// Total number of entity visits.
    ///
    /// # Errors
    ///
    /// Stops at the first process that fails to run.
    pub fn run_phase(&mut self, phase: Phase, ecps: &mut Ecps) -> EcpsResult<usize> {
        let mut visited = 0;
        for scheduled in &mut self.phases[phase.index()] {
            visited += ecps.run_process(&mut scheduled.process)?;
        }
        Ok(visited)
    }

    /// Runs every phase in frame order.
    ///
    /// # Errors
    ///
    /// See [`Schedule::run_phase`].
    pub fn run_frame(&mut self, ecps: &mut Ecps) -> EcpsResult<usize> {
        let mut visited = 0;
        for phase in Phase::ALL {
            visited += self.run_phase(phase, ecps)?;
        }
        Ok(visited)
    }
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for phase in Phase::ALL {
            map.entry(&phase, &self.names(phase));
        }
        map.finish()
    }
}
