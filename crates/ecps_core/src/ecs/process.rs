//! # Process Executor
//!
//! A process is a component filter plus three hooks:
//!
//! 1. `pre` runs once, before iteration, with immediate mutation
//! 2. the per-entity hook runs for every entity whose archetype contains
//!    the filter; structural mutations it requests are deferred
//! 3. `post` runs once, after iteration, with immediate mutation
//!
//! The deferred log is replayed after `post` returns. Replay does not
//! trigger another pass.
//!
//! ## Ordering
//!
//! Archetypes are visited in creation order and records in storage order.
//! That order changes with structural mutations; the only guarantee is
//! that every matching entity alive at call start is visited exactly once.

use super::archetype::EntityLocation;
use super::component::ComponentId;
use super::flags::ComponentFlags;
use super::world::{Ecps, EntityView};
use crate::error::{EcpsError, EcpsResult};

/// Hook run once per call, before or after iteration.
pub type ProcessHook = Box<dyn FnMut(&mut Ecps)>;

/// Hook run once per matching entity.
pub type EntityHook = Box<dyn FnMut(&mut Ecps, &EntityView)>;

/// A filtered callback over entities.
///
/// Create one with [`Process::new`], then bind it to an instance with
/// [`EcpsBuilder::create_process`](super::world::EcpsBuilder::create_process).
pub struct Process {
    name: String,
    requested: Vec<ComponentId>,
    required: ComponentFlags,
    instance: Option<u32>,
    pre: Option<ProcessHook>,
    per_entity: EntityHook,
    post: Option<ProcessHook>,
}

impl Process {
    /// Creates an unbound process.
    ///
    /// # Arguments
    ///
    /// * `name` - Used in diagnostics
    /// * `per_entity` - Called with the instance and a view of each entity
    #[must_use]
    pub fn new(name: impl Into<String>, per_entity: impl FnMut(&mut Ecps, &EntityView) + 'static) -> Self {
        Self {
            name: name.into(),
            requested: Vec::new(),
            required: ComponentFlags::EMPTY,
            instance: None,
            pre: None,
            per_entity: Box::new(per_entity),
            post: None,
        }
    }

    /// Adds required components to the filter.
    #[must_use]
    pub fn requires(mut self, components: &[ComponentId]) -> Self {
        self.requested.extend_from_slice(components);
        self
    }

    /// Sets the hook run before iteration.
    #[must_use]
    pub fn with_pre(mut self, hook: impl FnMut(&mut Ecps) + 'static) -> Self {
        self.pre = Some(Box::new(hook));
        self
    }

    /// Sets the hook run after iteration.
    #[must_use]
    pub fn with_post(mut self, hook: impl FnMut(&mut Ecps) + 'static) -> Self {
        self.post = Some(Box::new(hook));
        self
    }

    /// Returns the process name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the bound filter, `ID` and `Enabled` included.
    ///
    /// Empty until the process is bound.
    #[inline]
    #[must_use]
    pub fn required(&self) -> &ComponentFlags {
        &self.required
    }

    /// Returns the instance the process is bound to.
    #[inline]
    #[must_use]
    pub fn instance_id(&self) -> Option<u32> {
        self.instance
    }

    pub(crate) fn requested(&self) -> &[ComponentId] {
        &self.requested
    }

    pub(crate) fn bind(&mut self, instance: u32, required: ComponentFlags) {
        self.instance = Some(instance);
        self.required = required;
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("instance", &self.instance)
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .finish_non_exhaustive()
    }
}

impl Ecps {
    /// Runs a process over every matching entity.
    ///
    /// # Returns
    ///
    /// The number of entities visited.
    ///
    /// # Errors
    ///
    /// Fails if the process is bound to another instance (or not bound at
    /// all), or if called from inside another process.
    pub fn run_process(&mut self, process: &mut Process) -> EcpsResult<usize> {
        if process.instance != Some(self.instance_id()) {
            tracing::error!(process = process.name(), instance = self.instance_id(), "process run on a foreign instance");
            return Err(EcpsError::ForeignProcess {
                name: process.name.clone(),
                expected: process.instance.unwrap_or(0),
                actual: self.instance_id(),
            });
        }
        if self.iterating {
            tracing::error!(process = process.name(), "nested process run");
            return Err(EcpsError::ProcessIterating("run_process"));
        }

        if let Some(pre) = process.pre.as_mut() {
            pre(self);
        }

        self.iterating = true;
        let mut visited = 0;
        let archetype_count = self.store().len();
        for archetype in 0..archetype_count {
            let Some(arch) = self.store().archetype(archetype) else {
                break;
            };
            if !process.required.compare_contains(arch.flags()) {
                continue;
            }

            let slots = arch.slot_count();
            let stride = arch.layout().stride();
            for slot in 0..slots {
                let offset = slot * stride;
                let Some(id) = self.store().archetype(archetype).map(|arch| arch.id_at(offset)) else {
                    break;
                };
                if id.is_null() {
                    continue;
                }
                let view = EntityView::new(id, EntityLocation { archetype, offset });
                (process.per_entity)(self, &view);
                visited += 1;
            }
        }
        self.iterating = false;

        if let Some(post) = process.post.as_mut() {
            post(self);
        }

        self.flush_commands();
        tracing::trace!(process = process.name(), visited, "process finished");
        Ok(visited)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::ecs::world::EcpsBuilder;
    use crate::ecs::EntityId;

    #[test]
    fn test_filter_includes_id_and_enabled() {
        let mut builder = EcpsBuilder::new();
        let a = builder.register::<u32>("a").unwrap();
        let process = builder.create_process(Process::new("p", |_, _| {}).requires(&[a])).unwrap();
        assert!(process.required().is_on(ComponentId::ID));
        assert!(process.required().is_on(ComponentId::ENABLED));
        assert!(process.required().is_on(a));
        assert_eq!(process.required().count(), 3);
    }

    #[test]
    fn test_create_process_rejects_unknown_component() {
        let builder = EcpsBuilder::new();
        let result = builder.create_process(Process::new("p", |_, _| {}).requires(&[ComponentId::from_raw(9)]));
        assert!(matches!(result, Err(EcpsError::UnknownComponent(9))));
    }

    #[test]
    fn test_disabled_entities_are_skipped() {
        let mut builder = EcpsBuilder::new();
        let a = builder.register::<u32>("a").unwrap();
        let mut process = builder.create_process(Process::new("p", |_, _| {}).requires(&[a])).unwrap();
        let mut ecps = builder.build();

        let on = ecps.spawn().with(a, &1u32).build().unwrap();
        let off = ecps.spawn().with(a, &2u32).build().unwrap();
        ecps.remove_component(off, ComponentId::ENABLED).unwrap();

        assert_eq!(ecps.run_process(&mut process).unwrap(), 1);
        assert!(ecps.does_exist(on));
    }

    #[test]
    fn test_hooks_run_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut builder = EcpsBuilder::new();
        let (pre_log, each_log, post_log) = (log.clone(), log.clone(), log.clone());
        let mut process = builder
            .create_process(
                Process::new("p", move |ecps, _| {
                    assert!(ecps.is_iterating());
                    each_log.borrow_mut().push("each");
                })
                .with_pre(move |ecps| {
                    assert!(!ecps.is_iterating());
                    pre_log.borrow_mut().push("pre");
                })
                .with_post(move |ecps| {
                    assert!(!ecps.is_iterating());
                    post_log.borrow_mut().push("post");
                }),
            )
            .unwrap();
        let mut ecps = builder.build();
        ecps.create_entity(&[]).unwrap();
        ecps.create_entity(&[]).unwrap();

        ecps.run_process(&mut process).unwrap();
        assert_eq!(*log.borrow(), vec!["pre", "each", "each", "post"]);
    }

    #[test]
    fn test_foreign_process_is_rejected() {
        let builder = EcpsBuilder::new();
        let mut process = builder.create_process(Process::new("p", |_, _| {})).unwrap();
        let mut other = EcpsBuilder::new().build();
        assert!(matches!(other.run_process(&mut process), Err(EcpsError::ForeignProcess { .. })));

        let mut unbound = Process::new("loose", |_, _| {});
        assert!(matches!(other.run_process(&mut unbound), Err(EcpsError::ForeignProcess { .. })));
    }

    #[test]
    fn test_created_during_iteration_is_not_visited() {
        let visited = Rc::new(RefCell::new(Vec::<EntityId>::new()));
        let seen = visited.clone();
        let builder = EcpsBuilder::new();
        let mut process = builder
            .create_process(Process::new("spawner", move |ecps, view| {
                seen.borrow_mut().push(view.id());
                let child = ecps.create_entity(&[]).unwrap();
                assert!(!ecps.does_exist(child));
            }))
            .unwrap();
        let mut ecps = builder.build();
        let root = ecps.create_entity(&[]).unwrap();

        assert_eq!(ecps.run_process(&mut process).unwrap(), 1);
        assert_eq!(*visited.borrow(), vec![root]);
        assert_eq!(ecps.entity_count(), 2);
        assert_eq!(ecps.pending_commands(), 0);
    }

    #[test]
    fn test_run_is_idempotent_on_unchanged_world() {
        let visited = Rc::new(RefCell::new(Vec::<EntityId>::new()));
        let seen = visited.clone();
        let mut builder = EcpsBuilder::new();
        let a = builder.register::<u32>("a").unwrap();
        let b = builder.register::<u8>("b").unwrap();
        let mut process = builder
            .create_process(Process::new("p", move |_, view| seen.borrow_mut().push(view.id())).requires(&[a]))
            .unwrap();
        let mut ecps = builder.build();
        for i in 0..10u32 {
            let e = ecps.spawn().with(a, &i).build().unwrap();
            if i % 3 == 0 {
                ecps.insert(e, b, &1u8).unwrap();
            }
        }
        ecps.create_entity(&[]).unwrap();

        ecps.run_process(&mut process).unwrap();
        let mut first = std::mem::take(&mut *visited.borrow_mut());
        ecps.run_process(&mut process).unwrap();
        let mut second = visited.borrow().clone();
        first.sort();
        second.sort();
        assert_eq!(first.len(), 10);
        assert_eq!(first, second);
    }
}
