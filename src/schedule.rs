//! Phase scheduler with dependency-ordered execution.
//!
//! Systems are grouped into six fixed phases: three startup phases that run
//! once and three update phases that run every tick. Within a phase,
//! execution order is a topological sort of the declared before/after
//! constraints, with ties broken by registration order. The world's
//! deferred buffers are flushed once at every phase boundary, so structural
//! changes issued in one phase become visible exactly at the next.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::error::{EcsError, Result};
use crate::system::SystemContext;
use crate::world::World;

/// Lifecycle bucket a system executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreStartup,
    Startup,
    PostStartup,
    PreUpdate,
    Update,
    PostUpdate,
}

impl Phase {
    /// Startup phases in execution order.
    pub const STARTUP: [Phase; 3] = [Phase::PreStartup, Phase::Startup, Phase::PostStartup];
    /// Update phases in execution order.
    pub const UPDATE: [Phase; 3] = [Phase::PreUpdate, Phase::Update, Phase::PostUpdate];

    const fn index(self) -> usize {
        match self {
            Phase::PreStartup => 0,
            Phase::Startup => 1,
            Phase::PostStartup => 2,
            Phase::PreUpdate => 3,
            Phase::Update => 4,
            Phase::PostUpdate => 5,
        }
    }
}

/// Boxed system function: receives the context and the tick's delta time.
pub type SystemFn = Box<dyn FnMut(&mut SystemContext<'_>, f64) -> Result<()>>;

/// Optional lifecycle hook invoked when a system is (un)registered.
pub type LifecycleHook = Box<dyn FnMut()>;

/// Tagged record describing one system.
pub struct SystemDescriptor {
    name: String,
    run: SystemFn,
    before: Vec<String>,
    after: Vec<String>,
    on_added: Option<LifecycleHook>,
    on_removed: Option<LifecycleHook>,
}

impl SystemDescriptor {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: FnMut(&mut SystemContext<'_>, f64) -> Result<()> + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(run),
            before: Vec::new(),
            after: Vec::new(),
            on_added: None,
            on_removed: None,
        }
    }

    /// Constrain this system to run before the named one.
    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.before.push(name.into());
        self
    }

    /// Constrain this system to run after the named one.
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.after.push(name.into());
        self
    }

    pub fn on_added<F: FnMut() + 'static>(mut self, hook: F) -> Self {
        self.on_added = Some(Box::new(hook));
        self
    }

    pub fn on_removed<F: FnMut() + 'static>(mut self, hook: F) -> Self {
        self.on_removed = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

struct SystemNode {
    descriptor: SystemDescriptor,
    /// Global registration index; the topological tiebreak key.
    order: u64,
}

#[derive(Default)]
struct PhaseSystems {
    systems: Vec<SystemNode>,
    /// Cached topological order (indices into `systems`); None when dirty.
    sorted: Option<Vec<usize>>,
}

/// Six-phase system scheduler.
pub struct Scheduler {
    phases: [PhaseSystems; 6],
    /// Global name lookup for duplicate detection and removal.
    names: FxHashMap<String, Phase>,
    next_order: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            phases: Default::default(),
            names: FxHashMap::default(),
            next_order: 0,
        }
    }

    /// Register one system in a phase.
    ///
    /// Fails with `DuplicateSystem` if the name is taken in any phase.
    pub fn add_system(&mut self, phase: Phase, mut descriptor: SystemDescriptor) -> Result<()> {
        if self.names.contains_key(descriptor.name()) {
            return Err(EcsError::DuplicateSystem(descriptor.name().to_string()));
        }
        self.names.insert(descriptor.name().to_string(), phase);

        if let Some(hook) = descriptor.on_added.as_mut() {
            hook();
        }

        let slot = &mut self.phases[phase.index()];
        slot.systems.push(SystemNode {
            descriptor,
            order: self.next_order,
        });
        self.next_order += 1;
        slot.sorted = None;
        Ok(())
    }

    /// Register several systems in a phase.
    pub fn add_systems(
        &mut self,
        phase: Phase,
        descriptors: impl IntoIterator<Item = SystemDescriptor>,
    ) -> Result<()> {
        for descriptor in descriptors {
            self.add_system(phase, descriptor)?;
        }
        Ok(())
    }

    /// Unregister a system by name.
    pub fn remove_system(&mut self, name: &str) -> Result<()> {
        let phase = self.names.remove(name).ok_or(EcsError::SystemNotFound)?;
        let slot = &mut self.phases[phase.index()];
        let index = slot
            .systems
            .iter()
            .position(|node| node.descriptor.name() == name)
            .ok_or(EcsError::SystemNotFound)?;
        let mut node = slot.systems.remove(index);
        if let Some(hook) = node.descriptor.on_removed.as_mut() {
            hook();
        }
        slot.sorted = None;
        Ok(())
    }

    pub fn has_system(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// All registered system names, phase by phase in registration order.
    pub fn system_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.names.len());
        for slot in &self.phases {
            for node in &slot.systems {
                names.push(node.descriptor.name().to_string());
            }
        }
        names
    }

    pub fn system_count(&self) -> usize {
        self.names.len()
    }

    /// Remove every system, firing their removal hooks.
    pub fn clear(&mut self) {
        for slot in &mut self.phases {
            for node in &mut slot.systems {
                if let Some(hook) = node.descriptor.on_removed.as_mut() {
                    hook();
                }
            }
            slot.systems.clear();
            slot.sorted = None;
        }
        self.names.clear();
    }

    /// Run the three startup phases once, in order.
    ///
    /// Every covered phase is sorted before any system executes, so a
    /// dependency cycle anywhere surfaces here, not mid-run.
    pub fn run_startup(&mut self, world: &mut World) -> Result<()> {
        for phase in Phase::STARTUP {
            self.sort_phase(phase)?;
        }
        for phase in Phase::STARTUP {
            self.run_phase(phase, world, 0.0)?;
        }
        Ok(())
    }

    /// Run the three update phases for one tick.
    pub fn run_update(&mut self, world: &mut World, dt: f64) -> Result<()> {
        for phase in Phase::UPDATE {
            self.sort_phase(phase)?;
        }
        for phase in Phase::UPDATE {
            self.run_phase(phase, world, dt)?;
        }
        Ok(())
    }

    /// Topologically sort one phase (Kahn's algorithm) and cache the order.
    ///
    /// Ready nodes are drained from a min-heap keyed by registration index,
    /// which makes unconstrained order deterministic. Constraints naming
    /// systems absent from the phase are skipped.
    fn sort_phase(&mut self, phase: Phase) -> Result<()> {
        let slot = &mut self.phases[phase.index()];
        if slot.sorted.is_some() {
            return Ok(());
        }

        let count = slot.systems.len();
        let mut by_name: FxHashMap<&str, usize> = FxHashMap::default();
        for (i, node) in slot.systems.iter().enumerate() {
            by_name.insert(node.descriptor.name(), i);
        }

        // A before B => edge A -> B; A after X => edge X -> A
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut in_degree = vec![0usize; count];
        for (i, node) in slot.systems.iter().enumerate() {
            for name in &node.descriptor.before {
                if let Some(&j) = by_name.get(name.as_str()) {
                    edges[i].push(j);
                    in_degree[j] += 1;
                }
            }
            for name in &node.descriptor.after {
                if let Some(&j) = by_name.get(name.as_str()) {
                    edges[j].push(i);
                    in_degree[i] += 1;
                }
            }
        }

        let mut heap = BinaryHeap::with_capacity(count);
        for (i, node) in slot.systems.iter().enumerate() {
            if in_degree[i] == 0 {
                heap.push(Reverse((node.order, i)));
            }
        }

        let mut result = Vec::with_capacity(count);
        while let Some(Reverse((_, i))) = heap.pop() {
            result.push(i);
            for &j in &edges[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    heap.push(Reverse((slot.systems[j].order, j)));
                }
            }
        }

        if result.len() != count {
            return Err(EcsError::SystemCycleDetected);
        }

        slot.sorted = Some(result);
        Ok(())
    }

    fn run_phase(&mut self, phase: Phase, world: &mut World, dt: f64) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!(
            "schedule.run_phase",
            phase = ?phase,
            systems = self.phases[phase.index()].systems.len()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let index = phase.index();
        let Some(order) = self.phases[index].sorted.clone() else {
            return Ok(());
        };
        for node_index in order {
            let node = &mut self.phases[index].systems[node_index];
            let mut ctx = SystemContext::new(world);
            (node.descriptor.run)(&mut ctx, dt)?;
        }

        // Phase boundary: structural changes queued above become visible to
        // the next phase
        world.flush()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn logging_system(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> SystemDescriptor {
        let log = Rc::clone(log);
        SystemDescriptor::new(name, move |_, _| {
            log.borrow_mut().push(name);
            Ok(())
        })
    }

    #[test]
    fn test_insertion_order_is_default_order() -> Result<()> {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.add_system(Phase::Update, logging_system(&log, "first"))?;
        scheduler.add_system(Phase::Update, logging_system(&log, "second"))?;
        scheduler.add_system(Phase::Update, logging_system(&log, "third"))?;

        scheduler.run_update(&mut world, 0.016)?;
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
        Ok(())
    }

    #[test]
    fn test_before_after_constraints() -> Result<()> {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.add_system(Phase::Update, logging_system(&log, "render"))?;
        scheduler.add_system(Phase::Update, logging_system(&log, "physics").before("render"))?;
        scheduler.add_system(Phase::Update, logging_system(&log, "input").before("physics"))?;
        scheduler.add_system(Phase::Update, logging_system(&log, "audio").after("render"))?;

        scheduler.run_update(&mut world, 0.016)?;
        assert_eq!(*log.borrow(), vec!["input", "physics", "render", "audio"]);
        Ok(())
    }

    #[test]
    fn test_phases_run_in_fixed_order() -> Result<()> {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.add_system(Phase::PostUpdate, logging_system(&log, "post"))?;
        scheduler.add_system(Phase::PreUpdate, logging_system(&log, "pre"))?;
        scheduler.add_system(Phase::Update, logging_system(&log, "update"))?;
        scheduler.add_system(Phase::Startup, logging_system(&log, "startup"))?;
        scheduler.add_system(Phase::PreStartup, logging_system(&log, "pre_startup"))?;

        scheduler.run_startup(&mut world)?;
        scheduler.run_update(&mut world, 0.016)?;
        assert_eq!(
            *log.borrow(),
            vec!["pre_startup", "startup", "pre", "update", "post"]
        );
        Ok(())
    }

    #[test]
    fn test_cycle_detected_at_sort_time() -> Result<()> {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.add_system(Phase::Update, logging_system(&log, "a").after("b"))?;
        scheduler.add_system(Phase::Update, logging_system(&log, "b").after("a"))?;

        assert_eq!(
            scheduler.run_update(&mut world, 0.016),
            Err(EcsError::SystemCycleDetected)
        );
        // No system function ran
        assert!(log.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_system_rejected() -> Result<()> {
        let mut scheduler = Scheduler::new();
        scheduler.add_system(Phase::Update, SystemDescriptor::new("mover", |_, _| Ok(())))?;
        let result = scheduler.add_system(
            Phase::PostUpdate,
            SystemDescriptor::new("mover", |_, _| Ok(())),
        );
        assert_eq!(result, Err(EcsError::DuplicateSystem("mover".to_string())));
        Ok(())
    }

    #[test]
    fn test_remove_system() -> Result<()> {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.add_system(Phase::Update, logging_system(&log, "keep"))?;
        scheduler.add_system(Phase::Update, logging_system(&log, "drop"))?;
        assert!(scheduler.has_system("drop"));

        scheduler.remove_system("drop")?;
        assert!(!scheduler.has_system("drop"));
        assert_eq!(scheduler.remove_system("drop"), Err(EcsError::SystemNotFound));

        scheduler.run_update(&mut world, 0.016)?;
        assert_eq!(*log.borrow(), vec!["keep"]);
        Ok(())
    }

    #[test]
    fn test_sort_cache_invalidated_by_add() -> Result<()> {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.add_system(Phase::Update, logging_system(&log, "late"))?;
        scheduler.run_update(&mut world, 0.016)?;

        // New constrained system must be re-sorted in
        scheduler.add_system(Phase::Update, logging_system(&log, "early").before("late"))?;
        log.borrow_mut().clear();
        scheduler.run_update(&mut world, 0.016)?;
        assert_eq!(*log.borrow(), vec!["early", "late"]);
        Ok(())
    }

    #[test]
    fn test_lifecycle_hooks() -> Result<()> {
        let mut scheduler = Scheduler::new();
        let added = Rc::new(RefCell::new(0));
        let removed = Rc::new(RefCell::new(0));

        let (a, r) = (Rc::clone(&added), Rc::clone(&removed));
        scheduler.add_system(
            Phase::Update,
            SystemDescriptor::new("hooked", |_, _| Ok(()))
                .on_added(move || *a.borrow_mut() += 1)
                .on_removed(move || *r.borrow_mut() += 1),
        )?;
        assert_eq!(*added.borrow(), 1);

        scheduler.remove_system("hooked")?;
        assert_eq!(*removed.borrow(), 1);
        Ok(())
    }

    #[test]
    fn test_system_names_and_clear() -> Result<()> {
        let mut scheduler = Scheduler::new();
        scheduler.add_system(Phase::Update, SystemDescriptor::new("b", |_, _| Ok(())))?;
        scheduler.add_system(Phase::PreUpdate, SystemDescriptor::new("a", |_, _| Ok(())))?;

        // Phase order first, registration order within a phase
        assert_eq!(scheduler.system_names(), vec!["a", "b"]);
        assert_eq!(scheduler.system_count(), 2);

        scheduler.clear();
        assert_eq!(scheduler.system_count(), 0);
        assert!(!scheduler.has_system("a"));
        Ok(())
    }
}
