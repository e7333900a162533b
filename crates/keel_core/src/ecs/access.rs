// access.rs - Data-access declarations and conflict-free job staging
//
// Stores never lock. Jobs declare which component types they read and write,
// and the schedule only runs jobs side by side when their declarations do
// not overlap on a written type.

use crate::ecs::{ComponentSystem, ComponentTypeId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("job '{name}' is already scheduled")]
    DuplicateName { name: String },

    #[error("job '{name}' does not access any components")]
    EmptyAccess { name: String },

    #[error("jobs '{first}' and '{second}' both touch component type {ty} and at least one writes it")]
    Conflict {
        first: String,
        second: String,
        ty: ComponentTypeId,
    },
}

/// Read/write component sets declared by one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemAccess {
    name: String,
    reads: Vec<ComponentTypeId>,
    writes: Vec<ComponentTypeId>,
}

impl SystemAccess {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Replace the read-only set.
    pub fn reads<I>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = ComponentTypeId>,
    {
        self.reads = sanitize(components);
        self
    }

    /// Replace the write set.
    pub fn writes<I>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = ComponentTypeId>,
    {
        self.writes = sanitize(components);
        self
    }

    /// Add system `S`'s component type to the read set.
    pub fn read<S: ComponentSystem>(mut self) -> Self {
        self.reads.push(ComponentTypeId::of::<S>());
        self.reads = sanitize(std::mem::take(&mut self.reads));
        self
    }

    /// Add system `S`'s component type to the write set.
    pub fn write<S: ComponentSystem>(mut self) -> Self {
        self.writes.push(ComponentTypeId::of::<S>());
        self.writes = sanitize(std::mem::take(&mut self.writes));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read_components(&self) -> &[ComponentTypeId] {
        &self.reads
    }

    pub fn write_components(&self) -> &[ComponentTypeId] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    /// First component type through which `self` and `other` conflict.
    pub fn conflict(&self, other: &SystemAccess) -> Option<ComponentTypeId> {
        let touches = |access: &SystemAccess, ty: &ComponentTypeId| {
            access.writes.binary_search(ty).is_ok() || access.reads.binary_search(ty).is_ok()
        };
        self.writes
            .iter()
            .find(|ty| touches(other, ty))
            .or_else(|| other.writes.iter().find(|ty| touches(self, ty)))
            .copied()
    }

    pub fn conflicts_with(&self, other: &SystemAccess) -> bool {
        self.conflict(other).is_some()
    }
}

fn sanitize<I>(components: I) -> Vec<ComponentTypeId>
where
    I: IntoIterator<Item = ComponentTypeId>,
{
    let mut list: Vec<ComponentTypeId> = components.into_iter().collect();
    list.sort_unstable();
    list.dedup();
    list
}

/// Check that no two declarations in one stage conflict.
pub fn validate_stage<'s, I>(accesses: I) -> Result<(), AccessError>
where
    I: IntoIterator<Item = &'s SystemAccess>,
{
    let accesses: Vec<&SystemAccess> = accesses.into_iter().collect();
    for (i, first) in accesses.iter().enumerate() {
        for second in &accesses[i + 1..] {
            if let Some(ty) = first.conflict(second) {
                return Err(AccessError::Conflict {
                    first: first.name.clone(),
                    second: second.name.clone(),
                    ty,
                });
            }
        }
    }
    Ok(())
}

type Job<'a> = Box<dyn FnOnce() + Send + 'a>;

struct ScheduledJob<'a> {
    access: SystemAccess,
    stage: usize,
    run: Job<'a>,
}

/// One frame's worth of jobs grouped into stages.
///
/// A job lands in the stage after the latest earlier job it conflicts with,
/// so conflicting jobs run in the order they were added and everything else
/// runs as early as possible. Stages run one after another; jobs inside a
/// stage run on the rayon pool.
#[derive(Default)]
pub struct Schedule<'a> {
    jobs: Vec<ScheduledJob<'a>>,
    stage_count: usize,
}

impl<'a> Schedule<'a> {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            stage_count: 0,
        }
    }

    pub fn add<F>(&mut self, access: SystemAccess, job: F) -> Result<usize, AccessError>
    where
        F: FnOnce() + Send + 'a,
    {
        if access.is_empty() {
            return Err(AccessError::EmptyAccess {
                name: access.name.clone(),
            });
        }
        if self.jobs.iter().any(|scheduled| scheduled.access.name == access.name) {
            return Err(AccessError::DuplicateName {
                name: access.name.clone(),
            });
        }
        let stage = self
            .jobs
            .iter()
            .filter(|scheduled| scheduled.access.conflicts_with(&access))
            .map(|scheduled| scheduled.stage + 1)
            .max()
            .unwrap_or(0);
        self.stage_count = self.stage_count.max(stage + 1);
        self.jobs.push(ScheduledJob {
            access,
            stage,
            run: Box::new(job),
        });
        Ok(stage)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// Job names per stage, in add order.
    pub fn stages(&self) -> Vec<Vec<&str>> {
        let mut stages = vec![Vec::new(); self.stage_count];
        for job in &self.jobs {
            stages[job.stage].push(job.access.name());
        }
        stages
    }

    /// Run every job. Returns once the last stage has finished.
    pub fn run(self) {
        let mut stages: Vec<Vec<ScheduledJob<'a>>> =
            (0..self.stage_count).map(|_| Vec::new()).collect();
        for job in self.jobs {
            stages[job.stage].push(job);
        }

        for (index, stage) in stages.into_iter().enumerate() {
            debug_assert!(validate_stage(stage.iter().map(|job| &job.access)).is_ok());
            tracing::trace!(stage = index, jobs = stage.len(), "running schedule stage");
            if stage.len() == 1 {
                for job in stage {
                    (job.run)();
                }
                continue;
            }
            rayon::scope(|scope| {
                for job in stage {
                    scope.spawn(move |_| (job.run)());
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{DataComponentSystem, TransformSystem};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Positions = DataComponentSystem<[f32; 3]>;
    type Velocities = DataComponentSystem<(f32, f32, f32)>;
    type Names = DataComponentSystem<String>;

    #[test]
    fn readers_share_writers_conflict() {
        let reader_a = SystemAccess::new("a").read::<Positions>();
        let reader_b = SystemAccess::new("b").read::<Positions>();
        let writer = SystemAccess::new("w").write::<Positions>();
        let other = SystemAccess::new("o").write::<Names>();

        assert!(!reader_a.conflicts_with(&reader_b));
        assert_eq!(
            reader_a.conflict(&writer),
            Some(ComponentTypeId::of::<Positions>())
        );
        assert!(writer.conflicts_with(&reader_b));
        assert!(!writer.conflicts_with(&other));
    }

    #[test]
    fn declarations_are_sorted_and_deduped() {
        let ty = ComponentTypeId::of::<Names>();
        let access = SystemAccess::new("x").reads([ty, ty]).write::<TransformSystem>();
        assert_eq!(access.read_components(), &[ty]);
        assert_eq!(access.write_components().len(), 1);
    }

    #[test]
    fn validate_stage_reports_conflict() {
        let a = SystemAccess::new("a").write::<Names>();
        let b = SystemAccess::new("b").read::<Names>();
        let c = SystemAccess::new("c").read::<TransformSystem>();
        assert_eq!(validate_stage([&a, &c]), Ok(()));
        assert!(matches!(
            validate_stage([&a, &b, &c]),
            Err(AccessError::Conflict { ref first, ref second, .. })
                if first == "a" && second == "b"
        ));
    }

    #[test]
    fn staging_preserves_conflict_order() {
        let mut schedule = Schedule::new();
        let noop = || {};
        assert_eq!(schedule.add(SystemAccess::new("integrate").write::<Positions>(), noop), Ok(0));
        assert_eq!(schedule.add(SystemAccess::new("names").write::<Names>(), noop), Ok(0));
        assert_eq!(schedule.add(SystemAccess::new("render").read::<Positions>(), noop), Ok(1));
        assert_eq!(schedule.add(SystemAccess::new("label").read::<Names>(), noop), Ok(1));
        assert_eq!(
            schedule.add(SystemAccess::new("transforms").write::<TransformSystem>(), noop),
            Ok(0)
        );
        assert_eq!(schedule.add(SystemAccess::new("teleport").write::<Positions>(), noop), Ok(2));

        assert_eq!(
            schedule.stages(),
            vec![
                vec!["integrate", "names", "transforms"],
                vec!["render", "label"],
                vec!["teleport"],
            ]
        );
    }

    #[test]
    fn rejects_empty_and_duplicate_jobs() {
        let mut schedule = Schedule::new();
        assert!(matches!(
            schedule.add(SystemAccess::new("idle"), || {}),
            Err(AccessError::EmptyAccess { .. })
        ));
        schedule
            .add(SystemAccess::new("job").read::<Names>(), || {})
            .unwrap();
        assert!(matches!(
            schedule.add(SystemAccess::new("job").read::<Names>(), || {}),
            Err(AccessError::DuplicateName { .. })
        ));
        assert_eq!(schedule.len(), 1);
    }

    #[test]
    fn run_executes_every_job_on_disjoint_stores() {
        let mut positions = Positions::new();
        let mut names = Names::new();
        let entity = crate::ecs::Entity::INVALID;
        for _ in 0..64 {
            positions.create(entity);
            names.create(entity);
        }
        let ran = AtomicUsize::new(0);

        {
            let mut schedule = Schedule::new();
            let ran = &ran;
            let positions = &mut positions;
            let names = &mut names;
            schedule
                .add(SystemAccess::new("move").write::<Positions>(), move || {
                    for p in positions.values_mut() {
                        p[0] += 1.0;
                    }
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            schedule
                .add(SystemAccess::new("rename").write::<Names>(), move || {
                    for n in names.values_mut() {
                        n.push('x');
                    }
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            schedule
                .add(SystemAccess::new("count").read::<Velocities>(), move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            assert_eq!(schedule.stage_count(), 1);
            schedule.run();
        }

        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert!(positions.iter().all(|(_, p)| p[0] == 1.0));
        assert!(names.iter().all(|(_, n)| n == "x"));
    }
}
