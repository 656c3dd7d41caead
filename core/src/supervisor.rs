//! Bounded background pool
//!
//! Runs up to `N` fire-and-forget tasks next to the primary scheduler/FSM
//! flow. Every occupied slot is stepped once per tick and a finished task
//! leaves its slot on the same tick. A full pool rejects new work instead of
//! blocking or evicting: memory for background tasks is fixed at compile
//! time.

use heapless::Vec;

use crate::task::{Task, TaskCell};

/// Fixed-capacity pool of running tasks
#[derive(Debug)]
pub struct Supervisor<T, const N: usize> {
    name: &'static str,
    slots: Vec<TaskCell<T>, N>,
}

impl<T, const N: usize> Supervisor<T, N> {
    /// Empty pool named `name` for diagnostics
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Vec::new(),
        }
    }

    /// Begin `task` in the first free slot.
    ///
    /// When every slot is busy the task is handed back untouched and the
    /// running tasks are left alone.
    pub fn append<Cx: ?Sized>(&mut self, task: T, cx: &mut Cx) -> Result<(), T>
    where
        T: Task<Cx>,
    {
        if self.slots.is_full() {
            warn!("{}: full, dropping {}", self.name, task.name());
            return Err(task);
        }

        let mut cell = TaskCell::new(task);
        let _ = cell.begin(cx);
        debug!("{}: appended {}", self.name, cell.task().name());
        self.slots.push(cell).map_err(TaskCell::into_inner)
    }

    /// Step every running task once and drop the ones that finished
    pub fn tick<Cx: ?Sized>(&mut self, now: u32, cx: &mut Cx)
    where
        T: Task<Cx>,
    {
        let mut index = 0;
        while index < self.slots.len() {
            let cell = &mut self.slots[index];
            let _ = cell.poll(now, cx);
            if cell.is_running() {
                index += 1;
            } else {
                let finished = self.slots.remove(index);
                debug!("{}: {} finished", self.name, finished.task().name());
            }
        }
    }

    /// Running tasks, in slot order
    pub fn tasks(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().map(TaskCell::task)
    }

    /// Number of running tasks
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Nothing running
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every slot busy
    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    /// Number of slots
    pub const fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::task::TaskEval;

    #[derive(Default)]
    struct Cx {
        steps: u32,
    }

    #[derive(Debug, PartialEq)]
    struct Job {
        id: u8,
        left: u8,
        fail: bool,
    }

    impl Job {
        fn new(id: u8, left: u8) -> Self {
            Self {
                id,
                left,
                fail: false,
            }
        }
    }

    impl Task<Cx> for Job {
        fn name(&self) -> &'static str {
            "Job"
        }

        fn step(&mut self, cx: &mut Cx) -> TaskEval {
            cx.steps += 1;
            if self.fail {
                return TaskEval::error(TaskError::Hardware);
            }
            self.left -= 1;
            if self.left == 0 {
                TaskEval::done()
            } else {
                TaskEval::running()
            }
        }
    }

    #[test]
    fn test_append_never_exceeds_capacity() {
        let mut cx = Cx::default();
        let mut pool: Supervisor<Job, 5> = Supervisor::new("Background");
        for id in 0..5 {
            assert!(pool.append(Job::new(id, 10), &mut cx).is_ok());
        }
        assert!(pool.is_full());

        let rejected = pool.append(Job::new(99, 1), &mut cx);
        assert_eq!(rejected, Err(Job::new(99, 1)));
        assert_eq!(pool.len(), 5);
        let ids: heapless::Vec<u8, 5> = pool.tasks().map(|job| job.id).collect();
        assert_eq!(ids.as_slice(), &[0, 1, 2, 3, 4]);
        assert!(pool.tasks().all(|job| job.left == 10));
    }

    #[test]
    fn test_done_tasks_leave_on_the_same_tick() {
        let mut cx = Cx::default();
        let mut pool: Supervisor<Job, 5> = Supervisor::new("Background");
        pool.append(Job::new(1, 1), &mut cx).unwrap();
        pool.append(Job::new(2, 2), &mut cx).unwrap();
        pool.append(Job::new(3, 1), &mut cx).unwrap();

        pool.tick(0, &mut cx);
        assert_eq!(cx.steps, 3, "every slot is stepped once");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.tasks().next().map(|job| job.id), Some(2));

        pool.tick(1, &mut cx);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_failed_tasks_are_removed() {
        let mut cx = Cx::default();
        let mut pool: Supervisor<Job, 2> = Supervisor::new("Servicing");
        let mut job = Job::new(1, 5);
        job.fail = true;
        pool.append(job, &mut cx).unwrap();

        pool.tick(0, &mut cx);
        assert!(pool.is_empty());
        assert_eq!(pool.capacity(), 2);
    }
}
