//! Scheduler state: the tick table, the task table, the unroll planner, and
//! the slot placer's cost function.

use crate::task::Task;
use thiserror::Error;

/// Per-tick slot capacity (§5 default). A tick whose handler would need more
/// slots than this fails with [`PlacementError::TooManySlotsInTick`].
const MAX_SLOTS_PER_TICK: usize = 32;

/// Above this, the runtime divider counter (an 8-bit free-running counter)
/// would wrap before completing a cycle.
const MAX_DIVIDER: u32 = 256;

const OVERFLOW_COST: f64 = 99999.0;
const CLUSTER_BONUS: f64 = -1.0;

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("period {period} for task '{name}' is not a power of two")]
    NonPowerOfTwoPeriod { name: String, period: u32 },

    #[error("task '{name}' has length {length} >= its period {period}")]
    LengthExceedsPeriod {
        name: String,
        length: f64,
        period: u32,
    },

    #[error("too many tasks scheduled into tick {tick}; raise MAX_SLOTS_PER_TICK and rebuild")]
    TooManySlotsInTick { tick: u32 },

    #[error("period {period} requires a divider of {divider}, but the runtime divider counter is only 8 bits wide")]
    DividerOverflow { period: u32, divider: u32 },
}

/// One call-site of a task inside one tick handler.
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub divider: u32,
    pub task_index: usize,
}

/// One unrolled copy of the interrupt handler.
#[derive(Debug, Clone, Default)]
pub struct Tick {
    pub slots: Vec<Slot>,
    pub length: f64,
}

/// The whole scheduler state.
pub struct Schedule {
    pub tasks: Vec<Task>,
    pub ticks: Vec<Tick>,
    pub n_ticks: u32,
    pub max_ticks: u32,
    pub max_divider: u32,
}

impl Schedule {
    pub fn new(max_ticks: u32) -> Self {
        Self {
            tasks: Vec::new(),
            ticks: vec![Tick::default()],
            n_ticks: 1,
            max_ticks,
            max_divider: 1,
        }
    }

    /// Add a task to the schedule, placing its slots.
    ///
    /// Returns the new task's index into [`Schedule::tasks`].
    pub fn insert_task(
        &mut self,
        name: String,
        period: u32,
        length: f64,
        already_unrolled_count: u32,
    ) -> Result<usize, PlacementError> {
        if period == 0 || (period & (period - 1)) != 0 {
            return Err(PlacementError::NonPowerOfTwoPeriod { name, period });
        }
        if length >= period as f64 {
            return Err(PlacementError::LengthExceedsPeriod {
                name,
                length,
                period,
            });
        }

        // The tick table grows every time a task's period outgrows its
        // current width, to the smallest power of two that accommodates the
        // period, capped at `max_ticks`. Growth only appends new, empty
        // ticks at the end, so slots already placed at existing indices by
        // earlier tasks are never invalidated or moved; each task's own
        // slot count and divider are fixed by `n_ticks` as of its own
        // insertion, per the append-only lifecycle. Once `n_ticks` reaches
        // `max_ticks`, no further growth is possible and any still-larger
        // period falls back to a runtime divider below.
        if period > self.n_ticks && self.n_ticks < self.max_ticks {
            let target = period.next_power_of_two().min(self.max_ticks);
            if target > self.n_ticks {
                self.expand_to(target);
            }
        }

        let (count, divider) = if period <= self.n_ticks {
            (self.n_ticks / period, 1)
        } else {
            let divider = (period / self.n_ticks).max(1);
            if divider > self.max_divider {
                self.max_divider = divider;
                if self.max_divider >= MAX_DIVIDER {
                    return Err(PlacementError::DividerOverflow { period, divider });
                }
            }
            (1, divider)
        };

        let task_index = self.tasks.len();
        self.tasks.push(Task {
            name,
            period,
            length,
            already_unrolled_count,
            n_slots: 0,
        });

        let base = self.find_best_tick(period, count, length);

        let mut pos = base;
        for _ in 0..count {
            self.alloc_slot(pos, divider, task_index, length)?;
            self.tasks[task_index].n_slots += 1;
            pos = (pos + period) % self.n_ticks;
        }

        Ok(task_index)
    }

    fn expand_to(&mut self, target: u32) {
        self.ticks.resize(target as usize, Tick::default());
        self.n_ticks = target;
    }

    fn alloc_slot(
        &mut self,
        tick_index: u32,
        divider: u32,
        task_index: usize,
        length: f64,
    ) -> Result<(), PlacementError> {
        let tick = &mut self.ticks[tick_index as usize];
        if tick.slots.len() == MAX_SLOTS_PER_TICK {
            return Err(PlacementError::TooManySlotsInTick { tick: tick_index });
        }
        tick.slots.push(Slot {
            divider,
            task_index,
        });
        tick.length += length / divider as f64;
        Ok(())
    }

    /// Classic first-fit-decreasing-style bin packing over a ring of
    /// `n_ticks` buckets at stride `n_ticks / count`, with an affinity bias
    /// that clusters divider-guarded slots into the last eligible bucket.
    fn find_best_tick(&self, period: u32, count: u32, length: f64) -> u32 {
        debug_assert_eq!(
            self.n_ticks % count,
            0,
            "n_ticks must be evenly divisible by count"
        );
        let num_candidates = self.n_ticks / count;
        let mut best = 0;
        let mut best_cost = f64::INFINITY;

        for candidate in 0..num_candidates {
            let mut total = 0.0;
            for k in 0..count {
                let idx = (candidate + num_candidates * k) as usize;
                let existing = self.ticks[idx].length;
                let cost = if existing + length >= 1.0 {
                    OVERFLOW_COST
                } else if period > self.n_ticks && candidate == num_candidates - 1 {
                    CLUSTER_BONUS
                } else {
                    existing
                };
                total += cost;
            }
            if total < best_cost {
                best_cost = total;
                best = candidate;
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_a_single_fast_task() {
        let mut sched = Schedule::new(4);
        sched.insert_task("scan".into(), 1, 0.1, 0).unwrap();
        assert_eq!(sched.n_ticks, 1);
        assert_eq!(sched.ticks.len(), 1);
        assert_eq!(sched.ticks[0].slots.len(), 1);
        assert_eq!(sched.ticks[0].slots[0].divider, 1);
    }

    #[test]
    fn scenario_b_balancing_disjoint_ticks() {
        let mut sched = Schedule::new(8);
        sched.insert_task("a".into(), 2, 0.3, 0).unwrap();
        sched.insert_task("b".into(), 2, 0.3, 0).unwrap();

        assert_eq!(sched.n_ticks, 2);
        assert_eq!(sched.tasks[0].n_slots, 1);
        assert_eq!(sched.tasks[1].n_slots, 1);

        let a_ticks: Vec<usize> = sched
            .ticks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.slots.iter().any(|s| s.task_index == 0))
            .map(|(i, _)| i)
            .collect();
        let b_ticks: Vec<usize> = sched
            .ticks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.slots.iter().any(|s| s.task_index == 1))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(a_ticks.len(), 1);
        assert_eq!(b_ticks.len(), 1);
        assert_ne!(a_ticks[0], b_ticks[0]);
        for tick in &sched.ticks {
            assert!((tick.length - 0.3).abs() < 1e-9);
        }
    }

    #[test]
    fn scenario_c_divider_clusters_in_last_tick() {
        let mut sched = Schedule::new(8);
        sched.insert_task("rare".into(), 16, 0.2, 0).unwrap();

        assert_eq!(sched.n_ticks, 8);
        assert_eq!(sched.max_divider, 2);
        assert_eq!(sched.tasks[0].n_slots, 1);

        let placed_tick = sched
            .ticks
            .iter()
            .position(|t| !t.slots.is_empty())
            .unwrap();
        assert_eq!(placed_tick, 7);
        assert_eq!(sched.ticks[7].slots[0].divider, 2);
    }

    #[test]
    fn boundary_period_equals_max_ticks() {
        let mut sched = Schedule::new(8);
        sched.insert_task("t".into(), 8, 0.1, 0).unwrap();
        assert_eq!(sched.n_ticks, 8);
        assert_eq!(sched.tasks[0].n_slots, 1);
        let placed: Vec<_> = sched
            .ticks
            .iter()
            .filter(|t| !t.slots.is_empty())
            .collect();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].slots[0].divider, 1);
    }

    #[test]
    fn boundary_period_double_max_ticks() {
        let mut sched = Schedule::new(8);
        sched.insert_task("t".into(), 16, 0.1, 0).unwrap();
        assert_eq!(sched.n_ticks, 8);
        assert_eq!(sched.max_divider, 2);
        assert_eq!(sched.ticks[7].slots.len(), 1);
    }

    #[test]
    fn boundary_huge_period_fails_divider_overflow() {
        let mut sched = Schedule::new(8);
        // n_ticks will expand to 8 (max_ticks); 256 * 8 = 2048 -> divider 256.
        let err = sched.insert_task("t".into(), 2048, 0.1, 0).unwrap_err();
        assert!(matches!(err, PlacementError::DividerOverflow { .. }));
    }

    #[test]
    fn rejects_non_power_of_two_period() {
        let mut sched = Schedule::new(8);
        let err = sched.insert_task("bad".into(), 3, 0.1, 0).unwrap_err();
        assert!(matches!(err, PlacementError::NonPowerOfTwoPeriod { .. }));
    }

    #[test]
    fn rejects_length_at_or_above_period() {
        let mut sched = Schedule::new(8);
        let err = sched.insert_task("bad".into(), 4, 4.0, 0).unwrap_err();
        assert!(matches!(err, PlacementError::LengthExceedsPeriod { .. }));
    }

    #[test]
    fn tick_length_tracks_divided_cost() {
        let mut sched = Schedule::new(8);
        sched.insert_task("rare".into(), 16, 0.4, 0).unwrap();
        // A divided slot amortizes its cost over its duty cycle.
        assert!((sched.ticks[7].length - 0.2).abs() < 1e-9);
    }

    #[test]
    fn tick_table_expands_again_for_a_later_larger_period() {
        let mut sched = Schedule::new(8);
        sched.insert_task("a".into(), 2, 0.1, 0).unwrap();
        assert_eq!(sched.n_ticks, 2);
        // A later, larger (but still <= max_ticks) period expands the table
        // again rather than falling back to a runtime divider, so every
        // task with period <= max_ticks keeps divider == 1.
        sched.insert_task("b".into(), 4, 0.1, 0).unwrap();
        assert_eq!(sched.n_ticks, 4);
        assert_eq!(sched.max_divider, 1);
        assert_eq!(sched.tasks[1].n_slots, 1);
        let b_slot = sched
            .ticks
            .iter()
            .flat_map(|t| t.slots.iter())
            .find(|s| s.task_index == 1)
            .unwrap();
        assert_eq!(b_slot.divider, 1);
    }

    #[test]
    fn tick_table_expands_repeatedly_up_to_max_ticks() {
        let mut sched = Schedule::new(16);
        sched.insert_task("a".into(), 2, 0.1, 0).unwrap();
        assert_eq!(sched.n_ticks, 2);
        sched.insert_task("b".into(), 8, 0.05, 0).unwrap();
        assert_eq!(sched.n_ticks, 8);
        sched.insert_task("c".into(), 16, 0.02, 0).unwrap();
        assert_eq!(sched.n_ticks, 16);
        assert_eq!(sched.max_divider, 1);
        for task in &sched.tasks {
            assert!(task.n_slots >= 1);
        }
    }
}
