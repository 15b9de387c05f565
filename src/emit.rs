//! Renders a finalized [`Schedule`] as a single C source file: prototypes,
//! per-tick handler bodies, the round-robin driver, and the init routine.

use std::io::Write;

use thiserror::Error;

use crate::config::Config;
use crate::schedule::Schedule;

const ATTR_INTERRUPT: &str = "__interrupt__";
const ATTR_FASTVAR: &str = "__attribute__((section (\"direct\")))";

#[derive(Error, Debug)]
pub enum EmitError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Emitter<'a> {
    config: &'a Config,
    schedule: &'a Schedule,
}

impl<'a> Emitter<'a> {
    pub fn new(config: &'a Config, schedule: &'a Schedule) -> Self {
        Self { config, schedule }
    }

    pub fn emit<W: Write>(&self, out: &mut W) -> Result<(), EmitError> {
        self.emit_preamble(out)?;
        self.emit_prototypes(out)?;
        self.emit_handler_bodies(out)?;
        self.emit_driver(out)?;
        self.emit_init(out)?;
        Ok(())
    }

    fn emit_preamble<W: Write>(&self, out: &mut W) -> Result<(), EmitError> {
        let prefix = &self.config.prefix;

        writeln!(out, "/* Automatically generated by sched */")?;
        writeln!(out)?;
        writeln!(out, "{ATTR_FASTVAR} void (*{prefix}_function) (void);")?;
        writeln!(out, "{ATTR_FASTVAR} unsigned char {prefix}_divider;")?;
        writeln!(out)?;

        for include in &self.config.includes {
            writeln!(out, "#include \"{include}\"")?;
        }
        writeln!(out)?;

        self.warn_inline_mismatches();

        Ok(())
    }

    /// Advisory warnings only; never written to the output stream.
    fn warn_inline_mismatches(&self) {
        for task in &self.schedule.tasks {
            let inline_p = task.is_inline();
            let cycles = task.length * self.config.cycles_per_tick;

            if inline_p && task.n_slots > 2 && cycles > self.config.deinline_cycles_threshold {
                log::warn!("{} should not be inline", task.base_name());
            }
            if !inline_p && cycles < self.config.inline_cycles_threshold {
                log::warn!(
                    "{} should be inline, only takes {} cycles",
                    task.name,
                    cycles as i64
                );
            }
        }
    }

    fn emit_prototypes<W: Write>(&self, out: &mut W) -> Result<(), EmitError> {
        let prefix = &self.config.prefix;
        for i in 0..self.schedule.n_ticks {
            writeln!(out, "static {ATTR_INTERRUPT} void {prefix}_{i} (void);")?;
        }
        writeln!(out)?;
        Ok(())
    }

    fn emit_handler_bodies<W: Write>(&self, out: &mut W) -> Result<(), EmitError> {
        let prefix = &self.config.prefix;

        for i in 0..self.schedule.n_ticks {
            let tick = &self.schedule.ticks[i as usize];

            writeln!(out, "static {ATTR_INTERRUPT} void {prefix}_{i} (void)")?;
            writeln!(out, "{{")?;

            let mut divider = 1u32;
            while divider <= self.schedule.max_divider {
                let slots_at_divider: Vec<_> = tick
                    .slots
                    .iter()
                    .filter(|s| s.divider == divider)
                    .collect();

                if !slots_at_divider.is_empty() {
                    let guarded = divider > 1;
                    if guarded {
                        writeln!(out)?;
                        writeln!(out, "\tif (!({prefix}_divider & {}))", divider - 1)?;
                        writeln!(out, "\t{{")?;
                    }

                    let indent = if guarded { "\t\t" } else { "\t" };
                    for slot in &slots_at_divider {
                        let task = &self.schedule.tasks[slot.task_index];
                        let call_name = self.call_site_name(task, i);

                        if !task.is_inline() {
                            writeln!(out, "{indent}extern void {call_name} (void);")?;
                        }
                        writeln!(
                            out,
                            "{indent}{call_name} (); {}",
                            time_comment(task.length, self.config.cycles_per_tick)
                        )?;
                    }

                    if guarded {
                        writeln!(out, "\t}}")?;
                    }
                }

                divider *= 2;
            }

            if i == self.schedule.n_ticks - 1 && self.schedule.max_divider > 1 {
                writeln!(out, "\t{prefix}_divider++;")?;
            }
            if self.schedule.n_ticks > 1 {
                let next = (i + 1) % self.schedule.n_ticks;
                writeln!(out, "\t{prefix}_function = {prefix}_{next};")?;
            }

            writeln!(
                out,
                "\t{}",
                time_comment(tick.length, self.config.cycles_per_tick)
            )?;
            if tick.length >= 1.0 {
                log::warn!("tick {i} takes too long");
            }

            writeln!(out, "}}")?;
            writeln!(out)?;
        }

        Ok(())
    }

    /// The call-site name: base name, with a rotating `_<n>` suffix for
    /// pre-unrolled tasks.
    fn call_site_name(&self, task: &crate::task::Task, tick_index: u32) -> String {
        let base = task.base_name();
        if task.already_unrolled_count > 0 {
            let window = task.already_unrolled_count * task.period;
            let n1 = tick_index % window;
            let suffix = n1 / task.period;
            format!("{base}_{suffix}")
        } else {
            base.to_owned()
        }
    }

    fn emit_driver<W: Write>(&self, out: &mut W) -> Result<(), EmitError> {
        let prefix = &self.config.prefix;
        writeln!(out, "void {prefix}_driver (void)")?;
        writeln!(out, "{{")?;
        writeln!(out, "#ifdef __m6809__")?;
        writeln!(out, "\tasm (\"jmp\\t[_{prefix}_function]\");")?;
        writeln!(out, "#else")?;
        writeln!(out, "\t(*{prefix}_function) ();")?;
        writeln!(out, "#endif")?;
        writeln!(out, "}}")?;
        writeln!(out)?;
        Ok(())
    }

    fn emit_init<W: Write>(&self, out: &mut W) -> Result<(), EmitError> {
        let prefix = &self.config.prefix;
        writeln!(out, "void {prefix}_init (void)")?;
        writeln!(out, "{{")?;
        writeln!(out, "\t{prefix}_function = {prefix}_0;")?;
        writeln!(out, "\t{prefix}_divider = 0;")?;
        writeln!(out, "}}")?;
        Ok(())
    }
}

fn time_comment(length: f64, cycles_per_tick: f64) -> String {
    format!("/* {length} interrupts / {} cycles */", length * cycles_per_tick)
}
