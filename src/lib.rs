//! Static periodic-interrupt scheduler code generator.
//!
//! Reads a declarative schedule of realtime tasks (name, period, worst-case
//! length) and emits a C source file implementing an interrupt-driven
//! dispatcher: one unrolled handler per tick, runtime divider guards for
//! tasks whose period exceeds the unroll factor, and a round-robin driver.

pub mod config;
pub mod emit;
pub mod parser;
pub mod schedule;
pub mod task;
pub mod time;

pub use config::Config;
pub use emit::Emitter;
pub use parser::parse_schedule;
pub use schedule::Schedule;
pub use task::Task;
