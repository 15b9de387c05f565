use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use sched::config::Config;
use sched::emit::Emitter;
use sched::parser::parse_schedule;
use sched::schedule::Schedule;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("sched=info")).init();

    if let Err(e) = main_inner() {
        log::error!("Command failed.\n{e:?}");
        std::process::exit(1);
    }
}

/// Static periodic-interrupt scheduler code generator
#[derive(Parser)]
#[command(name = "sched")]
struct Opt {
    /// Output file; stdout if omitted
    #[arg(short = 'o')]
    output: Option<PathBuf>,
    /// A `#include` line to emit in the generated source (repeatable)
    #[arg(short = 'i')]
    include: Vec<String>,
    /// Maximum number of unrolled tick handlers
    #[arg(short = 'M', default_value = "8")]
    max_ticks: u32,
    /// Symbol prefix for the generated driver (must not contain '_')
    #[arg(short = 'p', default_value = "tick")]
    prefix: String,
    /// Define a conditional name, enabling `?cond`-guarded entries (repeatable)
    #[arg(short = 'D')]
    define: Vec<String>,
    /// Schedule description files, read in order
    input: Vec<PathBuf>,
}

fn main_inner() -> anyhow::Result<()> {
    let opt = Opt::parse();

    if opt.input.is_empty() {
        bail!("no input schedule files specified");
    }

    let config = Config::new(
        opt.max_ticks,
        opt.prefix,
        opt.include,
        opt.define,
        opt.output,
        opt.input.clone(),
    )
    .context("invalid configuration")?;

    generate(&config)
}

/// Reads every input file in `config`, builds the schedule, and emits the
/// generated source to `config.output_path` (or stdout).
fn generate(config: &Config) -> anyhow::Result<()> {
    let mut schedule = Schedule::new(config.max_ticks);

    for path in &config.input_files {
        let file = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
        let reader = BufReader::new(file);
        parse_schedule(
            reader,
            &path.display().to_string(),
            &config.conditionals,
            config.cycles_per_tick,
            &mut schedule,
        )
        .with_context(|| format!("parsing '{}'", path.display()))?;
    }

    let emitter = Emitter::new(config, &schedule);

    match &config.output_path {
        Some(path) => {
            let mut out =
                File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
            emitter.emit(&mut out).context("emitting generated source")?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            emitter.emit(&mut out).context("emitting generated source")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn end_to_end_file_to_file_generation() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("sched.txt");
        let output_path = dir.path().join("sched.c");

        std::fs::File::create(&input_path)
            .unwrap()
            .write_all(b"scan 1 0.1\nrare 16 0.2\n")
            .unwrap();

        let config = Config::new(
            8,
            "tick".into(),
            vec![],
            vec![],
            Some(output_path.clone()),
            vec![input_path],
        )
        .unwrap();

        generate(&config).unwrap();

        let mut generated = String::new();
        std::fs::File::open(&output_path)
            .unwrap()
            .read_to_string(&mut generated)
            .unwrap();

        assert!(generated.contains("tick_driver"));
        assert!(generated.contains("scan ();"));
        assert!(generated.contains("rare ();"));
    }

    #[test]
    fn missing_input_file_is_reported_with_context() {
        let config = Config::new(
            8,
            "tick".into(),
            vec![],
            vec![],
            None,
            vec![PathBuf::from("/nonexistent/sched.txt")],
        )
        .unwrap();

        let err = generate(&config).unwrap_err();
        assert!(err.to_string().contains("opening"));
    }
}
