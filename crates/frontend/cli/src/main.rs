use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use sim86_core::logging::{LogCategory, LogConfig, LogLevel};
use sim86_core::{Session, SessionConfig, Termination};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sim86", about = "Decode and simulate a subset of 8086 machine code")]
struct Args {
    /// Path to a raw 8086 binary
    input: Option<PathBuf>,

    /// Pick the binary whose name contains this fragment (e.g. "0043")
    #[arg(long, conflicts_with = "input")]
    listing: Option<String>,

    /// Directory searched by --listing
    #[arg(long, default_value = "perfaware/part1")]
    dir: PathBuf,

    /// Also write the listing to this file
    #[arg(long)]
    out: Option<PathBuf>,

    /// Decode only, do not touch registers
    #[arg(long, default_value_t = false)]
    no_sim: bool,

    /// Show each consumed byte in hex and binary
    #[arg(long, default_value_t = false)]
    bytes: bool,

    /// Dump the final session state to this file as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Suppress the listing and register dump on stdout
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Global core log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "off")]
    log_level: String,

    /// Log level for instruction decoding
    #[arg(long)]
    log_decode: Option<String>,

    /// Log level for the register machine
    #[arg(long)]
    log_exec: Option<String>,

    /// Log level for raw byte reads
    #[arg(long)]
    log_bytes: Option<String>,

    /// Send core logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn parse_level(value: &str) -> Result<LogLevel> {
    match LogLevel::from_str(value) {
        Some(level) => Ok(level),
        None => bail!("Unknown log level: {}", value),
    }
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    config.set_global_level(parse_level(&args.log_level)?);
    for (category, level) in [
        (LogCategory::Decode, &args.log_decode),
        (LogCategory::Exec, &args.log_exec),
        (LogCategory::Bytes, &args.log_bytes),
    ] {
        if let Some(level) = level {
            config.set_level(category, parse_level(level)?);
        }
    }
    if let Some(path) = &args.log_file {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

/// First extension-less file in `dir` whose name contains `fragment`
fn find_listing(dir: &Path, fragment: &str) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let matches = path.is_file()
            && path.extension().is_none()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(fragment));
        if matches {
            candidates.push(path);
        }
    }
    candidates.sort();
    match candidates.into_iter().next() {
        Some(path) => Ok(path),
        None => bail!("No binary matching {:?} in {}", fragment, dir.display()),
    }
}

fn resolve_input(args: &Args) -> Result<PathBuf> {
    match (&args.input, &args.listing) {
        (Some(path), _) => Ok(path.clone()),
        (None, Some(fragment)) => find_listing(&args.dir, fragment),
        (None, None) => bail!("Pass a binary path or --listing <fragment>"),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let path = resolve_input(&args)?;
    let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    info!("Loaded {} bytes from {}", bytes.len(), path.display());

    let config = SessionConfig {
        simulate: !args.no_sim,
        show_bytes: args.bytes,
    };
    let mut session = Session::new(bytes, config);
    let listing = session.run();
    let text = listing.render();

    if !args.quiet {
        print!("; src: `{}`\n{}", path.display(), text);
        if config.simulate {
            println!("\n{}", session.registers());
        }
    }

    if let Some(out) = &args.out {
        fs::write(out, &text).with_context(|| format!("writing {}", out.display()))?;
        info!("Wrote listing to {}", out.display());
    }

    if let Some(save) = &args.save {
        let mut f = File::create(save)?;
        write!(f, "{}", serde_json::to_string_pretty(&session.save_state())?)?;
        info!("Saved state to {}", save.display());
    }

    if let Termination::Failed(err) = &listing.termination {
        bail!("Decoding stopped at offset {:04X}: {}", err.offset(), err);
    }

    Ok(())
}
