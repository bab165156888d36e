#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! Command-line front end for [`genpp`]: reads a directory of source files
//! from disk, runs them through the in-memory preprocessor, and writes the
//! results back out. The core library never touches a filesystem; all of
//! that lives here.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use genpp::BuildConfig;

/// An in-memory text preprocessor with C-preprocessor-style directives.
#[derive(Parser, Debug)]
#[command(name = "genpp", version, about)]
struct Cli {
    /// Directory containing every source available for `#include` and for
    /// processing. Each regular file's path relative to this directory is
    /// its registered source name.
    #[arg(long, value_name = "DIR")]
    source_dir: PathBuf,

    /// Directory to write processed output into, mirroring source names.
    /// Required unless `--format json` is used with no `--out-dir`, in
    /// which case results are printed to stdout instead.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Treat only the named source(s) as main sources (always processed and
    /// emitted). May be repeated. If omitted, every file under
    /// `source_dir` is treated as a main source.
    #[arg(long = "main", value_name = "NAME")]
    main_sources: Vec<String>,

    /// Predefine a macro as `NAME` or `NAME=VALUE`. May be repeated.
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    define: Vec<String>,

    /// Override the `#include` recursion depth limit.
    #[arg(long, value_name = "N")]
    inclusion_limit: Option<u32>,

    /// Leave a rogue `#elif`/`#else`/`#endif` untouched instead of failing.
    #[arg(long)]
    ignore_unmatched_conditionals: bool,

    /// Disable `#include` processing.
    #[arg(long)]
    disable_include: bool,

    /// Disable `#if`/`#ifdef`/`#ifndef`/`#elif`/`#else`/`#endif` processing.
    #[arg(long)]
    disable_conditionals: bool,

    /// Disable `#define` processing.
    #[arg(long)]
    disable_define: bool,

    /// Disable `#undef` processing.
    #[arg(long)]
    disable_undef: bool,

    /// Disable `#error` processing.
    #[arg(long)]
    disable_error: bool,

    /// Disable `#pragma` processing.
    #[arg(long)]
    disable_pragma: bool,

    /// Disable `__NAME__` macro-reference expansion.
    #[arg(long)]
    disable_macro_expansion: bool,

    /// Output format for the run summary printed to stdout.
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    #[cfg(feature = "json")]
    Json,
}

#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct RunSummary {
    date: String,
    time: String,
    timestamp: String,
    outputs: HashMap<String, String>,
}

fn main() {
    if !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }
    if let Err(err) = run() {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let sources = collect_sources(&cli.source_dir)
        .with_context(|| format!("reading sources from {}", cli.source_dir.display()))?;

    let mut config = BuildConfig::new();
    for (name, text) in &sources {
        if cli.main_sources.is_empty() || cli.main_sources.contains(name) {
            config = config.with_main_source(name.clone(), text.clone());
        } else {
            config = config.with_source(name.clone(), text.clone());
        }
    }

    for raw in &cli.define {
        let (name, value) = match raw.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (raw.clone(), String::new()),
        };
        config = config.with_macro(name, value);
    }

    if let Some(limit) = cli.inclusion_limit {
        config = config.with_inclusion_limit(limit);
    }
    config = config
        .ignore_unmatched_conditional_directives(cli.ignore_unmatched_conditionals)
        .enable_include_directives(!cli.disable_include)
        .enable_conditional_directives(!cli.disable_conditionals)
        .enable_macro_define_directives(!cli.disable_define)
        .enable_macro_undefine_directives(!cli.disable_undef)
        .enable_error_directives(!cli.disable_error)
        .enable_pragma_directives(!cli.disable_pragma)
        .enable_macro_expansion(!cli.disable_macro_expansion);

    let result = genpp::run(&config).context("preprocessing failed")?;

    if let Some(out_dir) = &cli.out_dir {
        for (name, text) in &result.outputs {
            let dest = out_dir.join(name);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(&dest, text).with_context(|| format!("writing {}", dest.display()))?;
        }
    }

    match cli.format {
        OutputFormat::Text => {
            println!(
                "{} {} source(s) processed ({} {}, {} {}, {} {})",
                "ok:".green().bold(),
                result.outputs.len(),
                "date".dimmed(),
                result.date,
                "time".dimmed(),
                result.time,
                "timestamp".dimmed(),
                result.timestamp,
            );
            if cli.out_dir.is_none() {
                for (name, text) in &result.outputs {
                    println!("--- {} ---\n{text}", name.bold());
                }
            }
        }
        #[cfg(feature = "json")]
        OutputFormat::Json => {
            let summary = RunSummary {
                date: result.date,
                time: result.time,
                timestamp: result.timestamp,
                outputs: result.outputs,
            };
            let rendered =
                serde_json::to_string_pretty(&summary).context("serializing run summary")?;
            println!("{rendered}");
        }
    }

    Ok(())
}

/// Walk `dir` recursively, reading every regular file into a map keyed by
/// its path relative to `dir` (with `/` separators, regardless of host OS).
fn collect_sources(dir: &Path) -> Result<HashMap<String, String>> {
    let mut sources = HashMap::new();
    collect_sources_into(dir, dir, &mut sources)?;
    Ok(sources)
}

fn collect_sources_into(root: &Path, dir: &Path, sources: &mut HashMap<String, String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_sources_into(root, &path, sources)?;
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading source {}", path.display()))?;
        sources.insert(relative, text);
    }
    Ok(())
}
