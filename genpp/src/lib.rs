#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # genpp
//!
//! An in-memory, language-agnostic text preprocessor with C-preprocessor-style
//! directives: `#include`, `#if`/`#ifdef`/`#ifndef`/`#elif`/`#else`/`#endif`,
//! `#define`, `#undef`, `#error`, `#pragma once`, and `__NAME__` macro
//! references. It never touches a filesystem or the network: every source a
//! run can see is supplied up front through [`BuildConfig`].
//!
//! ## Example
//!
//! ```rust
//! use genpp::BuildConfig;
//!
//! let config = BuildConfig::new()
//!     .with_main_source("main.txt", "#define GREETING hello\n__GREETING__, world!\n");
//! let result = genpp::run(&config).unwrap();
//! assert_eq!(result.outputs["main.txt"], "\nhello, world!\n");
//! ```

mod config;
mod cursor;
mod date_time;
mod engine;
mod error;
mod macro_store;

use std::collections::HashMap;

pub use config::{BuildConfig, DEFAULT_INCLUSION_LIMIT};
pub use error::{PreprocessError, PreprocessErrorKind};
pub use macro_store::{is_builtin, BUILTIN_NAMES};

/// The outcome of a [`run`]: one processed text per main source, plus the
/// wall-clock strings bound to the `DATE`/`TIME`/`TIMESTAMP` built-ins for
/// that run (spec §9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessResult {
    /// Processed text, keyed by the name each main source was registered
    /// under.
    pub outputs: HashMap<String, String>,
    /// The `DATE` built-in's value for this run.
    pub date: String,
    /// The `TIME` built-in's value for this run.
    pub time: String,
    /// The `TIMESTAMP` built-in's value for this run.
    pub timestamp: String,
}

/// Run a preprocessing pass over every main source in `config` (spec §4.1).
///
/// If `config` has no main sources registered, every source becomes a main
/// source (spec §3): the full set is processed and emitted. Each main
/// source is processed independently, with its own fresh
/// [`macro_store::MacroStore`] seeded from `config`'s predefined macros and
/// its own `#pragma once` inclusion guard — definitions made while
/// processing one main source are never visible while processing another.
/// `#include` targets are looked up in `config`'s full source set (main
/// sources and auxiliary sources alike), recursing up to `config`'s
/// inclusion limit.
///
/// # Errors
///
/// Returns the first [`PreprocessError`] encountered, in main-source
/// registration order. Processing of a main source stops at its first
/// error; sources after it in iteration order are not attempted.
pub fn run(config: &BuildConfig) -> Result<ProcessResult, PreprocessError> {
    let date = date_time::format_date();
    let time = date_time::format_time();
    let timestamp = date_time::format_timestamp();

    let mut all_sources = config.sources.clone();
    for (name, text) in &config.main_sources {
        all_sources.insert(name.clone(), text.clone());
    }

    // Spec §3: when no main-sources subset was given, `sources` plays both
    // roles — everything is emitted, not just reachable-via-include.
    let selected: &HashMap<String, String> = if config.main_sources.is_empty() {
        &config.sources
    } else {
        &config.main_sources
    };

    let mut outputs = HashMap::with_capacity(selected.len());
    let mut names: Vec<&String> = selected.keys().collect();
    names.sort();

    for name in names {
        let text = selected[name].clone();
        let mut macros = macro_store::MacroStore::seed(&config.macros, name, &date, &time, &timestamp);
        let mut once_guarded = std::collections::HashSet::new();
        let processed = engine::process_source(
            name,
            text,
            &mut macros,
            config,
            &all_sources,
            &mut once_guarded,
            0,
            &date,
            &time,
            &timestamp,
        )?;
        outputs.insert(name.clone(), processed);
    }

    Ok(ProcessResult {
        outputs,
        date,
        time,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_source_with_no_directives_passes_through_unchanged() {
        let config = BuildConfig::new().with_main_source("m", "plain text\nsecond line\n");
        let result = run(&config).unwrap();
        assert_eq!(result.outputs["m"], "plain text\nsecond line\n");
    }

    #[test]
    fn define_then_reference_expands_to_the_stored_value() {
        let config =
            BuildConfig::new().with_main_source("m", "#define VERSION 1.2.3\n__VERSION__\n");
        let result = run(&config).unwrap();
        assert_eq!(result.outputs["m"], "\n1.2.3\n");
    }

    #[test]
    fn conditional_inclusion_picks_the_defined_branch() {
        let text = "#ifdef DEBUG\ndebug build\n#else\nrelease build\n#endif\n";
        let config = BuildConfig::new()
            .with_macro("DEBUG", "1")
            .with_main_source("m", text);
        let result = run(&config).unwrap();
        assert_eq!(result.outputs["m"], "debug build\n");
    }

    #[test]
    fn include_pulls_in_another_registered_source() {
        let config = BuildConfig::new()
            .with_source("header.txt", "shared constant\n")
            .with_main_source("m", "top\n#include \"header.txt\"\nbottom\n");
        let result = run(&config).unwrap();
        assert_eq!(result.outputs["m"], "top\nshared constant\n\nbottom\n");
    }

    #[test]
    fn missing_include_target_is_a_preprocess_error() {
        let config = BuildConfig::new().with_main_source("m", "#include \"missing.txt\"\n");
        let err = run(&config).unwrap_err();
        assert_eq!(err.kind(), PreprocessErrorKind::Preprocess);
        assert_eq!(err.source_name(), "m");
    }

    #[test]
    fn builtins_expand_to_wall_clock_strings_shared_with_the_result() {
        let config = BuildConfig::new().with_main_source("m", "__DATE__ __TIME__ __TIMESTAMP__\n");
        let result = run(&config).unwrap();
        let expected = format!("{} {} {}\n", result.date, result.time, result.timestamp);
        assert_eq!(result.outputs["m"], expected);
    }

    #[test]
    fn each_main_source_gets_an_independent_macro_store() {
        let config = BuildConfig::new()
            .with_main_source("a", "#define ONLY_IN_A 1\n__ONLY_IN_A__\n")
            .with_main_source("b", "__ONLY_IN_A__\n");
        let result = run(&config).unwrap();
        assert_eq!(result.outputs["a"], "\n1\n");
        assert_eq!(result.outputs["b"], "__ONLY_IN_A__\n");
    }

    #[test]
    fn file_builtin_reports_the_current_file_across_an_include() {
        let config = BuildConfig::new()
            .with_source("inc.txt", "__FILE__\n")
            .with_main_source("m", "__FILE__\n#include \"inc.txt\"\n__FILE__\n");
        let result = run(&config).unwrap();
        assert_eq!(result.outputs["m"], "m\n\ninc.txt\n\nm\n");
    }

    #[test]
    fn error_directive_aborts_the_run_with_its_message() {
        let config = BuildConfig::new().with_main_source("m", "#error out of disk space\n");
        let err = run(&config).unwrap_err();
        assert_eq!(err.message(), "out of disk space");
    }

    #[test]
    fn disabling_include_directives_leaves_them_as_plain_text() {
        let config = BuildConfig::new()
            .enable_include_directives(false)
            .with_main_source("m", "#include \"anything.txt\"\nafter\n");
        let result = run(&config).unwrap();
        assert_eq!(result.outputs["m"], "#include \"anything.txt\"\nafter\n");
    }

    #[test]
    fn no_main_sources_falls_back_to_processing_every_source() {
        let config = BuildConfig::new()
            .with_source("hi.txt", "Hi!")
            .with_source("main.txt", "#include <hi.txt>");
        let result = run(&config).unwrap();
        assert_eq!(result.outputs["hi.txt"], "Hi!");
        assert_eq!(result.outputs["main.txt"], "Hi!");
    }

    #[test]
    fn display_format_matches_the_documented_shape() {
        let config = BuildConfig::new().with_main_source("m", "#define FILE oops\n");
        let err = run(&config).unwrap_err();
        let rendered = format!("{err}");
        assert!(rendered.starts_with("Error processing m(0,0): "));
    }
}
