//! The directive engine: scans a single source buffer byte by byte,
//! dispatching `#`-directives and `__NAME__` macro references as it finds
//! them, splicing each one's expansion in place and resuming the scan from
//! the splice point (spec §2, §4).

use std::collections::{HashMap, HashSet};

use crate::config::BuildConfig;
use crate::cursor::Cursor;
use crate::error::PreprocessError;
use crate::macro_store::{is_builtin, MacroStore, MacroValue};

const CONDITIONAL_KEYWORDS: [&str; 3] = ["if", "ifdef", "ifndef"];
const TERMINATOR_KEYWORDS: [&str; 3] = ["elif", "else", "endif"];

fn end_of_line(buf: &str, pos: usize) -> usize {
    buf[pos..].find('\n').map_or(buf.len(), |offset| pos + offset)
}

/// Like [`end_of_line`], but also consumes the line's own trailing `\n` (if
/// any). Used for the conditional engine's directive-line deletions: spec
/// §4.5 says a block's branch directives and rejected bodies are *deleted*
/// outright, not left behind as a blank line the way `#define`/`#undef`/
/// `#pragma` intentionally are.
fn end_of_line_inclusive(buf: &str, pos: usize) -> usize {
    let eol = end_of_line(buf, pos);
    if eol < buf.len() { eol + 1 } else { eol }
}

/// Strip a leading and/or trailing `__` from a condition identifier, so
/// that `#if X` and `#if __X__` are equivalent (spec §4.5).
fn normalize_condition_name(raw: &str) -> &str {
    let mut name = raw;
    if let Some(stripped) = name.strip_prefix("__") {
        name = stripped;
    }
    if let Some(stripped) = name.strip_suffix("__") {
        name = stripped;
    }
    name
}

/// Whether the byte at `cursor`'s position opens a directive: a `#` whose
/// only preceding characters since the start of the line are whitespace.
fn is_directive_start(cursor: &Cursor) -> bool {
    let bytes = cursor.buffer().as_bytes();
    let mut i = cursor.pos();
    while i > 0 {
        i -= 1;
        match bytes[i] {
            b' ' | b'\t' | b'\r' => continue,
            b'\n' => return true,
            _ => return false,
        }
    }
    true
}

/// Process one source buffer to completion: every recognized directive is
/// resolved and every `__NAME__` reference expanded, recursing into
/// `#include` targets as it goes.
#[allow(clippy::too_many_arguments)]
pub(crate) fn process_source(
    name: &str,
    text: String,
    macros: &mut MacroStore,
    config: &BuildConfig,
    sources: &HashMap<String, String>,
    once_guarded: &mut HashSet<String>,
    depth: u32,
    date: &str,
    time: &str,
    timestamp: &str,
) -> Result<String, PreprocessError> {
    let mut cursor = Cursor::new(name, text);
    macros.set_file(name);

    while !cursor.is_eof() {
        match cursor.peek().unwrap() {
            b'#' if is_directive_start(&cursor) => {
                dispatch_directive(
                    &mut cursor,
                    macros,
                    config,
                    sources,
                    once_guarded,
                    depth,
                    date,
                    time,
                    timestamp,
                )?;
            }
            b'_' if config.enable_macro_expansion => {
                if !try_expand_macro_reference(&mut cursor, macros)? {
                    cursor.advance();
                }
            }
            _ => {
                cursor.advance();
            }
        }
    }

    Ok(cursor.into_buffer())
}

#[allow(clippy::too_many_arguments)]
fn dispatch_directive(
    cursor: &mut Cursor,
    macros: &mut MacroStore,
    config: &BuildConfig,
    sources: &HashMap<String, String>,
    once_guarded: &mut HashSet<String>,
    depth: u32,
    date: &str,
    time: &str,
    timestamp: &str,
) -> Result<(), PreprocessError> {
    let hash_pos = cursor.pos();
    cursor.advance();
    cursor.skip_whitespace_until_eol();
    let keyword = cursor.collect_token();

    if keyword == "include" {
        handle_include(
            cursor,
            hash_pos,
            macros,
            config,
            sources,
            once_guarded,
            depth,
            date,
            time,
            timestamp,
        )
    } else if CONDITIONAL_KEYWORDS.contains(&keyword.as_str()) {
        handle_conditional(cursor, hash_pos, &keyword, macros, config)
    } else if TERMINATOR_KEYWORDS.contains(&keyword.as_str()) {
        handle_unmatched_conditional(cursor, hash_pos, &keyword, config)
    } else if keyword == "define" {
        handle_define(cursor, hash_pos, macros, config)
    } else if keyword == "undef" {
        handle_undef(cursor, hash_pos, macros, config)
    } else if keyword == "error" {
        handle_error(cursor, hash_pos, config)
    } else if keyword == "pragma" {
        handle_pragma(cursor, hash_pos, config, once_guarded)
    } else {
        // Not a directive this engine recognizes: leave the '#' as plain
        // text and resume scanning right after it.
        cursor.set_pos(hash_pos + 1);
        Ok(())
    }
}

/// Try to recognize and expand a `__NAME__` macro reference starting at the
/// cursor. Returns `Ok(true)` if the cursor was advanced past an expansion,
/// `Ok(false)` if nothing matched and the caller should advance one byte
/// itself (the one-underscore case, spec §8's "macro-expansion trigger"
/// invariant).
fn try_expand_macro_reference(
    cursor: &mut Cursor,
    macros: &MacroStore,
) -> Result<bool, PreprocessError> {
    let start = cursor.pos();
    if !cursor.buffer()[start..].starts_with("__") {
        return Ok(false);
    }
    // `_` is ambiguous between "part of the name" and "start of the closing
    // delimiter", so the name is collected by searching for the literal
    // `"__"` substring (spec §2 item 1, §4.10) rather than by scanning
    // identifier-class bytes, which would greedily eat the closing `__`
    // itself and report no match.
    cursor.set_pos(start + 2);
    let Some(name) = cursor.collect_until_string("__") else {
        cursor.set_pos(start);
        return Ok(false);
    };
    if name.is_empty() {
        cursor.set_pos(start);
        return Ok(false);
    }
    let end = cursor.pos();

    if name == "LINE" {
        let replacement = cursor.line_number_1_origin(start).to_string();
        cursor.splice(start, end, &replacement);
        return Ok(true);
    }

    match macros.get(&name) {
        Some(value) => {
            let replacement = value.as_str().to_string();
            cursor.splice(start, end, &replacement);
            Ok(true)
        }
        None => {
            let (line, col) = cursor.line_col(start);
            Err(PreprocessError::parse(
                cursor.source_name().to_string(),
                line,
                col,
                format!("Cannot expand macro __{name}__, it is undefined."),
            ))
        }
    }
}

fn dirname(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| &path[..i])
}

#[allow(clippy::too_many_arguments)]
fn handle_include(
    cursor: &mut Cursor,
    hash_pos: usize,
    macros: &mut MacroStore,
    config: &BuildConfig,
    sources: &HashMap<String, String>,
    once_guarded: &mut HashSet<String>,
    depth: u32,
    date: &str,
    time: &str,
    timestamp: &str,
) -> Result<(), PreprocessError> {
    if !config.enable_include_directives {
        cursor.advance_to_eol();
        return Ok(());
    }

    if depth >= config.inclusion_limit {
        let (line, col) = cursor.line_col(hash_pos);
        return Err(PreprocessError::preprocess(
            cursor.source_name().to_string(),
            line,
            col,
            format!("Inclusions has exceeded the limit of {}.", config.inclusion_limit),
        ));
    }

    cursor.skip_whitespace_until_eol();
    let open = cursor.advance();
    let (closing, is_quoted) = match open {
        Some(b'<') => (b'>', false),
        Some(b'"') => (b'"', true),
        _ => {
            let (line, col) = cursor.line_col(hash_pos);
            return Err(PreprocessError::parse(
                cursor.source_name().to_string(),
                line,
                col,
                "Expected \" or <.",
            ));
        }
    };
    let requested = cursor.collect_until_byte_or_eol(closing);
    let eol = end_of_line(cursor.buffer(), cursor.pos());

    let target = if sources.contains_key(&requested) {
        Some(requested.clone())
    } else if is_quoted {
        dirname(cursor.source_name())
            .map(|dir| format!("{dir}/{requested}"))
            .filter(|candidate| sources.contains_key(candidate))
    } else {
        None
    };

    let Some(target) = target else {
        let (line, col) = cursor.line_col(hash_pos);
        return Err(PreprocessError::preprocess(
            cursor.source_name().to_string(),
            line,
            col,
            format!("Failed to include '{requested}': It does not exist."),
        ));
    };

    if once_guarded.contains(&target) {
        cursor.splice(hash_pos, eol, "");
        return Ok(());
    }

    let body = sources[&target].clone();
    let caller = cursor.source_name().to_string();
    let expanded = process_source(
        &target,
        body,
        macros,
        config,
        sources,
        once_guarded,
        depth + 1,
        date,
        time,
        timestamp,
    )?;
    macros.set_file(&caller);
    cursor.splice(hash_pos, eol, &expanded);
    Ok(())
}

fn handle_define(
    cursor: &mut Cursor,
    hash_pos: usize,
    macros: &mut MacroStore,
    config: &BuildConfig,
) -> Result<(), PreprocessError> {
    if !config.enable_macro_define_directives {
        cursor.advance_to_eol();
        return Ok(());
    }

    cursor.skip_whitespace_until_eol();
    let name = cursor.collect_token();
    if name.is_empty() {
        let (line, col) = cursor.line_col(hash_pos);
        return Err(PreprocessError::parse(
            cursor.source_name().to_string(),
            line,
            col,
            "#define directive is missing name of macro.",
        ));
    }
    if is_builtin(&name) {
        let (line, col) = cursor.line_col(hash_pos);
        return Err(PreprocessError::preprocess(
            cursor.source_name().to_string(),
            line,
            col,
            format!("Cannot use macro name '{name}', it is a built-in macro."),
        ));
    }

    cursor.skip_whitespace_until_eol();
    let eol = end_of_line(cursor.buffer(), cursor.pos());
    let remainder = cursor.buffer()[cursor.pos()..eol].trim();
    let value = if remainder.is_empty() {
        MacroValue::Null
    } else if remainder.len() >= 2 && remainder.starts_with('"') && remainder.ends_with('"') {
        MacroValue::Value(remainder[1..remainder.len() - 1].to_string())
    } else {
        MacroValue::Value(remainder.to_string())
    };
    macros.define(&name, value);
    cursor.splice(hash_pos, eol, "");
    Ok(())
}

fn handle_undef(
    cursor: &mut Cursor,
    hash_pos: usize,
    macros: &mut MacroStore,
    config: &BuildConfig,
) -> Result<(), PreprocessError> {
    if !config.enable_macro_undefine_directives {
        cursor.advance_to_eol();
        return Ok(());
    }

    cursor.skip_whitespace_until_eol();
    let name = cursor.collect_token();
    if name.is_empty() {
        let (line, col) = cursor.line_col(hash_pos);
        return Err(PreprocessError::parse(
            cursor.source_name().to_string(),
            line,
            col,
            "#undef directive is missing name of macro.",
        ));
    }
    if is_builtin(&name) {
        let (line, col) = cursor.line_col(hash_pos);
        return Err(PreprocessError::preprocess(
            cursor.source_name().to_string(),
            line,
            col,
            format!("Cannot use macro name '{name}', it is a built-in macro."),
        ));
    }

    let eol = end_of_line(cursor.buffer(), cursor.pos());
    macros.undef(&name);
    cursor.splice(hash_pos, eol, "");
    Ok(())
}

/// Reads a quoted message: seeks to the next `"`, then collects until the
/// next `"` or EOL (spec §4.8). An `#error` with no quotes at all consumes
/// nothing meaningful, by design (spec §9's open question) — callers
/// should always quote.
fn handle_error(
    cursor: &mut Cursor,
    hash_pos: usize,
    config: &BuildConfig,
) -> Result<(), PreprocessError> {
    if !config.enable_error_directives {
        cursor.advance_to_eol();
        return Ok(());
    }

    let (line, col) = cursor.line_col(hash_pos);
    let message = if cursor.seek_to_char(b'"') {
        cursor.collect_until_byte_or_eol(b'"')
    } else {
        String::new()
    };
    Err(PreprocessError::preprocess(
        cursor.source_name().to_string(),
        line,
        col,
        message,
    ))
}

fn handle_pragma(
    cursor: &mut Cursor,
    hash_pos: usize,
    config: &BuildConfig,
    once_guarded: &mut HashSet<String>,
) -> Result<(), PreprocessError> {
    if !config.enable_pragma_directives {
        cursor.advance_to_eol();
        return Ok(());
    }

    cursor.skip_whitespace_until_eol();
    let arg = cursor.collect_token();
    if arg != "once" {
        let (line, col) = cursor.line_col(hash_pos);
        return Err(PreprocessError::preprocess(
            cursor.source_name().to_string(),
            line,
            col,
            format!("Pragma extension '{arg}' is unsupported."),
        ));
    }
    let eol = end_of_line(cursor.buffer(), cursor.pos());
    once_guarded.insert(cursor.source_name().to_string());
    cursor.splice(hash_pos, eol, "");
    Ok(())
}

fn handle_unmatched_conditional(
    cursor: &mut Cursor,
    hash_pos: usize,
    keyword: &str,
    config: &BuildConfig,
) -> Result<(), PreprocessError> {
    if !config.enable_conditional_directives || config.ignore_unmatched_conditional_directives {
        cursor.advance_to_eol();
        return Ok(());
    }
    let (line, col) = cursor.line_col(hash_pos);
    Err(PreprocessError::parse(
        cursor.source_name().to_string(),
        line,
        col,
        format!("`#{keyword}` directive found without accompanying starting conditional (`#if`/`#ifdef`)."),
    ))
}

/// Evaluate a single-identifier condition per spec §4.5's table. `X` is
/// exactly one identifier (leading/trailing `__` stripped per
/// [`normalize_condition_name`]) — no operators, no boolean combinators
/// (spec §1's Non-goals explicitly exclude expressions here).
fn evaluate_condition(cursor: &mut Cursor, keyword: &str, macros: &MacroStore) -> bool {
    cursor.skip_whitespace_until_eol();
    let raw_name = cursor.collect_token();
    let name = normalize_condition_name(&raw_name);
    match keyword {
        "ifdef" => macros.is_defined(name),
        "ifndef" => !macros.is_defined(name),
        _ => macros.get(name).is_some_and(MacroValue::is_truthy),
    }
}

fn eof_while_processing_directive(cursor: &Cursor, at: usize) -> PreprocessError {
    let (line, col) = cursor.line_col(at);
    PreprocessError::parse(
        cursor.source_name().to_string(),
        line,
        col,
        "Unexpected end of file while processing directive.",
    )
}

fn duplicate_else(cursor: &Cursor, at: usize) -> PreprocessError {
    let (line, col) = cursor.line_col(at);
    PreprocessError::parse(
        cursor.source_name().to_string(),
        line,
        col,
        "`#else` directive defined multiple times. Only one `#else` block is allowed.",
    )
}

/// Resolve one `#if`/`#ifdef`/`#ifndef` block. The search for the matching
/// `#elif`/`#else`/`#endif` is NOT nesting-aware (spec §4.5, §9): a directly
/// nested conditional inside either branch will confuse this search, a known
/// limitation.
fn handle_conditional(
    cursor: &mut Cursor,
    mut hash_pos: usize,
    initial_keyword: &str,
    macros: &MacroStore,
    config: &BuildConfig,
) -> Result<(), PreprocessError> {
    if !config.enable_conditional_directives {
        cursor.advance_to_eol();
        return Ok(());
    }

    let mut accepted = evaluate_condition(cursor, initial_keyword, macros);
    let mut seen_else = false;
    let mut this_line_eol = end_of_line_inclusive(cursor.buffer(), cursor.pos());

    loop {
        if accepted {
            cursor.splice(hash_pos, this_line_eol, "");
            let mut from = cursor.pos();
            // The accepted body runs up to the first terminator found; every
            // sibling `#elif`/`#else` from there through `#endif` is a
            // rejected branch and must be deleted in the same splice that
            // removes `#endif` itself (spec §4.5: "deletes all other branch
            // bodies and all directive lines of the block").
            let mut delete_from = None;
            loop {
                let Some((term_hash, term_kw, term_end)) =
                    cursor.seek_next_directive(from, &TERMINATOR_KEYWORDS)
                else {
                    return Err(eof_while_processing_directive(cursor, hash_pos));
                };
                let delete_from = *delete_from.get_or_insert(term_hash);
                match term_kw.as_str() {
                    "endif" => {
                        let endif_eol = end_of_line_inclusive(cursor.buffer(), term_end);
                        cursor.splice(delete_from, endif_eol, "");
                        return Ok(());
                    }
                    "else" => {
                        if seen_else {
                            return Err(duplicate_else(cursor, term_hash));
                        }
                        seen_else = true;
                        from = term_end;
                    }
                    _ => from = term_end,
                }
            }
        }

        let Some((term_hash, term_kw, term_end)) =
            cursor.seek_next_directive(cursor.pos(), &TERMINATOR_KEYWORDS)
        else {
            return Err(eof_while_processing_directive(cursor, hash_pos));
        };

        match term_kw.as_str() {
            "endif" => {
                let endif_eol = end_of_line_inclusive(cursor.buffer(), term_end);
                cursor.splice(hash_pos, endif_eol, "");
                return Ok(());
            }
            "else" => {
                if seen_else {
                    return Err(duplicate_else(cursor, term_hash));
                }
                seen_else = true;
                cursor.splice(hash_pos, term_hash, "");
                hash_pos = cursor.pos();
                cursor.set_pos(hash_pos + (term_end - term_hash));
                accepted = true;
                this_line_eol = end_of_line_inclusive(cursor.buffer(), cursor.pos());
            }
            _ => {
                cursor.splice(hash_pos, term_hash, "");
                hash_pos = cursor.pos();
                cursor.set_pos(hash_pos + (term_end - term_hash));
                accepted = evaluate_condition(cursor, "if", macros);
                this_line_eol = end_of_line_inclusive(cursor.buffer(), cursor.pos());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;

    fn run(name: &str, text: &str, config: &BuildConfig) -> Result<String, PreprocessError> {
        let mut macros = MacroStore::seed(&config.macros, name, "d", "t", "ts");
        let mut once_guarded = HashSet::new();
        process_source(
            name,
            text.to_string(),
            &mut macros,
            config,
            &config.sources,
            &mut once_guarded,
            0,
            "d",
            "t",
            "ts",
        )
    }

    #[test]
    fn define_and_reference_roundtrip() {
        let config = BuildConfig::new();
        let out = run("m", "#define GREETING hi\n__GREETING__!\n", &config).unwrap();
        assert_eq!(out, "\nhi!\n");
    }

    #[test]
    fn define_strips_one_layer_of_surrounding_quotes() {
        let config = BuildConfig::new();
        let out = run(
            "m",
            "#define RTX_ON \"true\"\n#if RTX_ON\nIt's awwwn!\n#endif\n",
            &config,
        )
        .unwrap();
        assert_eq!(out, "\nIt's awwwn!\n");
    }

    #[test]
    fn undefined_reference_is_a_parse_error() {
        let config = BuildConfig::new();
        let err = run("m", "__NOPE__\n", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::PreprocessErrorKind::Parse);
    }

    #[test]
    fn single_underscore_identifiers_never_trigger_expansion() {
        let config = BuildConfig::new();
        let out = run("m", "IM_AM_NOT_A_MACRO\n", &config).unwrap();
        assert_eq!(out, "IM_AM_NOT_A_MACRO\n");
    }

    #[test]
    fn condition_accepts_dunder_wrapped_name_as_equivalent() {
        let config = BuildConfig::new().with_macro("DEBUG", "1");
        let out = run("m", "#ifdef __DEBUG__\nyes\n#endif\n", &config).unwrap();
        assert_eq!(out, "yes\n");
    }

    #[test]
    fn ifdef_keeps_true_branch_only() {
        let config = BuildConfig::new().with_macro("FEATURE", "1");
        let out = run(
            "m",
            "a\n#ifdef FEATURE\nyes\n#else\nno\n#endif\nb\n",
            &config,
        )
        .unwrap();
        assert_eq!(out, "a\nyes\nb\n");
    }

    #[test]
    fn ifdef_false_keeps_else_branch() {
        let config = BuildConfig::new();
        let out = run(
            "m",
            "a\n#ifdef FEATURE\nyes\n#else\nno\n#endif\nb\n",
            &config,
        )
        .unwrap();
        assert_eq!(out, "a\nno\nb\n");
    }

    #[test]
    fn elif_chain_picks_first_true_branch() {
        let config = BuildConfig::new()
            .with_macro("MOON", "false")
            .with_macro("EARTH", "probably")
            .with_macro("FIRE", "true");
        let out = run(
            "m",
            "#if MOON\nIt's a moon\n#elif EARTH\nOh it's just earth.\n#else\nThat's no moon, it's a space station!\n#endif\n",
            &config,
        )
        .unwrap();
        assert_eq!(out, "Oh it's just earth.\n");
    }

    #[test]
    fn duplicate_else_in_an_accepted_branch_is_a_parse_error() {
        let config = BuildConfig::new().with_macro("A", "1");
        let err = run("m", "#if A\nyes\n#else\nn1\n#else\nn2\n#endif\n", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::PreprocessErrorKind::Parse);
    }

    #[test]
    fn duplicate_else_in_a_rejected_branch_is_a_parse_error() {
        let config = BuildConfig::new();
        let err = run("m", "#if A\nyes\n#else\nn1\n#else\nn2\n#endif\n", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::PreprocessErrorKind::Parse);
    }

    #[test]
    fn include_splices_target_contents() {
        let config = BuildConfig::new().with_source("inc.txt", "included\n");
        let out = run("m", "before\n#include \"inc.txt\"\nafter\n", &config).unwrap();
        assert_eq!(out, "before\nincluded\n\nafter\n");
    }

    #[test]
    fn quoted_include_falls_back_to_the_current_directory() {
        let config = BuildConfig::new().with_source("cool/b", "from b\n");
        let out = run("cool/a", "#include \"b\"\n", &config).unwrap();
        assert_eq!(out, "from b\n\n");
    }

    #[test]
    fn pragma_once_prevents_second_inclusion() {
        let config = BuildConfig::new().with_source("inc.txt", "#pragma once\nbody\n");
        let out = run("m", "#include \"inc.txt\"\n#include \"inc.txt\"\n", &config).unwrap();
        assert_eq!(out, "\nbody\n\n\n");
    }

    #[test]
    fn self_include_past_the_limit_is_a_preprocess_error() {
        let config = BuildConfig::new()
            .with_inclusion_limit(2)
            .with_source("loop.txt", "#include \"loop.txt\"\n");
        let err = run("m", "#include \"loop.txt\"\n", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::PreprocessErrorKind::Preprocess);
        assert!(err.message().contains("exceeded the limit of 2"));
    }

    #[test]
    fn unmatched_endif_is_a_parse_error() {
        let config = BuildConfig::new();
        let err = run("m", "#endif\n", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::PreprocessErrorKind::Parse);
    }

    #[test]
    fn ignore_unmatched_conditionals_passes_them_through() {
        let config = BuildConfig::new().ignore_unmatched_conditional_directives(true);
        let out = run("m", "#endif\n", &config).unwrap();
        assert_eq!(out, "#endif\n");
    }

    #[test]
    fn error_directive_fails_with_quoted_message() {
        let config = BuildConfig::new();
        let err = run("m", "#error \"boom\"\n", &config).unwrap_err();
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn redefining_a_builtin_macro_is_rejected() {
        let config = BuildConfig::new();
        let err = run("m", "#define FILE oops\n", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::PreprocessErrorKind::Preprocess);
    }

    #[test]
    fn unsupported_pragma_extension_is_a_preprocess_error() {
        let config = BuildConfig::new();
        let err = run("m", "#pragma unknown\n", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::PreprocessErrorKind::Preprocess);
    }
}
