use std::collections::HashMap;

/// Default inclusion depth limit (spec §3, §6).
pub const DEFAULT_INCLUSION_LIMIT: u32 = 4000;

/// Immutable configuration for a single preprocessing run (spec §3, §6).
///
/// Built with [`BuildConfig::new`] plus chained `#[must_use]` setters,
/// mirroring the teacher's `PreprocessorConfig::for_linux().with_compiler(..)`
/// style.
#[derive(Clone, Debug)]
pub struct BuildConfig {
    pub(crate) sources: HashMap<String, String>,
    pub(crate) main_sources: HashMap<String, String>,
    pub(crate) macros: HashMap<String, String>,
    pub(crate) inclusion_limit: u32,
    pub(crate) ignore_unmatched_conditional_directives: bool,
    pub(crate) enable_include_directives: bool,
    pub(crate) enable_conditional_directives: bool,
    pub(crate) enable_macro_define_directives: bool,
    pub(crate) enable_macro_undefine_directives: bool,
    pub(crate) enable_error_directives: bool,
    pub(crate) enable_pragma_directives: bool,
    pub(crate) enable_macro_expansion: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildConfig {
    /// An empty configuration with every directive enabled and the default
    /// inclusion limit, per spec §6's defaults.
    #[must_use]
    pub fn new() -> Self {
        BuildConfig {
            sources: HashMap::new(),
            main_sources: HashMap::new(),
            macros: HashMap::new(),
            inclusion_limit: DEFAULT_INCLUSION_LIMIT,
            ignore_unmatched_conditional_directives: false,
            enable_include_directives: true,
            enable_conditional_directives: true,
            enable_macro_define_directives: true,
            enable_macro_undefine_directives: true,
            enable_error_directives: true,
            enable_pragma_directives: true,
            enable_macro_expansion: true,
        }
    }

    /// Add a single source, available for inclusion and, absent any main
    /// sources, emitted in the result.
    #[must_use]
    pub fn with_source(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.sources.insert(name.into(), text.into());
        self
    }

    /// Add every (name, text) pair of `sources` at once.
    #[must_use]
    pub fn with_sources<I, S, T>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        for (name, text) in sources {
            self.sources.insert(name.into(), text.into());
        }
        self
    }

    /// Mark a source as a main source: one that is always emitted in the
    /// result, regardless of reachability via `#include`.
    #[must_use]
    pub fn with_main_source(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.main_sources.insert(name.into(), text.into());
        self
    }

    /// Mark every (name, text) pair of `main_sources` at once.
    #[must_use]
    pub fn with_main_sources<I, S, T>(mut self, main_sources: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        for (name, text) in main_sources {
            self.main_sources.insert(name.into(), text.into());
        }
        self
    }

    /// Predefine a user macro before the run starts.
    #[must_use]
    pub fn with_macro(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.macros.insert(name.into(), value.into());
        self
    }

    /// Predefine every (name, value) pair of `macros` at once.
    #[must_use]
    pub fn with_macros<I, S, T>(mut self, macros: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        for (name, value) in macros {
            self.macros.insert(name.into(), value.into());
        }
        self
    }

    /// Override the inclusion depth limit (default 4000).
    #[must_use]
    pub const fn with_inclusion_limit(mut self, limit: u32) -> Self {
        self.inclusion_limit = limit;
        self
    }

    /// When true, a rogue `#elif`/`#else`/`#endif` is left in the text
    /// verbatim instead of raising a parse error (spec §4.5).
    #[must_use]
    pub const fn ignore_unmatched_conditional_directives(mut self, ignore: bool) -> Self {
        self.ignore_unmatched_conditional_directives = ignore;
        self
    }

    /// Toggle `#include` processing.
    #[must_use]
    pub const fn enable_include_directives(mut self, enable: bool) -> Self {
        self.enable_include_directives = enable;
        self
    }

    /// Toggle `#if`/`#ifdef`/`#ifndef`/`#elif`/`#else`/`#endif` processing.
    #[must_use]
    pub const fn enable_conditional_directives(mut self, enable: bool) -> Self {
        self.enable_conditional_directives = enable;
        self
    }

    /// Toggle `#define` processing.
    #[must_use]
    pub const fn enable_macro_define_directives(mut self, enable: bool) -> Self {
        self.enable_macro_define_directives = enable;
        self
    }

    /// Toggle `#undef` processing.
    #[must_use]
    pub const fn enable_macro_undefine_directives(mut self, enable: bool) -> Self {
        self.enable_macro_undefine_directives = enable;
        self
    }

    /// Toggle `#error` processing.
    #[must_use]
    pub const fn enable_error_directives(mut self, enable: bool) -> Self {
        self.enable_error_directives = enable;
        self
    }

    /// Toggle `#pragma` processing.
    #[must_use]
    pub const fn enable_pragma_directives(mut self, enable: bool) -> Self {
        self.enable_pragma_directives = enable;
        self
    }

    /// Toggle `__NAME__` macro-reference expansion.
    #[must_use]
    pub const fn enable_macro_expansion(mut self, enable: bool) -> Self {
        self.enable_macro_expansion = enable;
        self
    }

    /// Disable every directive (`include`, `conditional`, `define`, `undef`,
    /// `error`, `pragma`) at once. Macro expansion is independent and
    /// unaffected.
    #[must_use]
    pub const fn disable_all_directives(mut self) -> Self {
        self.enable_include_directives = false;
        self.enable_conditional_directives = false;
        self.enable_macro_define_directives = false;
        self.enable_macro_undefine_directives = false;
        self.enable_error_directives = false;
        self.enable_pragma_directives = false;
        self
    }

    /// Enable every directive at once. Macro expansion is independent and
    /// unaffected.
    #[must_use]
    pub const fn enable_all_directives(mut self) -> Self {
        self.enable_include_directives = true;
        self.enable_conditional_directives = true;
        self.enable_macro_define_directives = true;
        self.enable_macro_undefine_directives = true;
        self.enable_error_directives = true;
        self.enable_pragma_directives = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = BuildConfig::new();
        assert_eq!(cfg.inclusion_limit, DEFAULT_INCLUSION_LIMIT);
        assert!(!cfg.ignore_unmatched_conditional_directives);
        assert!(cfg.enable_include_directives);
        assert!(cfg.enable_macro_expansion);
    }

    #[test]
    fn disable_all_directives_spares_macro_expansion() {
        let cfg = BuildConfig::new().disable_all_directives();
        assert!(!cfg.enable_include_directives);
        assert!(!cfg.enable_pragma_directives);
        assert!(cfg.enable_macro_expansion);
    }
}
