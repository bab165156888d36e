//! The macro map shared across a whole top-level source and its transitive
//! includes (spec §3). Built-in names are reserved from redefinition and
//! undefinition.

use std::collections::HashMap;

/// Names in the reserved set (spec §3). `#define`/`#undef` targeting any of
/// these fails with a preprocess error.
pub const BUILTIN_NAMES: [&str; 5] = ["FILE", "LINE", "DATE", "TIME", "TIMESTAMP"];

/// Whether `name` is one of the reserved built-in macro names.
#[must_use]
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// A macro's stored value. `#define NAME` with nothing after it stores a
/// null value; `#define NAME value` stores `Value(value)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroValue {
    /// `#define NAME` with no trailing value.
    Null,
    /// `#define NAME value`.
    Value(String),
}

impl MacroValue {
    /// Condition truthiness per spec §4.5's table: a name is "truthy" if it
    /// exists, is not null, is not the literal `"0"`, and is not `"false"`
    /// case-insensitively.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            MacroValue::Null => false,
            MacroValue::Value(v) => v != "0" && !v.eq_ignore_ascii_case("false"),
        }
    }

    /// The stored text, or an empty string for a null value — used when
    /// splicing a macro reference's expansion into the buffer.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            MacroValue::Null => "",
            MacroValue::Value(v) => v,
        }
    }
}

/// The mapping from macro name to value for one processing run, shared by
/// reference through `#include` recursion but never across distinct
/// top-level sources (spec §3, §9).
#[derive(Clone, Debug, Default)]
pub struct MacroStore {
    macros: HashMap<String, MacroValue>,
}

impl MacroStore {
    /// An empty store with no entries, not even the built-ins — callers use
    /// [`MacroStore::seed`] to produce a ready-to-run store.
    #[must_use]
    pub fn new() -> Self {
        MacroStore {
            macros: HashMap::new(),
        }
    }

    /// Seed a store with user-provided macros, then overlay the reserved
    /// built-in names (`FILE`, `DATE`, `TIME`, `TIMESTAMP` with their
    /// concrete values, `LINE` with a non-empty existence sentinel), per
    /// entry point step 2 (spec §4.1). Built-ins always win over a
    /// user-provided macro of the same name.
    #[must_use]
    pub fn seed(
        user_macros: &HashMap<String, String>,
        file: &str,
        date: &str,
        time: &str,
        timestamp: &str,
    ) -> Self {
        let mut store = MacroStore::new();
        for (name, value) in user_macros {
            store
                .macros
                .insert(name.clone(), MacroValue::Value(value.clone()));
        }
        store
            .macros
            .insert("FILE".to_string(), MacroValue::Value(file.to_string()));
        store
            .macros
            .insert("LINE".to_string(), MacroValue::Value(String::new()));
        store
            .macros
            .insert("DATE".to_string(), MacroValue::Value(date.to_string()));
        store
            .macros
            .insert("TIME".to_string(), MacroValue::Value(time.to_string()));
        store.macros.insert(
            "TIMESTAMP".to_string(),
            MacroValue::Value(timestamp.to_string()),
        );
        store
    }

    /// Rebind `FILE` to `name`, entering a new file context (spec §3).
    pub fn set_file(&mut self, name: &str) {
        self.macros
            .insert("FILE".to_string(), MacroValue::Value(name.to_string()));
    }

    /// The current value bound to `FILE`.
    #[must_use]
    pub fn file(&self) -> String {
        match self.macros.get("FILE") {
            Some(MacroValue::Value(v)) => v.clone(),
            _ => String::new(),
        }
    }

    /// Whether `name` is currently defined (built-in or user).
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// The stored value of `name`, if defined.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MacroValue> {
        self.macros.get(name)
    }

    /// Store `name -> value`. Caller is responsible for rejecting built-in
    /// names first (spec §4.6) — this only performs the raw mutation.
    pub fn define(&mut self, name: &str, value: MacroValue) {
        self.macros.insert(name.to_string(), value);
    }

    /// Remove `name`'s entry, if any. Absence after undef is not an error
    /// (spec §4.7).
    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_rules() {
        assert!(!MacroValue::Null.is_truthy());
        assert!(!MacroValue::Value("0".to_string()).is_truthy());
        assert!(!MacroValue::Value("false".to_string()).is_truthy());
        assert!(!MacroValue::Value("FALSE".to_string()).is_truthy());
        assert!(MacroValue::Value("probably".to_string()).is_truthy());
        assert!(MacroValue::Value(String::new()).is_truthy());
    }

    #[test]
    fn seed_overlays_builtins_over_user_macros() {
        let mut user = HashMap::new();
        user.insert("FILE".to_string(), "user-supplied".to_string());
        let store = MacroStore::seed(&user, "main.txt", "d", "t", "ts");
        assert_eq!(store.file(), "main.txt");
    }

    #[test]
    fn line_exists_without_a_literal_value() {
        let store = MacroStore::seed(&HashMap::new(), "main.txt", "d", "t", "ts");
        assert!(store.is_defined("LINE"));
    }

    #[test]
    fn undef_of_missing_name_is_not_an_error() {
        let mut store = MacroStore::new();
        store.undef("NEVER_DEFINED");
        assert!(!store.is_defined("NEVER_DEFINED"));
    }

    #[test]
    fn is_builtin_rejects_reserved_names_only() {
        assert!(is_builtin("FILE"));
        assert!(is_builtin("TIMESTAMP"));
        assert!(!is_builtin("PI"));
    }
}
