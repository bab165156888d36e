use std::fmt;

/// Which of the two error categories in spec §7 this error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreprocessErrorKind {
    /// A runtime failure: missing include, inclusion limit, `#error`, bad pragma, ...
    Preprocess,
    /// A structural failure: malformed directive, unmatched conditional, ...
    Parse,
}

/// An error raised while processing a source. Carries the source name and
/// the precise `(line, column)` of the offending byte, both 0-origin, per
/// spec §6/§7.
#[derive(Clone, Debug)]
pub struct PreprocessError {
    kind: PreprocessErrorKind,
    source_name: String,
    line: usize,
    column: usize,
    message: String,
}

impl PreprocessError {
    /// Build a preprocess-kind error anchored at `(line, column)` in `source_name`.
    pub fn preprocess(
        source_name: impl Into<String>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        PreprocessError {
            kind: PreprocessErrorKind::Preprocess,
            source_name: source_name.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Build a parse-kind error anchored at `(line, column)` in `source_name`.
    pub fn parse(
        source_name: impl Into<String>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        PreprocessError {
            kind: PreprocessErrorKind::Parse,
            source_name: source_name.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Which category this error falls into.
    #[must_use]
    pub const fn kind(&self) -> PreprocessErrorKind {
        self.kind
    }

    /// Name of the source the error was raised while processing.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// 0-origin line of the offending byte.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// 0-origin column of the offending byte.
    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }

    /// The error message, without the `Error processing NAME(LINE,COL): ` prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            PreprocessErrorKind::Parse => "Parse error: ",
            PreprocessErrorKind::Preprocess => "",
        };
        write!(
            f,
            "Error processing {}({},{}): {}{}",
            self.source_name, self.line, self.column, prefix, self.message
        )
    }
}

impl std::error::Error for PreprocessError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_error_has_no_parse_prefix() {
        let err = PreprocessError::preprocess("main.txt", 2, 5, "boom");
        assert_eq!(format!("{err}"), "Error processing main.txt(2,5): boom");
    }

    #[test]
    fn parse_error_carries_prefix() {
        let err = PreprocessError::parse(
            "main.txt",
            0,
            0,
            "#define directive is missing name of macro.",
        );
        assert_eq!(
            format!("{err}"),
            "Error processing main.txt(0,0): Parse error: #define directive is missing name of macro."
        );
    }
}
