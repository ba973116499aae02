//! iCalendar parsing error types.

use std::fmt;

pub type ParseResult<T> = Result<T, ParseError>;

/// A syntax error with its 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{kind} at line {line}, column {column}{}",
    .context.as_deref().map(|c| format!(": {c}")).unwrap_or_default()
)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: usize,
    pub column: usize,
    /// Offending input or a hint, when one is known.
    pub context: Option<String>,
}

impl ParseError {
    #[must_use]
    pub fn new(kind: ParseErrorKind, line: usize, column: usize) -> Self {
        Self {
            kind,
            line,
            column,
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Kinds of parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingPropertyName,
    InvalidPropertyName,
    MissingColon,
    InvalidParameter,
    UnclosedQuote,
    InvalidDate,
    InvalidDateTime,
    InvalidDuration,
    InvalidRecur,
    InvalidUtcOffset,
    InvalidPeriod,
    InvalidInteger,
    InvalidBoolean,
    MissingBegin,
    MissingEnd,
    MismatchedComponent,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingPropertyName => "missing property name",
            Self::InvalidPropertyName => "invalid property name",
            Self::MissingColon => "missing colon separator",
            Self::InvalidParameter => "invalid parameter format",
            Self::UnclosedQuote => "unclosed quoted string",
            Self::InvalidDate => "invalid date format",
            Self::InvalidDateTime => "invalid date-time format",
            Self::InvalidDuration => "invalid duration format",
            Self::InvalidRecur => "invalid recurrence rule",
            Self::InvalidUtcOffset => "invalid UTC offset format",
            Self::InvalidPeriod => "invalid period format",
            Self::InvalidInteger => "invalid integer value",
            Self::InvalidBoolean => "invalid boolean value",
            Self::MissingBegin => "missing BEGIN line",
            Self::MissingEnd => "missing END line",
            Self::MismatchedComponent => "mismatched BEGIN/END",
        };
        f.write_str(text)
    }
}
