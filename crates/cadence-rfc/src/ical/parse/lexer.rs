//! Content line lexer for iCalendar (RFC 5545 §3.1).
//!
//! Handles line unfolding and tokenization of content lines.

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::ical::core::Parameter;

/// A raw content line before value typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Property name (normalized to uppercase).
    pub name: String,
    pub params: Vec<Parameter>,
    /// Value text after unfolding, still escaped.
    pub raw_value: String,
}

impl ContentLine {
    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))?
            .value()
    }
}

/// Splits input into content lines, merging folded continuations.
///
/// Handles both CRLF and bare LF line endings. Lines starting with SP/HTAB are
/// continuations of the previous line; unfolding drops the line break and the
/// single whitespace character. Returned tuples carry the 1-based line number
/// where each logical line starts.
#[must_use]
pub fn split_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (i, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(continuation) = line.strip_prefix([' ', '\t']) {
            match lines.last_mut() {
                Some((_, prev)) => prev.push_str(continuation),
                None => lines.push((i + 1, continuation.to_string())),
            }
        } else {
            lines.push((i + 1, line.to_string()));
        }
    }

    lines
}

/// Parses a single content line.
///
/// Format: `name *(";" param) ":" value`
///
/// ## Errors
/// Returns an error if the line is malformed or contains invalid characters.
pub fn parse_content_line(line: &str, line_num: usize) -> ParseResult<ContentLine> {
    let name_end = line
        .find([';', ':'])
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingColon, line_num, line.len()))?;

    if name_end == 0 {
        return Err(ParseError::new(
            ParseErrorKind::MissingPropertyName,
            line_num,
            1,
        ));
    }

    if let Some(bad) = line[..name_end]
        .char_indices()
        .find(|&(_, c)| !c.is_ascii_alphanumeric() && c != '-')
    {
        return Err(ParseError::new(
            ParseErrorKind::InvalidPropertyName,
            line_num,
            bad.0 + 1,
        ));
    }

    let name = line[..name_end].to_ascii_uppercase();
    let mut params = Vec::new();
    let mut rest = &line[name_end..];
    let mut offset = name_end;

    while let Some(after) = rest.strip_prefix(';') {
        let (param, consumed) = parse_parameter(after, line_num, offset + 2)?;
        params.push(param);
        rest = &after[consumed..];
        offset += 1 + consumed;
    }

    let value = rest
        .strip_prefix(':')
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingColon, line_num, offset + 1))?;

    Ok(ContentLine {
        name,
        params,
        raw_value: value.to_string(),
    })
}

/// Parses `name=value[,value]` up to (not including) the `;` or `:` that
/// ends it. Returns the parameter and the number of bytes consumed.
fn parse_parameter(input: &str, line_num: usize, column: usize) -> ParseResult<(Parameter, usize)> {
    let eq = input
        .find('=')
        .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidParameter, line_num, column))?;
    let name = &input[..eq];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ParseError::new(
            ParseErrorKind::InvalidParameter,
            line_num,
            column,
        ));
    }

    let mut values = Vec::new();
    let mut pos = eq + 1;

    loop {
        let remaining = &input[pos..];
        if let Some(quoted) = remaining.strip_prefix('"') {
            let close = quoted.find('"').ok_or_else(|| {
                ParseError::new(ParseErrorKind::UnclosedQuote, line_num, column + pos)
            })?;
            values.push(decode_caret(&quoted[..close]));
            pos += close + 2;
        } else {
            let end = remaining.find([',', ';', ':']).unwrap_or(remaining.len());
            values.push(remaining[..end].to_string());
            pos += end;
        }

        match input[pos..].chars().next() {
            Some(',') => pos += 1,
            Some(';' | ':') => return Ok((Parameter::with_values(name, values), pos)),
            Some(c) => {
                return Err(
                    ParseError::new(ParseErrorKind::InvalidParameter, line_num, column + pos)
                        .with_context(format!("unexpected character '{c}'")),
                );
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingColon,
                    line_num,
                    column + pos,
                ));
            }
        }
    }
}

/// Decodes RFC 6868 caret escapes in a quoted parameter value.
fn decode_caret(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '^' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('^') => out.push('^'),
            Some('n' | 'N') => out.push('\n'),
            Some('\'') => out.push('"'),
            _ => {
                out.push('^');
                continue;
            }
        }
        chars.next();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfolds_continuations() {
        let lines = split_lines("SUMMARY:Long\r\n  text\r\nUID:1\r\n");
        assert_eq!(lines, vec![(1, "SUMMARY:Long text".to_string()), (3, "UID:1".to_string())]);
    }

    #[test]
    fn parses_quoted_parameters() {
        let cl = parse_content_line(
            "DTSTART;TZID=\"America/New_York\";X-A=a,b:20240101T090000",
            1,
        )
        .expect("valid line");
        assert_eq!(cl.name, "DTSTART");
        assert_eq!(cl.get_param_value("tzid"), Some("America/New_York"));
        assert_eq!(cl.params[1].values, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cl.raw_value, "20240101T090000");
    }

    #[test]
    fn colon_inside_quotes_is_not_a_separator() {
        let cl = parse_content_line("ATTENDEE;CN=\"Doe: Jane\":mailto:jane@example.com", 1)
            .expect("valid line");
        assert_eq!(cl.get_param_value("CN"), Some("Doe: Jane"));
        assert_eq!(cl.raw_value, "mailto:jane@example.com");
    }

    #[test]
    fn empty_value_is_allowed() {
        let cl = parse_content_line("DESCRIPTION:", 1).expect("valid line");
        assert_eq!(cl.raw_value, "");
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = parse_content_line("NOCOLON", 4).expect_err("missing colon");
        assert_eq!(err.kind, ParseErrorKind::MissingColon);
        assert_eq!(err.line, 4);

        let err = parse_content_line(":value", 1).expect_err("missing name");
        assert_eq!(err.kind, ParseErrorKind::MissingPropertyName);

        let err = parse_content_line("X;P=\"open:1", 1).expect_err("unclosed quote");
        assert_eq!(err.kind, ParseErrorKind::UnclosedQuote);
    }

    #[test]
    fn caret_decoding() {
        assert_eq!(decode_caret("a^^b^nc^'d^x"), "a^b\nc\"d^x");
    }
}
