use crate::error::{RfcError, RfcResult};

/// Parameters and value text split out of an encoded value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedValue {
    /// `(name, value)` pairs in order of appearance, quotes removed.
    pub params: Vec<(String, String)>,
    pub value: String,
}

impl ParsedValue {
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// ## Summary
/// Splits `;NAME=value[;NAME="value"]:text` into parameters and text.
///
/// Input that does not start with `;` is taken as bare value text.
///
/// ## Errors
/// Returns `RfcError::MalformedValue` for a missing `=`, an unterminated
/// quote, a parameter not followed by `;` or `:`, or an empty value.
pub fn parse_value(text: &str) -> RfcResult<ParsedValue> {
    let Some(mut rest) = text.strip_prefix(';') else {
        return Ok(ParsedValue {
            params: Vec::new(),
            value: text.to_string(),
        });
    };

    let mut params = Vec::new();
    loop {
        let Some((name, after_name)) = rest.split_once('=') else {
            return Err(malformed("expected =", text));
        };
        if name.is_empty() || name.contains([':', ';', '"']) {
            return Err(malformed("expected parameter name", text));
        }

        let (value, after_value) = if let Some(quoted) = after_name.strip_prefix('"') {
            let Some(end) = quoted.find('"') else {
                return Err(malformed("unclosed quote", text));
            };
            (&quoted[..end], &quoted[end + 1..])
        } else {
            let end = after_name.find([';', ':']).unwrap_or(after_name.len());
            (&after_name[..end], &after_name[end..])
        };
        params.push((name.to_string(), value.to_string()));

        if let Some(next) = after_value.strip_prefix(';') {
            rest = next;
        } else if let Some(value) = after_value.strip_prefix(':') {
            if value.is_empty() {
                return Err(malformed("missing value", text));
            }
            return Ok(ParsedValue {
                params,
                value: value.to_string(),
            });
        } else {
            return Err(malformed("expected either : or ;", text));
        }
    }
}

fn malformed(reason: &str, text: &str) -> RfcError {
    RfcError::MalformedValue(format!("{reason} in {text:?}"))
}
