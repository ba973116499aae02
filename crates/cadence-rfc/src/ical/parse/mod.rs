//! iCalendar parser (RFC 5545).

mod error;
mod lexer;
mod parser;
mod values;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use lexer::{ContentLine, parse_content_line, split_lines};
pub use parser::{parse, parse_property};
pub use values::{parse_date, parse_datetime, parse_duration, parse_recur};
