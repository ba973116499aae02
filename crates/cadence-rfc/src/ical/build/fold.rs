//! Content line folding (RFC 5545 §3.1).

/// Lines longer than this many octets are folded.
const MAX_LINE_OCTETS: usize = 75;

/// Folds a content line and terminates it with CRLF.
///
/// Continuation lines start with a single space and never split a UTF-8
/// sequence.
#[must_use]
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return format!("{line}\r\n");
    }

    let mut result = String::with_capacity(line.len() + (line.len() / MAX_LINE_OCTETS + 1) * 3);
    let mut rest = line;
    let mut limit = MAX_LINE_OCTETS;

    while rest.len() > limit {
        let mut end = limit;
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        result.push_str(&rest[..end]);
        result.push_str("\r\n ");
        rest = &rest[end..];
        // The leading space counts toward the continuation's length.
        limit = MAX_LINE_OCTETS - 1;
    }

    result.push_str(rest);
    result.push_str("\r\n");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_are_untouched() {
        assert_eq!(fold_line("UID:1"), "UID:1\r\n");
    }

    #[test]
    fn long_lines_fold_at_octet_limit() {
        let line = format!("SUMMARY:{}", "x".repeat(200));
        let folded = fold_line(&line);
        for physical in folded.split("\r\n").filter(|l| !l.is_empty()) {
            assert!(physical.len() <= MAX_LINE_OCTETS);
        }
        let unfolded = folded.replace("\r\n ", "");
        assert_eq!(unfolded, format!("{line}\r\n"));
    }

    #[test]
    fn multibyte_characters_are_not_split() {
        let line = format!("SUMMARY:{}", "é".repeat(80));
        let folded = fold_line(&line);
        assert_eq!(folded.replace("\r\n ", ""), format!("{line}\r\n"));
    }
}
