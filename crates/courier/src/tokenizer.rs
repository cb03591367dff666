//! Splits command input into tokens.
//!
//! The grammar is the first record of a CSV document whose field separator is
//! a single space:
//!
//! - every space separates two fields, so `a  b` is `["a", "", "b"]`
//! - a field that starts with `"` is quoted and may contain spaces and line
//!   breaks; `""` inside it stands for one literal quote
//! - a quote anywhere else in an unquoted field is an error
//! - a closing quote must be followed by a space or the end of the record
//! - an unquoted line break ends the record; anything after it is ignored
//! - blank lines before the record are skipped, so blank input has no tokens

use thiserror::Error;

const SEPARATOR: char = ' ';
const QUOTE: char = '"';

/// Errors that can occur while tokenizing input.
///
/// Each variant carries the index of the token that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    /// A quote appeared inside an unquoted field.
    #[error("bare \" in non-quoted field")]
    BareQuote {
        /// Index of the offending token.
        index: usize,
    },

    /// A closing quote was followed by something other than a separator.
    #[error("extraneous \" in quoted field")]
    ExtraneousQuote {
        /// Index of the offending token.
        index: usize,
    },

    /// Input ended inside a quoted field.
    #[error("missing closing \" in quoted field")]
    UnterminatedQuote {
        /// Index of the offending token.
        index: usize,
    },
}

impl TokenizeError {
    /// Returns the index of the token that failed to parse.
    pub fn index(&self) -> usize {
        match self {
            Self::BareQuote { index }
            | Self::ExtraneousQuote { index }
            | Self::UnterminatedQuote { index } => *index,
        }
    }
}

/// Tokenizes one line of command input.
pub fn tokenize(input: &str) -> Result<Vec<String>, TokenizeError> {
    let mut lines = input.split_inclusive('\n').map(normalize_line);

    let first = lines.find(|line| !line.is_empty() && line != "\n");
    match first {
        Some(line) => read_record(line, &mut lines),
        None => Ok(Vec::new()),
    }
}

/// Folds a trailing `\r\n` into `\n` and drops a lone `\r` at end of input.
fn normalize_line(line: &str) -> String {
    if let Some(body) = line.strip_suffix("\r\n") {
        format!("{body}\n")
    } else if !line.ends_with('\n') {
        line.strip_suffix('\r').unwrap_or(line).to_owned()
    } else {
        line.to_owned()
    }
}

fn strip_newline(s: &str) -> &str {
    s.strip_suffix('\n').unwrap_or(s)
}

fn read_record(
    mut line: String,
    lines: &mut impl Iterator<Item = String>,
) -> Result<Vec<String>, TokenizeError> {
    let mut fields = Vec::new();
    let mut pos = 0;

    'fields: loop {
        let index = fields.len();
        let rest = &line[pos..];

        if !rest.starts_with(QUOTE) {
            let (field, next) = match rest.find(SEPARATOR) {
                Some(i) => (&rest[..i], Some(pos + i + SEPARATOR.len_utf8())),
                None => (strip_newline(rest), None),
            };
            if field.contains(QUOTE) {
                return Err(TokenizeError::BareQuote { index });
            }
            fields.push(field.to_owned());

            match next {
                Some(next) => {
                    pos = next;
                    continue;
                }
                None => break,
            }
        }

        let mut field = String::new();
        pos += QUOTE.len_utf8();

        loop {
            let rest = &line[pos..];
            match rest.find(QUOTE) {
                Some(i) => {
                    field.push_str(&rest[..i]);
                    pos += i + QUOTE.len_utf8();

                    match line[pos..].chars().next() {
                        Some(QUOTE) => {
                            field.push(QUOTE);
                            pos += QUOTE.len_utf8();
                        }
                        Some(SEPARATOR) => {
                            pos += SEPARATOR.len_utf8();
                            fields.push(field);
                            continue 'fields;
                        }
                        None | Some('\n') => {
                            fields.push(field);
                            break 'fields;
                        }
                        Some(_) => return Err(TokenizeError::ExtraneousQuote { index }),
                    }
                }
                None if !rest.is_empty() => {
                    // The quoted field spans onto the next line.
                    field.push_str(rest);
                    match lines.next() {
                        Some(next) => {
                            line = next;
                            pos = 0;
                        }
                        None => return Err(TokenizeError::UnterminatedQuote { index }),
                    }
                }
                None => return Err(TokenizeError::UnterminatedQuote { index }),
            }
        }
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<String> {
        tokenize(input).unwrap()
    }

    #[test]
    fn test_plain_words() {
        assert_eq!(tokens("echo hello world"), ["echo", "hello", "world"]);
        assert_eq!(tokens("ping"), ["ping"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokens("").is_empty());
        assert!(tokens("\n\r\n").is_empty());
    }

    #[test]
    fn test_consecutive_spaces_yield_empty_fields() {
        assert_eq!(tokens("a  b"), ["a", "", "b"]);
        assert_eq!(tokens("a "), ["a", ""]);
        assert_eq!(tokens(" a"), ["", "a"]);
    }

    #[test]
    fn test_quoted_fields() {
        assert_eq!(tokens(r#"say "hello world""#), ["say", "hello world"]);
        assert_eq!(tokens(r#"say "a ""b"" c" d"#), ["say", r#"a "b" c"#, "d"]);
        assert_eq!(tokens(r#""""#), [""]);
    }

    #[test]
    fn test_quoted_field_spans_lines() {
        assert_eq!(tokens("note \"line one\nline two\" end"), [
            "note",
            "line one\nline two",
            "end"
        ]);
        assert_eq!(tokens("note \"a\r\nb\""), ["note", "a\nb"]);
    }

    #[test]
    fn test_newline_ends_record() {
        assert_eq!(tokens("first line\nsecond line"), ["first", "line"]);
        assert_eq!(tokens("first\r\nsecond"), ["first"]);
        assert_eq!(tokens("\n\nlate start"), ["late", "start"]);
    }

    #[test]
    fn test_trailing_carriage_return_dropped() {
        assert_eq!(tokens("ping\r"), ["ping"]);
    }

    #[test]
    fn test_non_ascii_content() {
        assert_eq!(tokens("say こんにちは \"世界 ー\""), ["say", "こんにちは", "世界 ー"]);
    }

    #[test]
    fn test_bare_quote() {
        let err = tokenize(r#"say he"llo"#).unwrap_err();
        assert_eq!(err, TokenizeError::BareQuote { index: 1 });
        assert_eq!(err.index(), 1);
    }

    #[test]
    fn test_extraneous_quote() {
        let err = tokenize(r#"say "hello"world"#).unwrap_err();
        assert_eq!(err, TokenizeError::ExtraneousQuote { index: 1 });
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            tokenize(r#"a b "open"#).unwrap_err(),
            TokenizeError::UnterminatedQuote { index: 2 }
        );
        assert_eq!(
            tokenize("a \"open\nstill open").unwrap_err(),
            TokenizeError::UnterminatedQuote { index: 1 }
        );
    }

    #[test]
    fn test_error_display() {
        let err = TokenizeError::BareQuote { index: 0 };
        assert_eq!(err.to_string(), "bare \" in non-quoted field");
    }
}
