//! Shell-style splitting and quoting of PDBx value lines.
//!
//! Splitting follows POSIX shell rules: whitespace separates tokens, single
//! quotes are literal, double quotes allow `\"` and `\\` escapes, and a
//! backslash outside quotes escapes the next character. Adjacent quoted and
//! unquoted parts join into one token.

use molstack_core::{MolError, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Between,
    Word,
    Single,
    Double,
}

/// Split a line into tokens.
///
/// # Errors
///
/// Returns [`MolError::Parse`] for an unterminated quote or a trailing
/// backslash.
pub fn split(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut state = State::Between;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Between | State::Word => match c {
                c if c.is_whitespace() => {
                    if state == State::Word {
                        tokens.push(std::mem::take(&mut current));
                        state = State::Between;
                    }
                }
                '\'' => state = State::Single,
                '"' => state = State::Double,
                '\\' => {
                    let escaped = chars.next().ok_or_else(|| {
                        MolError::Parse(format!("no escaped character in '{}'", line))
                    })?;
                    current.push(escaped);
                    state = State::Word;
                }
                c => {
                    current.push(c);
                    state = State::Word;
                }
            },
            State::Single => match c {
                '\'' => state = State::Word,
                c => current.push(c),
            },
            State::Double => match c {
                '"' => state = State::Word,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => {
                        return Err(MolError::Parse(format!(
                            "no closing quotation in '{}'",
                            line
                        )))
                    }
                },
                c => current.push(c),
            },
        }
    }

    match state {
        State::Single | State::Double => Err(MolError::Parse(format!(
            "no closing quotation in '{}'",
            line
        ))),
        State::Word => {
            tokens.push(current);
            Ok(tokens)
        }
        State::Between => Ok(tokens),
    }
}

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c)
}

/// Values that would read as a key, block header or loop start when written
/// bare at the beginning of a line.
fn is_reserved(value: &str) -> bool {
    if value.starts_with('_') {
        return true;
    }
    let lower = value.to_ascii_lowercase();
    ["data_", "loop_", "save_", "global_"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Quote a value so that [`split`] returns it as a single token.
///
/// Empty values become `''`; values made of safe characters are returned
/// unchanged unless they start like a key or a reserved word; everything
/// else is single-quoted with embedded `'` written as `'"'"'`.
pub fn quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    if value.chars().all(is_safe) && !is_reserved(value) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain() {
        assert_eq!(
            split("ATOM 1  N   N").unwrap(),
            vec!["ATOM", "1", "N", "N"]
        );
        assert!(split("   ").unwrap().is_empty());
    }

    #[test]
    fn split_quotes() {
        assert_eq!(
            split("_struct.title 'Crystal structure'").unwrap(),
            vec!["_struct.title", "Crystal structure"]
        );
        assert_eq!(split("\"O5'\" x").unwrap(), vec!["O5'", "x"]);
        assert_eq!(split("a'b c'd").unwrap(), vec!["ab cd"]);
        assert_eq!(split("'' x").unwrap(), vec!["", "x"]);
    }

    #[test]
    fn split_escapes() {
        assert_eq!(split(r"a\ b").unwrap(), vec!["a b"]);
        assert_eq!(split(r#""say \"hi\"""#).unwrap(), vec![r#"say "hi""#]);
        assert_eq!(split(r#""a\nb""#).unwrap(), vec![r"a\nb"]);
        assert_eq!(split(r"'a\b'").unwrap(), vec![r"a\b"]);
    }

    #[test]
    fn split_errors() {
        assert!(split("'open").is_err());
        assert!(split("\"open").is_err());
        assert!(split("trailing\\").is_err());
    }

    #[test]
    fn quote_rules() {
        assert_eq!(quote(""), "''");
        assert_eq!(quote("CA"), "CA");
        assert_eq!(quote("1.5e-3"), "1.5e-3");
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote("O5'"), "'O5'\"'\"''");
        assert_eq!(quote("?"), "'?'");
    }

    #[test]
    fn quote_reserved_prefixes() {
        assert_eq!(quote("_x.y"), "'_x.y'");
        assert_eq!(quote("_nodot"), "'_nodot'");
        assert_eq!(quote("data_foo"), "'data_foo'");
        assert_eq!(quote("DATA_foo"), "'DATA_foo'");
        assert_eq!(quote("loop_"), "'loop_'");
        assert_eq!(quote("save_x"), "'save_x'");
        assert_eq!(quote("global_"), "'global_'");
        assert_eq!(quote("#1"), "'#1'");
        assert_eq!(quote(";x"), "';x'");
        assert_eq!(quote("x_data_"), "x_data_");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn quote_then_split_is_identity(value in "[ -~]{0,24}") {
            let quoted = quote(&value);
            prop_assert_eq!(split(&quoted).unwrap(), vec![value]);
        }

        #[test]
        fn reserved_values_never_start_a_line_bare(
            prefix in "(_|#|;|'|\"|data_|DATA_|loop_|save_|global_)",
            rest in "[A-Za-z0-9_.]{0,12}",
        ) {
            let value = format!("{}{}", prefix, rest);
            let quoted = quote(&value);
            prop_assert!(quoted.starts_with('\''));
            prop_assert_eq!(split(&quoted).unwrap(), vec![value]);
        }

        #[test]
        fn quoted_values_stay_separate(a in "[ -~]{0,12}", b in "[ -~]{0,12}") {
            let line = format!("{} {}", quote(&a), quote(&b));
            prop_assert_eq!(split(&line).unwrap(), vec![a, b]);
        }
    }
}
