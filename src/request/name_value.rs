//! Name-value argument lists, e.g. the arguments of `FUNC(a=1, b='x,y', /flag)`.
//!
//! Pairs are separated by `,` unless the list carries its own
//! `delimiter='X'` pair. Delimiters inside quotes do not split. A token
//! without `=` is a keyword: `/flag` becomes `flag=true`, any other token is
//! a placeholder whose name and value are both the token.

use crate::error::{Result, UdaError};
use crate::request::NameValue;
use crate::strings::{find_case_insensitive, strip_matching_quotes};

/// Default pair delimiter.
pub const DEFAULT_PAIR_DELIMITER: char = ',';

// Stands in for delimiters that must not split while tokenizing.
const PROTECTED: char = '\u{1}';

/// Locate a self-describing `delimiter='X'` pair.
///
/// Returns the proposed delimiter and the byte offset of its quoted
/// character, or `None` when the list uses the default.
fn find_delimiter_pair(text: &str) -> Result<Option<(char, usize)>> {
    let Some(at) = find_case_insensitive(text, "delimiter") else {
        return Ok(None);
    };

    let after = &text[at + "delimiter".len()..];
    let rest = after.trim_start();
    let Some(rest) = rest.strip_prefix('=') else {
        return Ok(None);
    };
    let value = rest.trim_start();
    let mut chars = value.chars();
    let (Some(open), Some(proposal), Some(close)) = (chars.next(), chars.next(), chars.next())
    else {
        return Ok(None);
    };
    if !(open == close && (open == '\'' || open == '"')) {
        return Ok(None);
    }
    let offset = text.len() - value.len() + open.len_utf8();

    if at == 0 {
        return Ok(Some((proposal, offset)));
    }

    // Must be preceded by the delimiter it proposes.
    let before = text[..at].trim_end();
    match before.chars().last() {
        Some(c) if c == proposal => Ok(Some((proposal, offset))),
        Some(c) if !c.is_ascii_alphanumeric() => Err(UdaError::Syntax(format!(
            "Name Value pair delimiter is not preceded by itself: {}",
            text
        ))),
        _ => Ok(None),
    }
}

fn parse_pair(token: &str, strip_quotes: bool) -> NameValue {
    let pair = token.trim().to_string();

    let (name, value) = match pair.split_once('=') {
        Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
        None => match pair.strip_prefix('/') {
            Some(keyword) => (keyword.trim().to_string(), "true".to_string()),
            None => (pair.clone(), pair.clone()),
        },
    };

    let value = match value.strip_suffix(')') {
        Some(stripped) => stripped.to_string(),
        None => value,
    };

    let (name, value) = if strip_quotes {
        (
            strip_matching_quotes(&name).trim().to_string(),
            strip_matching_quotes(&value).trim().to_string(),
        )
    } else {
        (name, value)
    };

    NameValue { pair, name, value }
}

/// Parse a name-value list.
///
/// # Errors
///
/// Returns `Syntax` error when the list starts or ends with `=`, or when a
/// `delimiter=` pair is malformed.
///
/// # Example
///
/// ```
/// use uda_core::request::parse_pairs;
///
/// let pairs = parse_pairs("a=1, b='x,y', /flag", true).unwrap();
/// assert_eq!(pairs.len(), 3);
/// assert_eq!(pairs[1].value, "x,y");
/// assert_eq!(pairs[2].name, "flag");
/// assert_eq!(pairs[2].value, "true");
/// ```
pub fn parse_pairs(text: &str, strip_quotes: bool) -> Result<Vec<NameValue>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if text.starts_with('=') || text.ends_with('=') {
        return Err(UdaError::Syntax(format!(
            "Name Value pair syntax is incorrect: {}",
            text
        )));
    }

    let mut work: Vec<char> = text.chars().collect();
    let mut delimiter = DEFAULT_PAIR_DELIMITER;

    if let Some((proposal, offset)) = find_delimiter_pair(text)? {
        delimiter = proposal;
        let index = text[..offset].chars().count();
        work[index] = PROTECTED;
    }

    let mut quote: Option<char> = None;
    for c in work.iter_mut() {
        match quote {
            Some(open) if *c == open => quote = None,
            Some(_) if *c == delimiter => *c = PROTECTED,
            Some(_) => {}
            None if *c == '\'' || *c == '"' => quote = Some(*c),
            None => {}
        }
    }

    let work: String = work.into_iter().collect();
    let restore = |s: &str| s.replace(PROTECTED, &delimiter.to_string());

    let pairs: Vec<NameValue> = work
        .split(delimiter)
        .filter(|token| !token.trim().is_empty())
        .map(|token| {
            let nv = parse_pair(token, strip_quotes);
            NameValue {
                pair: restore(&nv.pair),
                name: restore(&nv.name),
                value: restore(&nv.value),
            }
        })
        .collect();

    tracing::debug!(count = pairs.len(), delimiter = %delimiter, "name value pairs parsed");
    Ok(pairs)
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.contains([DEFAULT_PAIR_DELIMITER, '=', '\'', '"'])
        || s.ends_with(')')
        || s.starts_with('/')
        || s.trim() != s
}

fn quoted(s: &str) -> Result<String> {
    if !needs_quotes(s) {
        Ok(s.to_string())
    } else if !s.contains('\'') {
        Ok(format!("'{}'", s))
    } else if !s.contains('"') {
        Ok(format!("\"{}\"", s))
    } else {
        // the parser has no escape syntax, so no quoting survives a round trip
        Err(UdaError::Syntax(format!(
            "Name Value pair text contains both quote characters: {}",
            s
        )))
    }
}

/// Render pairs back into a `,` separated list that parses (with quote
/// stripping) to the same names and values.
///
/// # Errors
///
/// Returns `Syntax` error for a name or value holding both `'` and `"`.
pub fn render_pairs(pairs: &[NameValue]) -> Result<String> {
    let rendered = pairs
        .iter()
        .map(|nv| Ok(format!("{}={}", quoted(&nv.name)?, quoted(&nv.value)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_values(pairs: &[NameValue]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|nv| (nv.name.clone(), nv.value.clone()))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_pairs("", true).unwrap().is_empty());
        assert!(parse_pairs("   ", true).unwrap().is_empty());
    }

    #[test]
    fn test_quoted_delimiter_preserved() {
        let pairs = parse_pairs("a=1, b='x,y'", true).unwrap();
        assert_eq!(
            names_values(&pairs),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "x,y".to_string())
            ]
        );
    }

    #[test]
    fn test_quotes_kept_without_strip() {
        let pairs = parse_pairs("b=\"x,y\"", false).unwrap();
        assert_eq!(pairs[0].value, "\"x,y\"");
    }

    #[test]
    fn test_keywords_and_placeholders() {
        let pairs = parse_pairs("/verbose, shot", true).unwrap();
        assert_eq!(pairs[0].name, "verbose");
        assert_eq!(pairs[0].value, "true");
        assert_eq!(pairs[1].name, "shot");
        assert_eq!(pairs[1].value, "shot");
    }

    #[test]
    fn test_trailing_paren_stripped() {
        let pairs = parse_pairs("a=1, b=2)", true).unwrap();
        assert_eq!(pairs[1].value, "2");
    }

    #[test]
    fn test_leading_or_trailing_equals_is_error() {
        assert!(matches!(parse_pairs("=a", true), Err(UdaError::Syntax(_))));
        assert!(matches!(parse_pairs("a=", true), Err(UdaError::Syntax(_))));
    }

    #[test]
    fn test_self_describing_delimiter() {
        let pairs = parse_pairs("delimiter='/'/a=1,2/b=3", true).unwrap();
        assert_eq!(
            names_values(&pairs),
            vec![
                ("delimiter".to_string(), "/".to_string()),
                ("a".to_string(), "1,2".to_string()),
                ("b".to_string(), "3".to_string())
            ]
        );
    }

    #[test]
    fn test_delimiter_pair_after_first_pair() {
        let pairs = parse_pairs("a=1;delimiter=';';b=2", true).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1].value, ";");
        assert_eq!(pairs[2].name, "b");
    }

    #[test]
    fn test_delimiter_pair_bad_predecessor() {
        let result = parse_pairs("a=1,delimiter=';';b=2", true);
        assert!(matches!(result, Err(UdaError::Syntax(_))));
    }

    #[test]
    fn test_duplicates_and_order_preserved() {
        let pairs = parse_pairs("x=1, y=2, x=3", true).unwrap();
        let names: Vec<&str> = pairs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "x"]);
        assert_eq!(pairs[2].value, "3");
    }

    #[test]
    fn test_render_is_idempotent() {
        for input in [
            "a=1, b='x,y', /flag",
            "path='/data/a.nc', n = 3, name=\"it's\"",
            "shot, empty=''",
            "f='g(x)', t = ' padded '",
        ] {
            let first = parse_pairs(input, true).unwrap();
            let second = parse_pairs(&render_pairs(&first).unwrap(), true).unwrap();
            assert_eq!(names_values(&first), names_values(&second), "input: {}", input);
        }
    }

    #[test]
    fn test_render_rejects_mixed_quotes() {
        let pairs = vec![NameValue::new("label", "it's \"x\"")];
        let err = render_pairs(&pairs).unwrap_err();
        assert!(matches!(err, UdaError::Syntax(_)));

        let single = vec![NameValue::new("label", "it's")];
        let reparsed = parse_pairs(&render_pairs(&single).unwrap(), true).unwrap();
        assert_eq!(reparsed[0].value, "it's");
    }
}
