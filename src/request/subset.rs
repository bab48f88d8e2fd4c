//! Array subset expressions: `SIGNAL[a:b:c][d:e]` or `SIGNAL{a:b:c, d:e}`.
//!
//! Per-dimension grammar:
//!
//! ```text
//! * | (empty)   whole dimension
//! #             last element
//! N             single element N
//! a: | a:*      a to the end
//! a:b           a to b inclusive
//! a::c | a:*:c  a to the end, stride c
//! a:b:c         a to b inclusive, stride c
//! ```

use crate::error::{Result, UdaError};
use crate::request::{DataSubset, SubsetDim, MAX_SUBSET_RANK};

fn parse_bound(token: &str, what: &str) -> Result<Option<i64>> {
    let token = token.trim();
    if token.is_empty() || token == "*" || token == "#" {
        return Ok(None);
    }
    let value: i64 = token.parse().map_err(|_| {
        UdaError::Syntax(format!("Invalid {} in subset operation: '{}'", what, token))
    })?;
    if value < 0 {
        return Err(UdaError::Syntax(format!(
            "Negative {} in subset operation: {}",
            what, value
        )));
    }
    Ok(Some(value))
}

/// Parse one dimension of a subset expression.
///
/// # Errors
///
/// Returns `Syntax` error for non-integer or negative bounds, a stop before
/// the start, a non-positive stride or more than three `:` fields.
pub fn parse_dimension(element: &str) -> Result<SubsetDim> {
    let element = element.trim();

    if element.is_empty() || element == "*" {
        return Ok(SubsetDim::default());
    }
    if element == "#" {
        return Ok(SubsetDim {
            start: -1,
            stop: -1,
            stride: 1,
            count: 1,
            is_index: true,
        });
    }

    let tokens: Vec<&str> = element.split(':').collect();
    match tokens.as_slice() {
        [index] => {
            let start = parse_bound(index, "index")?.unwrap_or(0);
            Ok(SubsetDim {
                start,
                stop: start + 1,
                stride: 1,
                count: 1,
                is_index: true,
            })
        }
        [start, stop] => range(start, stop, None),
        [start, stop, stride] => range(start, stop, Some(stride)),
        _ => Err(UdaError::Syntax(format!(
            "Invalid number of elements in subset operation: '{}'",
            element
        ))),
    }
}

fn range(start: &str, stop: &str, stride: Option<&&str>) -> Result<SubsetDim> {
    let start = parse_bound(start, "start index")?.unwrap_or(0);
    let stop = parse_bound(stop, "stop index")?;

    let stride = match stride {
        Some(text) if !text.trim().is_empty() && text.trim() != "*" => {
            let value: i64 = text.trim().parse().map_err(|_| {
                UdaError::Syntax(format!("Invalid stride in subset operation: '{}'", text))
            })?;
            if value <= 0 {
                return Err(UdaError::Syntax(format!(
                    "Invalid stride in subset operation: {}",
                    value
                )));
            }
            value
        }
        _ => 1,
    };

    let (stop, count) = match stop {
        Some(stop) if stop < start => {
            return Err(UdaError::Syntax(format!(
                "Invalid stop index in subset operation: {} < {}",
                stop, start
            )));
        }
        Some(stop) => {
            let count = stop - start + 1;
            (stop, (count + stride - 1) / stride)
        }
        None => (-1, -1),
    };

    Ok(SubsetDim {
        start,
        stop,
        stride,
        count,
        is_index: false,
    })
}

/// Split an expression into its bracket groups' contents.
fn bracket_groups(expr: &str) -> Vec<&str> {
    let expr = expr.trim();
    if !expr.starts_with(['[', '{']) {
        return vec![expr];
    }

    let mut groups = Vec::new();
    let mut open = None;
    for (i, c) in expr.char_indices() {
        match c {
            '[' | '{' => open = Some(i + 1),
            ']' | '}' => {
                if let Some(start) = open.take() {
                    groups.push(&expr[start..i]);
                }
            }
            _ => {}
        }
    }
    groups
}

/// Parse a subset expression such as `[a:b:c][d:e:f]` or `[a:b:c, d:e:f]`.
///
/// Dimensions beyond [`MAX_SUBSET_RANK`] are dropped.
///
/// # Example
///
/// ```
/// use uda_core::request::parse_subset;
///
/// let subset = parse_subset("[10:20:2]").unwrap();
/// assert_eq!(subset.dims[0].count, 6);
/// ```
pub fn parse_subset(expr: &str) -> Result<DataSubset> {
    let mut dims = Vec::new();
    for group in bracket_groups(expr) {
        for element in group.split(',') {
            dims.push(parse_dimension(element)?);
        }
    }

    if dims.len() > MAX_SUBSET_RANK {
        tracing::warn!(
            rank = dims.len(),
            max = MAX_SUBSET_RANK,
            "subset rank truncated"
        );
        dims.truncate(MAX_SUBSET_RANK);
    }

    Ok(DataSubset { dims })
}

/// A subset suffix split off a signal name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSubset {
    /// Signal with the subset removed.
    pub signal: String,
    /// Raw subset text, brackets included.
    pub text: String,
    pub subset: DataSubset,
}

fn is_subset_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, ':' | '*' | '#' | ',' | '-' | ' ' | '\t')
}

/// Split a trailing subset expression off `signal`.
///
/// Returns `Ok(None)` when the signal has no trailing bracket group made of
/// subset characters (e.g. `A[name]` is part of a name, not a subset).
///
/// # Errors
///
/// Returns `Syntax` error when the groups look like a subset but do not
/// parse.
pub fn extract_subset(signal: &str) -> Result<Option<ExtractedSubset>> {
    let signal = signal.trim();
    let mut end = signal.len();

    loop {
        let head = &signal[..end];
        let open = match head.chars().last() {
            Some(']') => '[',
            Some('}') => '{',
            _ => break,
        };
        let Some(start) = head.rfind(open) else {
            break;
        };
        if !head[start + 1..head.len() - 1].chars().all(is_subset_char) {
            break;
        }
        end = start;
    }

    if end == signal.len() || end == 0 {
        return Ok(None);
    }

    let text = &signal[end..];
    let subset = parse_subset(text)?;
    tracing::debug!(signal = %&signal[..end], subset = %text, "subset extracted");

    Ok(Some(ExtractedSubset {
        signal: signal[..end].trim_end().to_string(),
        text: text.to_string(),
        subset,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_range_with_stride() {
        let dim = parse_dimension("10:20:2").unwrap();
        assert_eq!((dim.start, dim.stop, dim.stride, dim.count), (10, 20, 2, 6));
        assert!(!dim.is_index);
    }

    #[test]
    fn test_count_is_ceiling() {
        for (a, b, c) in [(0, 9, 3), (5, 5, 1), (1, 100, 7), (0, 0, 4), (3, 10, 8)] {
            let dim = parse_dimension(&format!("{}:{}:{}", a, b, c)).unwrap();
            let expected = ((b - a + 1) as f64 / c as f64).ceil() as i64;
            assert_eq!(dim.count, expected, "{}:{}:{}", a, b, c);
            assert_eq!(dim.stop, b);
        }
    }

    #[test]
    fn test_whole_dimension() {
        assert_eq!(parse_dimension("*").unwrap(), SubsetDim::default());
        assert_eq!(parse_dimension("").unwrap(), SubsetDim::default());
    }

    #[test]
    fn test_last_element() {
        let dim = parse_dimension("#").unwrap();
        assert_eq!(dim.start, -1);
        assert!(dim.is_index);
    }

    #[test]
    fn test_single_index() {
        let dim = parse_dimension("7").unwrap();
        assert_eq!((dim.start, dim.stop, dim.count), (7, 8, 1));
        assert!(dim.is_index);
    }

    #[test]
    fn test_open_ranges() {
        let dim = parse_dimension("4:").unwrap();
        assert_eq!((dim.start, dim.stop, dim.stride), (4, -1, 1));
        let dim = parse_dimension("4:*").unwrap();
        assert_eq!((dim.start, dim.stop), (4, -1));
        let dim = parse_dimension("4::3").unwrap();
        assert_eq!((dim.start, dim.stop, dim.stride), (4, -1, 3));
        let dim = parse_dimension("4:*:3").unwrap();
        assert_eq!((dim.start, dim.stop, dim.stride), (4, -1, 3));
    }

    #[test]
    fn test_errors() {
        assert!(parse_dimension("5:2").unwrap_err().to_string().contains("stop index"));
        assert!(parse_dimension("1:5:0").unwrap_err().to_string().contains("stride"));
        assert!(parse_dimension("1:5:-2").is_err());
        assert!(parse_dimension("-1:5").is_err());
        assert!(parse_dimension("1:2:3:4").is_err());
        assert!(parse_dimension("x").is_err());
    }

    #[test]
    fn test_multiple_dimensions() {
        let a = parse_subset("[1:3][*][#]").unwrap();
        let b = parse_subset("[1:3, *, #]").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.rank(), 3);
    }

    #[test]
    fn test_rank_truncated() {
        let expr = format!("[{}]", vec!["0"; MAX_SUBSET_RANK + 3].join(","));
        assert_eq!(parse_subset(&expr).unwrap().rank(), MAX_SUBSET_RANK);
    }

    #[test]
    fn test_extract_from_signal() {
        let found = extract_subset("AMC::PLASMA_CURRENT[10:20:2]").unwrap().unwrap();
        assert_eq!(found.signal, "AMC::PLASMA_CURRENT");
        assert_eq!(found.text, "[10:20:2]");
        assert_eq!(found.subset.dims[0].count, 6);
    }

    #[test]
    fn test_extract_braces_and_groups() {
        let found = extract_subset("ip{0:9}[#]").unwrap().unwrap();
        assert_eq!(found.signal, "ip");
        assert_eq!(found.subset.rank(), 2);
    }

    #[test]
    fn test_extract_ignores_names() {
        assert!(extract_subset("ip").unwrap().is_none());
        assert!(extract_subset("coil[name]").unwrap().is_none());
        assert!(extract_subset("[1:2]").unwrap().is_none());
    }

    #[test]
    fn test_extract_reports_bad_subset() {
        assert!(extract_subset("ip[5:1]").is_err());
    }
}
