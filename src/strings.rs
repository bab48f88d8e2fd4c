//! String predicates and small helpers shared by the parser and path resolver.

/// Characters allowed in a file path besides ASCII alphanumerics.
#[cfg(not(windows))]
const PATH_EXTRA_CHARS: &str = "_-+./$:";
#[cfg(windows)]
const PATH_EXTRA_CHARS: &str = "_-+./$: \\";

/// Check that `s` is an integer, optionally signed.
pub fn is_number(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Check that `s` is a decimal number with at most one point and an
/// optional exponent.
pub fn is_float(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty()
        && s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
        && s.parse::<f64>().is_ok()
}

/// Check that `s` is a non-empty list of integers separated by `,` or `;`.
pub fn is_number_list(s: &str) -> bool {
    !s.is_empty() && s.split([',', ';']).all(|item| is_number(item.trim()))
}

/// Check that a path only uses the portable file name character set.
///
/// Guards against shell metacharacters reaching external commands.
pub fn is_legal_file_path(path: &str) -> bool {
    path.chars()
        .all(|c| c.is_ascii_alphanumeric() || PATH_EXTRA_CHARS.contains(c))
}

/// Strip one pair of matching enclosing quotes (`'...'` or `"..."`).
pub fn strip_matching_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'\'' || first == b'"') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Reverse a string by characters.
pub fn reverse(s: &str) -> String {
    s.chars().rev().collect()
}

/// Byte offset of the first case-insensitive (ASCII) match of `needle`.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    hay.windows(pat.len())
        .position(|window| window.eq_ignore_ascii_case(pat))
}

/// Strip `prefix` from `s`, ignoring ASCII case.
pub fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Check for a `*` wildcard.
pub fn contains_wildcard(s: &str) -> bool {
    s.contains('*')
}

/// Last path element of `path`.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
