//! Name normalization and edit distance shared by the keyword tier and the
//! validator.

/// Lowercase and collapse every run of `-`, `_`, or whitespace into a single
/// `-`, trimming separators at either end.
///
/// `"Compressor_1"`, `"compressor 1"` and `" COMPRESSOR--1 "` all become
/// `"compressor-1"`.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch == '-' || ch == '_' || ch.is_whitespace() {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('-');
            pending_sep = false;
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Distance between `a` and `b` if it is at most `max`.
pub fn bounded_distance(a: &str, b: &str, max: usize) -> Option<usize> {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la.abs_diff(lb) > max {
        return None;
    }
    let d = levenshtein(a, b);
    (d <= max).then_some(d)
}

/// True when `needle` occurs in `haystack` delimited by `-` or the string
/// ends. Both arguments are expected to be normalized.
///
/// `"compressor-12"` does not contain `"compressor-1"` on a boundary.
pub fn contains_on_boundary(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(idx, _)| {
        let before_ok = idx == 0 || haystack[..idx].ends_with('-');
        let after = &haystack[idx + needle.len()..];
        let after_ok = after.is_empty() || after.starts_with('-');
        before_ok && after_ok
    })
}

/// True when `needle` occurs in `haystack` without cutting a number in
/// half: `"press-1"` is a fragment of `"press-1a"` but not of `"press-10"`.
pub fn contains_fragment(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(idx, _)| {
        let splits_before = needle.starts_with(|c: char| c.is_ascii_digit())
            && haystack[..idx].ends_with(|c: char| c.is_ascii_digit());
        let splits_after = needle.ends_with(|c: char| c.is_ascii_digit())
            && haystack[idx + needle.len()..].starts_with(|c: char| c.is_ascii_digit());
        !splits_before && !splits_after
    })
}

/// True when both names carry the same digit runs in the same order.
/// `Compresser-1` and `Compressor-1` do; `Boiler-2` and `Boiler-1` do not.
pub fn same_numbers(a: &str, b: &str) -> bool {
    fn runs(s: &str) -> impl Iterator<Item = &str> {
        s.split(|c: char| !c.is_ascii_digit()).filter(|r| !r.is_empty())
    }
    runs(a).eq(runs(b))
}

/// Heuristic for identifier-shaped tokens such as `Compresser-1` or `P101`:
/// at least one letter and at least one digit.
pub fn looks_like_identifier(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_alphabetic()) && token.chars().any(|c| c.is_ascii_digit())
}
