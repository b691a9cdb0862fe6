//! Wildcard matching for configuration rules.
//!
//! # Responsibilities
//! - Match package/service/method names and paths against `*` and `?` patterns
//! - Try several patterns, first match wins
//!
//! # Design Decisions
//! - `?` matches exactly one character, `*` matches any run (including empty)
//! - Patterns are anchored at both ends
//! - Every other character matches itself literally
//! - No regex: greedy scan with single-star backtracking, O(n * m) worst case
//! - Empty pattern handling ("match anything") belongs to the callers

/// Returns true if `value` matches any of `patterns`.
pub fn matches<I, P>(value: &str, patterns: I) -> bool
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    patterns
        .into_iter()
        .any(|pattern| wildcard_match(value, pattern.as_ref()))
}

/// Match a single pattern against `value`.
pub fn wildcard_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut vi, mut pi) = (0usize, 0usize);
    // Position of the last `*` seen and the value index it was tried at.
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while vi < value.len() {
        match pattern.get(pi).copied() {
            Some('*') => {
                star = Some(pi);
                mark = vi;
                pi += 1;
            }
            Some(c) if c == '?' || c == value[vi] => {
                vi += 1;
                pi += 1;
            }
            _ => match star {
                Some(s) => {
                    pi = s + 1;
                    mark += 1;
                    vi = mark;
                }
                None => return false,
            },
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}
