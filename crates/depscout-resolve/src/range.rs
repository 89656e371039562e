//! Version range matching
//!
//! A deliberately small range evaluator covering the grammar seen in
//! registry peer-dependency declarations:
//!
//! - `*` or empty: any version
//! - `a || b`: either branch
//! - `a b`: both constraints (whitespace separated)
//! - `A - B`: hyphen range, `>=A <=B`
//! - `^`, `~`, `>=`, `>`, `<=`, `<`, `=` operators
//! - bare or partial versions (`18`, `18.2`, `18.2.0`): the given leading
//!   components must match exactly
//!
//! Dist-tags (`latest`, `next`) and protocol specifiers (`workspace:*`,
//! `npm:other@^1`) name no version and are never satisfied.
//!
//! Versions are reduced to three numeric components; pre-release and build
//! suffixes are ignored.

use std::cmp::Ordering;

/// Three numeric version components
pub type Triple = (u64, u64, u64);

/// Comparison operator of a single range token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Caret,
    Tilde,
    Gte,
    Gt,
    Lte,
    Lt,
    Eq,
    Bare,
}

/// How narrowly a range pins a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RangeSpecificity {
    /// Anything looser than a minor-level range
    Wide = 0,
    /// `^1.2`, `~1.2`, `1.2`
    Minor = 1,
    /// `^1.2.3`, `~1.2.3`
    Patch = 2,
    /// `1.2.3`, `=1.2.3`
    Exact = 3,
}

impl RangeSpecificity {
    /// Numeric score (exact = 3 ... wide = 0)
    pub fn score(self) -> u8 {
        self as u8
    }
}

/// Strip a leading `v`/`=` and any pre-release or build suffix.
fn core_version(version: &str) -> &str {
    let trimmed = version.trim().trim_start_matches(['v', 'V', '=']);
    let end = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// Parse up to three numeric components. Returns the components and how
/// many were actually given (wildcards such as `x` end the count).
fn parse_partial(version: &str) -> (Triple, usize) {
    let mut parts = [0u64; 3];
    let mut given = 0;
    for (idx, piece) in core_version(version).split('.').take(3).enumerate() {
        if piece.is_empty() || matches!(piece, "x" | "X" | "*") {
            break;
        }
        let digits: String = piece.chars().take_while(|c| c.is_ascii_digit()).collect();
        parts[idx] = digits.parse().unwrap_or(0);
        given = idx + 1;
    }
    ((parts[0], parts[1], parts[2]), given)
}

/// Parse a version into three numeric components; missing ones are 0.
pub fn parse_version(version: &str) -> Triple {
    parse_partial(version).0
}

/// Whether `version` satisfies `range`.
///
/// A token that is neither a wildcard nor starts with a version number
/// (`latest`, `next`, `workspace:*`) matches nothing, so a range made only
/// of such tokens is unsatisfiable. Inside `a || b` the other branch still
/// counts.
pub fn satisfies(version: &str, range: &str) -> bool {
    let range = range.trim();
    if is_wildcard(range) {
        return true;
    }

    if range.contains("||") {
        return range.split("||").any(|branch| satisfies(version, branch));
    }

    let v = parse_version(version);

    if let Some((low, high)) = split_hyphen(range) {
        return check(v, Operator::Gte, low) && check(v, Operator::Lte, high);
    }

    tokens(range)
        .iter()
        .all(|token| {
            let (op, rest) = split_operator(token);
            check(v, op, rest)
        })
}

fn is_wildcard(range: &str) -> bool {
    matches!(range, "" | "*" | "x" | "X")
}

fn split_hyphen(range: &str) -> Option<(&str, &str)> {
    let (low, high) = range.split_once(" - ")?;
    Some((low.trim(), high.trim()))
}

/// Split on whitespace, re-attaching operators written apart from their
/// version (`>= 1.2.0`).
fn tokens(range: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for piece in range.split_whitespace() {
        if matches!(piece, "^" | "~" | ">=" | ">" | "<=" | "<" | "=") {
            pending_op = Some(piece);
            continue;
        }
        match pending_op.take() {
            Some(op) => out.push(format!("{op}{piece}")),
            None => out.push(piece.to_string()),
        }
    }
    out
}

fn split_operator(token: &str) -> (Operator, &str) {
    const OPERATORS: [(&str, Operator); 7] = [
        (">=", Operator::Gte),
        ("<=", Operator::Lte),
        (">", Operator::Gt),
        ("<", Operator::Lt),
        ("^", Operator::Caret),
        ("~", Operator::Tilde),
        ("=", Operator::Eq),
    ];
    for (prefix, op) in OPERATORS {
        if let Some(rest) = token.strip_prefix(prefix) {
            return (op, rest.trim());
        }
    }
    (Operator::Bare, token)
}

/// Starts with a version number or an `x`/`*` placeholder
fn is_version_like(target: &str) -> bool {
    matches!(
        core_version(target).chars().next(),
        Some(c) if c.is_ascii_digit() || matches!(c, 'x' | 'X' | '*')
    )
}

fn check(v: Triple, op: Operator, target: &str) -> bool {
    if is_wildcard(target) {
        return true;
    }
    if !is_version_like(target) {
        return false;
    }
    let (r, given) = parse_partial(target);
    match op {
        Operator::Caret => {
            if r.0 == 0 && r.1 == 0 {
                v.0 == 0 && v.1 == 0 && v.2 >= r.2
            } else if r.0 == 0 {
                v.0 == 0 && v.1 == r.1 && v.2 >= r.2
            } else {
                v.0 == r.0 && (v.1, v.2) >= (r.1, r.2)
            }
        }
        Operator::Tilde => v.0 == r.0 && v.1 == r.1 && v.2 >= r.2,
        Operator::Gte => compare(v, r) != Ordering::Less,
        Operator::Gt => compare(v, r) == Ordering::Greater,
        Operator::Lte => compare(v, r) != Ordering::Greater,
        Operator::Lt => compare(v, r) == Ordering::Less,
        Operator::Eq | Operator::Bare => {
            let parts_v = [v.0, v.1, v.2];
            let parts_r = [r.0, r.1, r.2];
            parts_v[..given] == parts_r[..given]
        }
    }
}

/// Component-wise comparison, stopping at the first unequal pair
fn compare(a: Triple, b: Triple) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.cmp(&b.1))
        .then_with(|| a.2.cmp(&b.2))
}

/// Classify how narrowly a range pins a version
pub fn range_specificity(range: &str) -> RangeSpecificity {
    let range = range.trim();
    if range.contains("||") || split_hyphen(range).is_some() {
        return RangeSpecificity::Wide;
    }
    let parts = tokens(range);
    let [token] = parts.as_slice() else {
        return RangeSpecificity::Wide;
    };
    let (op, rest) = split_operator(token);
    let (_, given) = parse_partial(rest);
    match (op, given) {
        (Operator::Bare | Operator::Eq, 3) => RangeSpecificity::Exact,
        (Operator::Caret | Operator::Tilde, 3) => RangeSpecificity::Patch,
        (Operator::Caret | Operator::Tilde | Operator::Bare | Operator::Eq, 2) => {
            RangeSpecificity::Minor
        }
        _ => RangeSpecificity::Wide,
    }
}

/// Whether a version string carries a pre-release tag
pub fn is_prerelease(version: &str) -> bool {
    let trimmed = version.trim();
    let core_end = trimmed.find('+').unwrap_or(trimmed.len());
    trimmed[..core_end].contains('-')
}

/// Numeric-aware string ordering: digit runs compare by value, everything
/// else character by character, so `1.10.0 > 1.9.0` and `2.0.0-rc.10 > 2.0.0-rc.9`.
pub fn compare_version_strings(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a).into_iter();
    let mut right = chunks(b).into_iter();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => compare_digit_runs(x, y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

fn compare_digit_runs(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

fn chunks(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    for i in 1..=bytes.len() {
        if i == bytes.len() || bytes[i].is_ascii_digit() != bytes[start].is_ascii_digit() {
            out.push(&s[start..i]);
            start = i;
        }
    }
    out
}
