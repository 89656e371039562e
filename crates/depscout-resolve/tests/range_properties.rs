//! Property-based tests for the range matcher and version ordering

use std::cmp::Ordering;

use depscout_resolve::range::{compare_version_strings, satisfies};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn arb_triple() -> impl Strategy<Value = (u64, u64, u64)> {
    (0u64..30, 0u64..30, 0u64..30)
}

fn render((major, minor, patch): (u64, u64, u64)) -> String {
    format!("{major}.{minor}.{patch}")
}

fn arb_simple_range() -> impl Strategy<Value = String> {
    (
        prop_oneof![
            Just("^"),
            Just("~"),
            Just(">="),
            Just(">"),
            Just("<="),
            Just("<"),
            Just("="),
            Just("")
        ],
        arb_triple(),
    )
        .prop_map(|(op, v)| format!("{op}{}", render(v)))
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// A version always satisfies itself, bare or `=`-pinned
    #[test]
    fn prop_exact_version_satisfies_itself(v in arb_triple()) {
        let version = render(v);
        prop_assert!(satisfies(&version, &version));
        let exact = format!("={version}");
        prop_assert!(satisfies(&version, &exact));
    }

    /// Wildcards accept everything
    #[test]
    fn prop_wildcards_accept_everything(v in arb_triple()) {
        let version = render(v);
        for range in ["", "*", "x", "  "] {
            prop_assert!(satisfies(&version, range));
        }
    }

    /// Caret with a nonzero major: same major, (minor, patch) not lower
    #[test]
    fn prop_caret_nonzero_major(v in arb_triple(), r in (1u64..30, 0u64..30, 0u64..30)) {
        let expected = v.0 == r.0 && (v.1, v.2) >= (r.1, r.2);
        prop_assert_eq!(satisfies(&render(v), &format!("^{}", render(r))), expected);
    }

    /// Tilde: same major and minor, patch not lower
    #[test]
    fn prop_tilde(v in arb_triple(), r in arb_triple()) {
        let expected = v.0 == r.0 && v.1 == r.1 && v.2 >= r.2;
        prop_assert_eq!(satisfies(&render(v), &format!("~{}", render(r))), expected);
    }

    /// Comparison operators agree with lexicographic triple ordering
    #[test]
    fn prop_comparisons(v in arb_triple(), r in arb_triple()) {
        let version = render(v);
        let target = render(r);
        prop_assert_eq!(satisfies(&version, &format!(">={target}")), v >= r);
        prop_assert_eq!(satisfies(&version, &format!(">{target}")), v > r);
        prop_assert_eq!(satisfies(&version, &format!("<={target}")), v <= r);
        prop_assert_eq!(satisfies(&version, &format!("<{target}")), v < r);
    }

    /// `a || b` is the disjunction of its branches
    #[test]
    fn prop_or_is_disjunction(v in arb_triple(), a in arb_simple_range(), b in arb_simple_range()) {
        let version = render(v);
        let either = satisfies(&version, &a) || satisfies(&version, &b);
        prop_assert_eq!(satisfies(&version, &format!("{a} || {b}")), either);
    }

    /// Whitespace-separated comparators are a conjunction
    #[test]
    fn prop_whitespace_is_conjunction(v in arb_triple(), a in arb_simple_range(), b in arb_simple_range()) {
        let version = render(v);
        let both = satisfies(&version, &a) && satisfies(&version, &b);
        prop_assert_eq!(satisfies(&version, &format!("{a} {b}")), both);
    }

    /// `A - B` means `>=A <=B`
    #[test]
    fn prop_hyphen_range(v in arb_triple(), lo in arb_triple(), hi in arb_triple()) {
        let expected = v >= lo && v <= hi;
        let range = format!("{} - {}", render(lo), render(hi));
        prop_assert_eq!(satisfies(&render(v), &range), expected);
    }

    /// Pre-release and build suffixes are ignored when matching
    #[test]
    fn prop_suffixes_are_stripped(v in arb_triple(), r in arb_simple_range()) {
        let version = render(v);
        let tagged = format!("{version}-beta.1+sha.abc");
        prop_assert_eq!(satisfies(&tagged, &r), satisfies(&version, &r));
    }

    /// Numeric-aware ordering matches triple ordering and is antisymmetric
    #[test]
    fn prop_version_ordering(a in arb_triple(), b in arb_triple()) {
        let (x, y) = (render(a), render(b));
        prop_assert_eq!(compare_version_strings(&x, &y), a.cmp(&b));
        prop_assert_eq!(compare_version_strings(&y, &x), compare_version_strings(&x, &y).reverse());
        prop_assert_eq!(compare_version_strings(&x, &x), Ordering::Equal);
    }
}
