// SPDX-License-Identifier: MIT

//! Minimal `*`/`?` glob matcher shared by the Process Identifier's path
//! matching and the Decision Engine's wildcard match kind (SPEC_FULL
//! §4.2) — one implementation, two call sites, rather than duplicating
//! glob logic or pulling in a filesystem-oriented glob crate for what is
//! really just a string pattern match.

/// Returns true if `pattern` (with `*` matching any run of characters,
/// `?` matching exactly one) matches `value` in full.
pub fn glob_match(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();
    match_from(&p, &v)
}

fn match_from(pattern: &[char], value: &[char]) -> bool {
    // Standard DP-free backtracking matcher: two cursors, remember the
    // last `*` position to backtrack to on mismatch.
    let (mut pi, mut vi) = (0usize, 0usize);
    let (mut star_idx, mut star_match) = (None, 0usize);

    while vi < value.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == value[vi]) {
            pi += 1;
            vi += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_idx = Some(pi);
            star_match = vi;
            pi += 1;
        } else if let Some(si) = star_idx {
            pi = si + 1;
            star_match += 1;
            vi = star_match;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }

    pi == pattern.len()
}

/// Case-insensitive variant, used for process name/path globbing (§4.2
/// requires case-insensitive name equality and glob matching on path).
pub fn glob_match_ci(pattern: &str, value: &str) -> bool {
    glob_match(&pattern.to_ascii_lowercase(), &value.to_ascii_lowercase())
}

/// The Decision Engine's "domain" match kind (§4.5): `target` equals
/// `pattern` or ends with `"." + pattern`. Never matches an unrelated
/// same-suffix string (`example.com` must not match `evilexample.com`).
pub fn domain_match(pattern: &str, target: &str) -> bool {
    target == pattern || target.ends_with(&format!(".{pattern}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_requires_exact_match() {
        assert!(glob_match("chrome", "chrome"));
        assert!(!glob_match("chrome", "chromium"));
    }

    #[test]
    fn star_matches_any_run() {
        assert!(glob_match("chrome*", "chromium"));
        assert!(glob_match("chrome*", "chrome-sandbox"));
        assert!(!glob_match("chrome*", "firefox"));
    }

    #[test]
    fn wildcard_domain_pattern_matches_both_sides() {
        assert!(glob_match("*.ads.*", "tracker.ads.net"));
        assert!(glob_match("*.ads.*", "x.ads.io"));
        assert!(!glob_match("*.ads.*", "ads.io"));
    }

    #[test]
    fn question_mark_matches_single_char() {
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "abbc"));
    }

    #[test]
    fn case_insensitive_variant_ignores_case() {
        assert!(glob_match_ci("Chrome*", "CHROMIUM"));
    }

    #[test]
    fn empty_pattern_only_matches_empty_value() {
        assert!(glob_match("", ""));
        assert!(!glob_match("", "x"));
    }

    #[test]
    fn domain_match_matches_exact_and_subdomains() {
        assert!(domain_match("example.com", "example.com"));
        assert!(domain_match("example.com", "a.b.example.com"));
    }

    #[test]
    fn domain_match_rejects_unrelated_same_suffix() {
        assert!(!domain_match("example.com", "evilexample.com"));
        assert!(!domain_match("example.com", "example.com.evil"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn label() -> impl Strategy<Value = String> {
        "[a-z]{1,8}"
    }

    proptest! {
        /// A domain-match pattern always matches itself and any string
        /// formed by prepending `"."`-joined labels (§4.5 "domain").
        #[test]
        fn domain_match_matches_self_and_any_subdomain(
            pattern in label(),
            prefix_labels in proptest::collection::vec(label(), 0..4),
        ) {
            prop_assert!(domain_match(&pattern, &pattern));
            let target = if prefix_labels.is_empty() {
                pattern.clone()
            } else {
                format!("{}.{}", prefix_labels.join("."), pattern)
            };
            prop_assert!(domain_match(&pattern, &target));
        }

        /// Appending any non-empty suffix directly onto the pattern
        /// (no dot boundary) must never match — the same-suffix trap
        /// named in §4.5 ("never matches an unrelated same-suffix string").
        #[test]
        fn domain_match_never_matches_a_glued_suffix(
            pattern in label(),
            glued in "[a-z]{1,8}",
        ) {
            let evil = format!("{glued}{pattern}");
            prop_assert!(!domain_match(&pattern, &evil));
        }

        /// A literal pattern (no `*`/`?`) behaves like byte-equality,
        /// matching the "exact" match kind's contract.
        #[test]
        fn glob_match_of_a_literal_pattern_is_exact_equality(a in label(), b in label()) {
            prop_assert_eq!(glob_match(&a, &b), a == b);
        }

        /// A bare `*` matches any value, including the empty string.
        #[test]
        fn star_alone_matches_any_value(value in ".*") {
            prop_assert!(glob_match("*", &value));
        }

        /// `prefix*suffix` matches any value that actually starts and
        /// ends with those literals, regardless of what's in between.
        #[test]
        fn prefix_star_suffix_matches_concatenation_with_any_middle(
            prefix in label(),
            middle in "[a-z]{0,8}",
            suffix in label(),
        ) {
            let pattern = format!("{prefix}*{suffix}");
            let value = format!("{prefix}{middle}{suffix}");
            prop_assert!(glob_match(&pattern, &value));
        }
    }
}
