//! Property tests for version parsing and ordering.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cmp::Ordering;

use proptest::prelude::*;

use modupdater::version::{is_newer, is_newer_str, is_prerelease, parse_version};

fn triple() -> impl Strategy<Value = (u64, u64, u64)> {
    (0u64..50, 0u64..50, 0u64..50)
}

proptest! {
    /// Release versions order like their numeric components.
    #[test]
    fn prop_release_order_matches_components(a in triple(), b in triple()) {
        let va = parse_version(&format!("{}.{}.{}", a.0, a.1, a.2)).unwrap();
        let vb = parse_version(&format!("{}.{}.{}", b.0, b.1, b.2)).unwrap();

        prop_assert_eq!(is_newer(&va, &vb), a > b);
        prop_assert_eq!(is_newer(&vb, &va), b > a);
    }

    /// A version is never newer than itself, and newer is antisymmetric.
    #[test]
    fn prop_newer_is_strict(a in triple(), b in triple()) {
        let va = parse_version(&format!("{}.{}.{}", a.0, a.1, a.2)).unwrap();
        let vb = parse_version(&format!("{}.{}.{}", b.0, b.1, b.2)).unwrap();

        prop_assert!(!is_newer(&va, &va));
        prop_assert!(!(is_newer(&va, &vb) && is_newer(&vb, &va)));
    }

    /// A prerelease sorts below its release.
    #[test]
    fn prop_prerelease_below_release(a in triple(), tag in "[a-z]{1,6}(\\.[1-9][0-9]?)?") {
        let release = parse_version(&format!("{}.{}.{}", a.0, a.1, a.2)).unwrap();
        let pre = parse_version(&format!("{}.{}.{}-{}", a.0, a.1, a.2, tag)).unwrap();

        prop_assert!(is_prerelease(&pre));
        prop_assert!(!is_prerelease(&release));
        prop_assert!(is_newer(&release, &pre));
    }

    /// Missing components count as zero.
    #[test]
    fn prop_short_versions_pad_with_zero(major in 0u64..100, minor in 0u64..100) {
        let short = parse_version(&format!("{}.{}", major, minor)).unwrap();
        let full = parse_version(&format!("{}.{}.0", major, minor)).unwrap();
        prop_assert_eq!(short.cmp_precedence(&full), Ordering::Equal);
    }

    /// Unparsable text is never newer and never older.
    #[test]
    fn prop_garbage_never_newer(text in "[a-z ]{1,10}", a in triple()) {
        let valid = format!("{}.{}.{}", a.0, a.1, a.2);
        prop_assert!(!is_newer_str(&text, &valid));
        prop_assert!(!is_newer_str(&valid, &text));
    }
}
