//! Version comparison for installed and remote app releases
//!
//! An app version has two optional halves:
//! - Release: the marketing version (`CFBundleShortVersionString`), e.g. `2.4.1`
//! - Build: the build number (`CFBundleVersion`), e.g. `2417` or `2.4.1.2417`
//!
//! Comparison rules:
//! - Release is compared first, then build
//! - An absent half sorts below any present one
//! - Numeric components compared numerically: `1.10.0 > 1.9.0`
//! - Trailing zero components are insignificant: `1.0 == 1.0.0`
//! - Prerelease comes before release: `1.0.0-beta < 1.0.0`

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of an app bundle, installed or advertised by an update source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Version {
    release: Option<String>,
    build: Option<String>,
}

/// One half of a [`Version`], split into comparable components.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Parsed {
    main: Vec<Component>,
    /// Suffix after the first `-`; empty sorts above any prerelease
    pre: Prerelease,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Prerelease {
    Some(Vec<Component>),
    None,
}

/// Variant order matters: numbers sort before words (`1 < beta`).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Number(u64),
    Word(String),
}

impl Version {
    pub fn new(release: Option<&str>, build: Option<&str>) -> Self {
        Self {
            release: normalize(release),
            build: normalize(build),
        }
    }

    pub fn release(release: &str) -> Self {
        Self::new(Some(release), None)
    }

    pub fn build(build: &str) -> Self {
        Self::new(None, Some(build))
    }

    pub fn release_version(&self) -> Option<&str> {
        self.release.as_deref()
    }

    pub fn build_version(&self) -> Option<&str> {
        self.build.as_deref()
    }

    /// True when neither half is known.
    pub fn is_unknown(&self) -> bool {
        self.release.is_none() && self.build.is_none()
    }

    /// Returns true if other is strictly newer than self
    pub fn is_older_than(&self, other: &Version) -> bool {
        self.cmp(other) == Ordering::Less
    }

    /// Human-readable form, e.g. `2.4.1 (2417)`.
    pub fn display_string(&self) -> String {
        match (&self.release, &self.build) {
            (Some(release), Some(build)) if release != build => format!("{} ({})", release, build),
            (Some(release), _) => release.clone(),
            (None, Some(build)) => build.clone(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_half(self.release.as_deref(), other.release.as_deref())
            .then_with(|| compare_half(self.build.as_deref(), other.build.as_deref()))
    }
}

fn compare_half(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => Parsed::new(a).cmp(&Parsed::new(b)),
    }
}

impl Parsed {
    fn new(raw: &str) -> Self {
        let raw = raw.trim();
        let (main, pre) = match raw.split_once('-') {
            Some((main, pre)) => (main, components(pre)),
            None => (raw, Vec::new()),
        };
        let pre = if pre.is_empty() {
            Prerelease::None
        } else {
            Prerelease::Some(pre)
        };

        let mut main = components(main);
        // 1.0 == 1.0.0
        while main.len() > 1 && main.last() == Some(&Component::Number(0)) {
            main.pop();
        }

        Self { main, pre }
    }
}

/// Split on separators, then at every digit/letter boundary: `2.0b3` is
/// `[2, 0, b, 3]`. Anything else is ignored.
fn components(raw: &str) -> Vec<Component> {
    let mut out = Vec::new();

    for segment in raw.split(['.', '-', '+', ',', ' ']) {
        let mut run = String::new();
        let mut run_is_digit = false;

        for c in segment.chars().filter(|c| c.is_alphanumeric()) {
            let is_digit = c.is_ascii_digit();
            if !run.is_empty() && is_digit != run_is_digit {
                out.push(Component::from_run(&run));
                run.clear();
            }
            run_is_digit = is_digit;
            run.push(c);
        }
        if !run.is_empty() {
            out.push(Component::from_run(&run));
        }
    }

    out
}

impl Component {
    fn from_run(run: &str) -> Self {
        match run.parse::<u64>() {
            Ok(n) => Component::Number(n),
            Err(_) => Component::Word(run.to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compares_simple_releases() {
        assert!(Version::release("1.0.0") < Version::release("1.0.1"));
        assert!(Version::release("1.0.0") < Version::release("1.1.0"));
        assert!(Version::release("1.0.0") < Version::release("2.0.0"));
        assert!(Version::release("1.9.0") < Version::release("1.10.0"));
    }

    #[test]
    fn trailing_zeros_are_insignificant() {
        assert_eq!(Version::release("1.0"), Version::release("1.0.0"));
        assert_eq!(Version::release("2"), Version::release("2.0"));
        assert!(Version::release("1.0") < Version::release("1.0.1"));
    }

    #[test]
    fn handles_prerelease() {
        assert!(Version::release("1.0.0-beta") < Version::release("1.0.0"));
        assert!(Version::release("1.0.0-alpha") < Version::release("1.0.0-beta"));
        assert!(Version::release("1.0.0-beta2") < Version::release("1.0.0-beta10"));
    }

    #[test]
    fn release_takes_precedence_over_build() {
        let a = Version::new(Some("2.0"), Some("100"));
        let b = Version::new(Some("1.9"), Some("999"));
        assert!(a > b);
    }

    #[test]
    fn build_breaks_release_ties() {
        let a = Version::new(Some("2.0"), Some("100"));
        let b = Version::new(Some("2.0"), Some("101"));
        assert!(a < b);
    }

    #[test]
    fn absent_sorts_lowest() {
        assert!(Version::default() < Version::build("1"));
        assert!(Version::build("999") < Version::release("0.1"));
        assert!(Version::release("1.0") < Version::new(Some("1.0"), Some("1")));
    }

    #[test]
    fn empty_strings_are_absent() {
        let v = Version::new(Some("  "), Some(""));
        assert!(v.is_unknown());
        assert_eq!(v, Version::default());
    }

    #[test]
    fn equality_is_reflexive_and_case_insensitive() {
        let v = Version::new(Some("3.1b2"), Some("310"));
        assert_eq!(v, v.clone());
        assert_eq!(Version::release("3.1B2"), Version::release("3.1b2"));
        assert_ne!(Version::release("1.0.0"), Version::release("1.0.1"));
    }

    #[test]
    fn is_older_than_is_strict() {
        assert!(Version::release("1.0.0").is_older_than(&Version::release("1.0.1")));
        assert!(!Version::release("1.0.1").is_older_than(&Version::release("1.0.0")));
        assert!(!Version::release("1.0.0").is_older_than(&Version::release("1.0.0")));
    }

    #[test]
    fn display_string_combines_halves() {
        assert_eq!(Version::new(Some("2.4.1"), Some("2417")).display_string(), "2.4.1 (2417)");
        assert_eq!(Version::new(Some("5.0"), Some("5.0")).display_string(), "5.0");
        assert_eq!(Version::build("77").display_string(), "77");
        assert_eq!(Version::default().display_string(), "Unknown");
    }

    #[test]
    fn real_world_versions() {
        // Browser-style versions
        assert!(Version::release("120.0.6099.109") < Version::release("121.0.6167.85"));
        // Date-like builds
        assert!(Version::build("20240101") < Version::build("20240215"));
        // Cask-style comma separated build suffix
        assert!(Version::release("1.2.3,456") < Version::release("1.2.3,457"));
    }

    fn version_strategy() -> impl Strategy<Value = Version> {
        let half = prop::option::of(prop::sample::select(vec![
            "1", "1.0", "1.0.0", "1.2", "1.10", "2.0-beta", "2.0", "2.0b1", "10", "0.9.9",
        ]));
        (half.clone(), half).prop_map(|(r, b)| Version::new(r, b))
    }

    proptest! {
        #[test]
        fn ordering_is_antisymmetric(a in version_strategy(), b in version_strategy()) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }

        #[test]
        fn ordering_is_transitive(
            a in version_strategy(),
            b in version_strategy(),
            c in version_strategy(),
        ) {
            if a <= b && b <= c {
                prop_assert!(a <= c);
            }
        }

        #[test]
        fn equality_matches_ordering(a in version_strategy(), b in version_strategy()) {
            prop_assert_eq!(a == b, a.cmp(&b) == Ordering::Equal);
        }
    }
}
