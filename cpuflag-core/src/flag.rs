//! CPU feature flag tokens.
//!
//! The same feature is spelled differently by CPUID documentation, QEMU and the
//! Linux kernel (`sse4.1` vs `sse4_1`, `sse3` vs `pni`). Every [`Flag`] is
//! stored under its kernel spelling so that set operations across sources
//! line up.

use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Alternate spelling -> kernel (`/proc/cpuinfo`) spelling.
pub const FLAG_ALIASES: &[(&str, &str)] = &[
    ("sse4.1", "sse4_1"),
    ("sse4.2", "sse4_2"),
    ("pclmulqdq", "pclmuldq"),
    ("sse3", "pni"),
    ("ffxsr", "fxsr_opt"),
    ("xd", "nx"),
    ("i64", "lm"),
    ("psn", "pn"),
    ("clfsh", "clflush"),
    ("dts", "ds"),
    ("htt", "ht"),
    ("CMPXCHG8B", "cx8"),
    ("Page1GB", "pdpe1gb"),
    ("LahfSahf", "lahf_lm"),
    ("ExtApicSpace", "extapic"),
    ("AltMovCr8", "cr8_legacy"),
    ("cr8legacy", "cr8_legacy"),
];

fn canonical_name(token: &str) -> &str {
    FLAG_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .or_else(|| {
            FLAG_ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(token))
        })
        .map(|(_, canonical)| *canonical)
        .unwrap_or(token)
}

/// A single CPU feature flag in canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Flag(String);

impl Flag {
    /// Builds a flag from a raw token. `a|b` alternatives collapse to the
    /// first non-empty alternative.
    pub fn new(token: &str) -> Self {
        let first = token
            .split('|')
            .map(str::trim)
            .find(|alt| !alt.is_empty())
            .unwrap_or("");
        Flag(canonical_name(first).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical spelling followed by every alias that maps onto it.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.0.as_str()).chain(
            FLAG_ALIASES
                .iter()
                .filter(move |(_, canonical)| *canonical == self.0)
                .map(|(alias, _)| *alias),
        )
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Flag {
    fn from(token: &str) -> Self {
        Flag::new(token)
    }
}

/// Sorted set of flags. Sorting keeps reports and CLI output stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlagSet(BTreeSet<Flag>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .filter(|t| !t.as_ref().trim().is_empty())
            .map(|t| Flag::new(t.as_ref()))
            .collect()
    }

    /// Parses a whitespace separated flag list such as a cpuinfo `flags` value.
    pub fn parse_whitespace(text: &str) -> Self {
        Self::from_tokens(text.split_whitespace())
    }

    pub fn insert(&mut self, flag: Flag) -> bool {
        self.0.insert(flag)
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    /// Membership test for a raw token, resolving aliases first.
    pub fn contains_name(&self, token: &str) -> bool {
        self.0.contains(&Flag::new(token))
    }

    pub fn union(&self, other: &FlagSet) -> FlagSet {
        FlagSet(self.0.union(&other.0).cloned().collect())
    }

    pub fn difference(&self, other: &FlagSet) -> FlagSet {
        FlagSet(self.0.difference(&other.0).cloned().collect())
    }

    pub fn intersection(&self, other: &FlagSet) -> FlagSet {
        FlagSet(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Flag> {
        self.0.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|f| f.0.clone()).collect()
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        FlagSet(iter.into_iter().filter(|f| !f.0.is_empty()).collect())
    }
}

impl Extend<Flag> for FlagSet {
    fn extend<T: IntoIterator<Item = Flag>>(&mut self, iter: T) {
        self.0.extend(iter.into_iter().filter(|f| !f.0.is_empty()));
    }
}

impl<'a> IntoIterator for &'a FlagSet {
    type Item = &'a Flag;
    type IntoIter = btree_set::Iter<'a, Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Flag::as_str).collect();
        f.write_str(&names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve_to_kernel_spelling() {
        assert_eq!(Flag::new("sse4.1"), Flag::new("sse4_1"));
        assert_eq!(Flag::new("sse3").as_str(), "pni");
        assert_eq!(Flag::new("CMPXCHG8B").as_str(), "cx8");
        assert_eq!(Flag::new("cmpxchg8b").as_str(), "cx8");
        assert_eq!(Flag::new("avx2").as_str(), "avx2");
    }

    #[test]
    fn test_alternatives_collapse() {
        assert_eq!(Flag::new("sse4.2|sse4_2").as_str(), "sse4_2");
        assert_eq!(Flag::new("|xd").as_str(), "nx");
    }

    #[test]
    fn test_spellings_include_aliases() {
        let flag = Flag::new("cr8_legacy");
        let spellings: Vec<&str> = flag.spellings().collect();
        assert_eq!(spellings, vec!["cr8_legacy", "AltMovCr8", "cr8legacy"]);
        assert_eq!(Flag::new("avx").spellings().count(), 1);
    }

    #[test]
    fn test_set_algebra_uses_canonical_names() {
        let model = FlagSet::parse_whitespace("sse3 sse4.1 fpu");
        let guest = FlagSet::parse_whitespace("pni sse4_1 fpu hypervisor");

        assert!(model.difference(&guest).is_empty());
        assert_eq!(guest.difference(&model).to_string(), "hypervisor");
        assert_eq!(model.intersection(&guest).len(), 3);
        assert!(guest.contains_name("sse4.1"));
    }

    #[test]
    fn test_empty_tokens_are_dropped() {
        let set = FlagSet::from_tokens(["", "  ", "fpu"]);
        assert_eq!(set.names(), vec!["fpu".to_string()]);
    }

    #[test]
    fn test_display_is_sorted() {
        let set = FlagSet::parse_whitespace("vme fpu de");
        assert_eq!(set.to_string(), "de fpu vme");
    }
}
