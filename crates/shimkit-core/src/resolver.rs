//! Name resolution with precision tiers
//!
//! Member names, method names and dictionary keys are all matched the same
//! way: a requested name is compared against candidates tier by tier, and
//! the first tier producing a match decides. Within a tier candidates are
//! tried in the order they were given.
//!
//! | Tier | Comparison                                               |
//! |------|----------------------------------------------------------|
//! | 1    | exact                                                    |
//! | 2    | case-insensitive                                         |
//! | 3    | separators (space `.` `:` `_` `-`) stripped, case kept    |
//! | 4    | separators stripped, case-insensitive                    |
//! | 5    | every non-alphanumeric stripped, case-insensitive        |
//!
//! Strict mode only runs tier 1.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

const SEPARATORS: [char; 5] = [' ', '.', ':', '_', '-'];

/// Which tiers a lookup may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Exact names only
    Strict,
    /// All five tiers
    #[default]
    Fuzzy,
}

impl MatchMode {
    pub fn tiers(self) -> &'static [MatchTier] {
        match self {
            MatchMode::Strict => &MatchTier::ALL[..1],
            MatchMode::Fuzzy => &MatchTier::ALL,
        }
    }

    pub fn is_fuzzy(self) -> bool {
        self == MatchMode::Fuzzy
    }
}

/// `true` selects fuzzy matching
impl From<bool> for MatchMode {
    fn from(fuzzy: bool) -> Self {
        if fuzzy {
            MatchMode::Fuzzy
        } else {
            MatchMode::Strict
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Strict => write!(f, "strict"),
            MatchMode::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// A resolution precision tier, most precise first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchTier {
    Exact,
    CaseInsensitive,
    SeparatorStripped,
    SeparatorStrippedCaseInsensitive,
    AlphanumericOnly,
}

impl MatchTier {
    pub const ALL: [MatchTier; 5] = [
        MatchTier::Exact,
        MatchTier::CaseInsensitive,
        MatchTier::SeparatorStripped,
        MatchTier::SeparatorStrippedCaseInsensitive,
        MatchTier::AlphanumericOnly,
    ];

    /// Key a name compares under in this tier
    pub fn normalize(self, name: &str) -> String {
        match self {
            MatchTier::Exact => name.to_string(),
            MatchTier::CaseInsensitive => name.to_lowercase(),
            MatchTier::SeparatorStripped => strip_separators(name),
            MatchTier::SeparatorStrippedCaseInsensitive => strip_separators(name).to_lowercase(),
            MatchTier::AlphanumericOnly => name
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase(),
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchTier::Exact => "exact",
            MatchTier::CaseInsensitive => "case-insensitive",
            MatchTier::SeparatorStripped => "separator-stripped",
            MatchTier::SeparatorStrippedCaseInsensitive => "separator-stripped case-insensitive",
            MatchTier::AlphanumericOnly => "alphanumeric-only",
        };
        write!(f, "{}", label)
    }
}

fn strip_separators(name: &str) -> String {
    name.chars().filter(|c| !SEPARATORS.contains(c)).collect()
}

// ── Linear resolver ───────────────────────────────────────

/// The outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Position of the matched candidate
    pub index: usize,
    /// The candidate exactly as given
    pub name: String,
    pub tier: MatchTier,
}

/// Resolves one requested name against an ordered candidate list
#[derive(Debug, Clone, Copy, Default)]
pub struct NameResolver {
    mode: MatchMode,
}

impl NameResolver {
    pub fn new(mode: MatchMode) -> Self {
        NameResolver { mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn resolve<S: AsRef<str>>(&self, requested: &str, candidates: &[S]) -> Option<Resolution> {
        for &tier in self.mode.tiers() {
            let wanted = tier.normalize(requested);
            let found = candidates
                .iter()
                .position(|candidate| tier.normalize(candidate.as_ref()) == wanted);
            if let Some(index) = found {
                let name = candidates[index].as_ref().to_string();
                if tier != MatchTier::Exact {
                    tracing::trace!(requested, matched = %name, %tier, "fuzzy name match");
                }
                return Some(Resolution { index, name, tier });
            }
        }
        None
    }
}

// ── Precomputed index ─────────────────────────────────────

/// Precomputed per-tier lookup tables over a fixed name set.
///
/// Each tier keeps every slot filed under a normalized key in insertion
/// order, so [`NameIndex::lookup`] agrees with [`NameResolver`] over the
/// same insertion order and [`NameIndex::lookup_all`] can fall back to
/// looser candidates.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    tables: [HashMap<String, Vec<usize>>; 5],
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as slot `slot`. Returns false when the exact name
    /// was already present; the earlier slot is kept.
    pub fn insert(&mut self, name: &str, slot: usize) -> bool {
        if self.tables[MatchTier::Exact.slot()].contains_key(name) {
            return false;
        }
        for tier in MatchTier::ALL {
            self.tables[tier.slot()]
                .entry(tier.normalize(name))
                .or_default()
                .push(slot);
        }
        true
    }

    /// Best match: the earliest slot at the most precise tier
    pub fn lookup(&self, requested: &str, mode: MatchMode) -> Option<(usize, MatchTier)> {
        for &tier in mode.tiers() {
            if let Some(&slot) = self.slots_at(tier, requested).first() {
                if tier != MatchTier::Exact {
                    tracing::trace!(requested, slot, %tier, "fuzzy index match");
                }
                return Some((slot, tier));
            }
        }
        None
    }

    /// Every matching slot, most precise tier first, each slot once
    pub fn lookup_all(&self, requested: &str, mode: MatchMode) -> Vec<(usize, MatchTier)> {
        let mut found: Vec<(usize, MatchTier)> = Vec::new();
        for &tier in mode.tiers() {
            for &slot in self.slots_at(tier, requested) {
                if !found.iter().any(|&(seen, _)| seen == slot) {
                    found.push((slot, tier));
                }
            }
        }
        found
    }

    fn slots_at(&self, tier: MatchTier, requested: &str) -> &[usize] {
        self.tables[tier.slot()]
            .get(&tier.normalize(requested))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tables[MatchTier::Exact.slot()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fuzzy() -> NameResolver {
        NameResolver::new(MatchMode::Fuzzy)
    }

    // ── Tiers ─────────────────────────────────────────────

    #[test]
    fn test_normalize_per_tier() {
        assert_eq!(MatchTier::CaseInsensitive.normalize("FirstName"), "firstname");
        assert_eq!(MatchTier::SeparatorStripped.normalize("first_name.x:y-z w"), "firstnamexyzw");
        assert_eq!(
            MatchTier::SeparatorStrippedCaseInsensitive.normalize("First_Name"),
            "firstname"
        );
        assert_eq!(MatchTier::AlphanumericOnly.normalize("First/Name#1"), "firstname1");
    }

    #[test]
    fn test_exact_wins_over_everything() {
        let r = fuzzy().resolve("Name", &["name", "Name"]).unwrap();
        assert_eq!(r.name, "Name");
        assert_eq!(r.index, 1);
        assert_eq!(r.tier, MatchTier::Exact);
    }

    #[test]
    fn test_case_insensitive_beats_separator_stripped() {
        let r = fuzzy().resolve("FullName", &["Full_Name", "fullname"]).unwrap();
        assert_eq!(r.name, "fullname");
        assert_eq!(r.tier, MatchTier::CaseInsensitive);
    }

    #[test]
    fn test_separator_tiers() {
        let r = fuzzy().resolve("FullName", &["Full_Name"]).unwrap();
        assert_eq!(r.tier, MatchTier::SeparatorStripped);
        let r = fuzzy().resolve("FullName", &["full-name"]).unwrap();
        assert_eq!(r.tier, MatchTier::SeparatorStrippedCaseInsensitive);
        let r = fuzzy().resolve("FullName", &["full/name"]).unwrap();
        assert_eq!(r.tier, MatchTier::AlphanumericOnly);
    }

    #[test]
    fn test_first_candidate_wins_within_tier() {
        let r = fuzzy().resolve("name", &["NAME", "Name"]).unwrap();
        assert_eq!(r.name, "NAME");
    }

    #[test]
    fn test_strict_mode_is_exact_only() {
        let strict = NameResolver::new(MatchMode::Strict);
        assert!(strict.resolve("Name", &["name"]).is_none());
        assert_eq!(strict.resolve("Name", &["Name"]).unwrap().tier, MatchTier::Exact);
    }

    #[test]
    fn test_no_candidates() {
        let empty: [&str; 0] = [];
        assert!(fuzzy().resolve("Name", &empty).is_none());
    }

    // ── Mode ──────────────────────────────────────────────

    #[test]
    fn test_mode_from_bool_and_default() {
        assert_eq!(MatchMode::from(true), MatchMode::Fuzzy);
        assert_eq!(MatchMode::from(false), MatchMode::Strict);
        assert_eq!(MatchMode::default(), MatchMode::Fuzzy);
        assert_eq!(MatchMode::Strict.tiers(), &[MatchTier::Exact]);
    }

    #[test]
    fn test_mode_serde() {
        let mode: MatchMode = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(mode, MatchMode::Strict);
        assert_eq!(serde_json::to_string(&MatchMode::Fuzzy).unwrap(), "\"fuzzy\"");
    }

    // ── Index ─────────────────────────────────────────────

    #[test]
    fn test_index_keeps_first_insertion() {
        let mut index = NameIndex::new();
        assert!(index.insert("Name", 0));
        assert!(index.insert("name", 1));
        assert!(!index.insert("Name", 2));
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("Name", MatchMode::Fuzzy), Some((0, MatchTier::Exact)));
        assert_eq!(index.lookup("NAME", MatchMode::Fuzzy), Some((0, MatchTier::CaseInsensitive)));
        assert_eq!(index.lookup("NAME", MatchMode::Strict), None);
    }

    #[test]
    fn test_index_tier_preference() {
        let mut index = NameIndex::new();
        index.insert("Full_Name", 0);
        index.insert("fullname", 1);
        assert_eq!(
            index.lookup("FullName", MatchMode::Fuzzy),
            Some((1, MatchTier::CaseInsensitive))
        );
    }

    #[test]
    fn test_index_lookup_all_orders_by_tier() {
        let mut index = NameIndex::new();
        index.insert("ADD", 0);
        index.insert("add", 1);
        index.insert("Add", 2);
        assert_eq!(
            index.lookup_all("Add", MatchMode::Fuzzy),
            vec![
                (2, MatchTier::Exact),
                (0, MatchTier::CaseInsensitive),
                (1, MatchTier::CaseInsensitive),
            ]
        );
        assert_eq!(index.lookup_all("add", MatchMode::Strict), vec![(1, MatchTier::Exact)]);
        assert!(index.lookup_all("sub", MatchMode::Fuzzy).is_empty());
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(
            requested in "[A-Za-z_ .-]{0,8}",
            candidates in proptest::collection::vec("[A-Za-z_ .-]{0,8}", 0..6),
        ) {
            let first = fuzzy().resolve(&requested, &candidates);
            let second = fuzzy().resolve(&requested, &candidates);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn index_agrees_with_resolver(
            requested in "[A-Za-z_-]{1,6}",
            candidates in proptest::collection::vec("[A-Za-z_-]{1,6}", 1..6),
        ) {
            let mut index = NameIndex::new();
            for (slot, name) in candidates.iter().enumerate() {
                index.insert(name, slot);
            }
            let linear = fuzzy().resolve(&requested, &candidates).map(|r| (r.index, r.tier));
            prop_assert_eq!(index.lookup(&requested, MatchMode::Fuzzy), linear);
        }

        #[test]
        fn present_name_resolves_exactly(
            name in "[A-Za-z]{1,6}",
            others in proptest::collection::vec("[A-Za-z_]{1,6}", 0..4),
        ) {
            let mut candidates = others;
            candidates.push(name.clone());
            let r = fuzzy().resolve(&name, &candidates).unwrap();
            prop_assert_eq!(r.tier, MatchTier::Exact);
            prop_assert_eq!(r.name, name);
        }
    }
}
