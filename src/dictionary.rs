//! Dictionary entries and the `WordFilter` constraint language that checks
//! them (spec §4.2).

use crate::base::HashMap;
use crate::error::DictionaryError;
use once_cell::sync::Lazy;

static SUFFIX_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [("yä", "y"), ("ä", "y"), ("ru", "r"), ("ur", "r"), ("ti", "t"), ("it", "t"), ("ìri", "ri"), ("ìl", "l")]
        .into_iter()
        .collect()
});

static INFIX_ALIASES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| [("iyev", "ìyev"), ("eiy", "ei"), ("eng", "äng")].into_iter().collect());

fn canonical_suffix(s: &str) -> &str {
    SUFFIX_ALIASES.get(s).copied().unwrap_or(s)
}

fn canonical_infix(s: &str) -> &str {
    INFIX_ALIASES.get(s).copied().unwrap_or(s)
}

const VERB_POS: &[&str] = &["vtr.", "vin.", "vtrm.", "vim.", "ph."];

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct DictionaryEntry {
    pub id: String,
    pub word: String,
    pub pos: String,
    #[serde(default)]
    pub definitions: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub infixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suffixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lenitions: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl DictionaryEntry {
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.prefixes.iter().any(|p| p == prefix)
    }

    pub fn has_suffix(&self, suffix: &str) -> bool {
        let suffix = canonical_suffix(suffix);
        self.suffixes.iter().any(|s| canonical_suffix(s) == suffix)
    }

    pub fn has_infix(&self, infix: &str) -> bool {
        let infix = canonical_infix(infix);
        self.infixes.iter().any(|i| canonical_infix(i) == infix)
    }

    pub fn has_lenition(&self, lenition: &str) -> bool {
        let lenition = lenition.replacen("->", "\u{2192}", 1);
        self.lenitions.contains(&lenition)
    }

    pub fn is_verb(&self) -> bool {
        VERB_POS.contains(&self.pos.as_str())
    }

    /// Builds a `WordFilter` describing this entry's own morphology, for
    /// round-tripping a dictionary entry through the filter language.
    pub fn to_filter(&self) -> WordFilter {
        let mut wf = vec![self.id.clone(), self.pos.clone()];

        if self.prefixes.is_empty() && self.infixes.is_empty() && self.suffixes.is_empty() {
            wf.push("noaffix".to_string());
        } else {
            if !self.prefixes.is_empty() {
                wf.push(format!("={}-", self.prefixes.join("-")));
            } else {
                wf.push("noprefix".to_string());
            }
            if !self.infixes.is_empty() {
                wf.push(format!("=<{}>", self.infixes.join(" ")));
            } else {
                wf.push("noinfix".to_string());
            }
            if !self.suffixes.is_empty() {
                wf.push(format!("=-{}", self.suffixes.join("-")));
            } else {
                wf.push("nosuffix".to_string());
            }
        }

        if !self.lenitions.is_empty() {
            wf.push(format!("={}", self.lenitions.join(" ")));
        } else {
            wf.push("nolen".to_string());
        }

        WordFilter(wf)
    }
}

enum AltOutcome {
    Pass,
    Fail,
    Skip,
}

/// Checks one `|`-alternative against an entry. `check_modifiers = false`
/// treats affix/infix/lenition shapes as skipped rather than evaluated,
/// since at dictionary-resolution time morphology hasn't been checked
/// against the surface word yet.
fn check_alternative(entry: &DictionaryEntry, alt: &str, check_modifiers: bool) -> AltOutcome {
    let (exact, alt) = match alt.strip_prefix('=') {
        Some(rest) => (true, rest),
        None => (false, alt),
    };

    match alt {
        "nolen" => bool_outcome(entry.lenitions.is_empty()),
        "noaffix" => bool_outcome(entry.prefixes.is_empty() && entry.infixes.is_empty() && entry.suffixes.is_empty()),
        "noprefix" => bool_outcome(entry.prefixes.is_empty()),
        "noinfix" => bool_outcome(entry.infixes.is_empty()),
        "nosuffix" => bool_outcome(entry.suffixes.is_empty()),
        _ if alt.starts_with('-') && alt.ends_with('-') && alt.len() >= 2 => {
            if !check_modifiers {
                return AltOutcome::Skip;
            }
            let tokens: Vec<&str> = alt[1..alt.len() - 1].split('-').collect();
            let matched = tokens.iter().all(|t| entry.has_prefix(t) || entry.has_suffix(t));
            if !matched {
                return AltOutcome::Fail;
            }
            let count = entry.prefixes.len() + entry.suffixes.len();
            bool_outcome(!exact || count == tokens.len())
        }
        _ if alt.starts_with('-') => {
            if !check_modifiers {
                return AltOutcome::Skip;
            }
            let tokens: Vec<&str> = alt[1..].split('-').collect();
            let matched = tokens.iter().all(|t| entry.has_suffix(t));
            if !matched {
                return AltOutcome::Fail;
            }
            bool_outcome(!exact || entry.suffixes.len() == tokens.len())
        }
        _ if alt.ends_with('-') => {
            if !check_modifiers {
                return AltOutcome::Skip;
            }
            let tokens: Vec<&str> = alt[..alt.len() - 1].split('-').collect();
            let matched = tokens.iter().all(|t| entry.has_prefix(t));
            if !matched {
                return AltOutcome::Fail;
            }
            bool_outcome(!exact || entry.prefixes.len() == tokens.len())
        }
        _ if alt.starts_with('<') && alt.ends_with('>') => {
            if !check_modifiers {
                return AltOutcome::Skip;
            }
            let tokens: Vec<&str> = alt[1..alt.len() - 1].split(' ').collect();
            let matched = tokens.iter().all(|t| entry.has_infix(t));
            if !matched {
                return AltOutcome::Fail;
            }
            bool_outcome(!exact || entry.infixes.len() == tokens.len())
        }
        _ if alt.contains("->") || alt.contains('\u{2192}') => {
            if !check_modifiers {
                return AltOutcome::Skip;
            }
            let tokens: Vec<&str> = alt.split(' ').collect();
            let matched = tokens.iter().all(|t| entry.has_lenition(t));
            if !matched {
                return AltOutcome::Fail;
            }
            bool_outcome(!exact || entry.lenitions.len() == tokens.len())
        }
        _ if alt.contains('.') => {
            let pos_list: Vec<&str> = entry.pos.split(',').map(str::trim).collect();
            let matched = alt.split(',').map(str::trim).all(|wanted| pos_list.contains(&wanted));
            bool_outcome(matched)
        }
        _ => bool_outcome(entry.id == alt),
    }
}

fn bool_outcome(b: bool) -> AltOutcome {
    if b {
        AltOutcome::Pass
    } else {
        AltOutcome::Fail
    }
}

/// A sequence of colon-joined constraints; each constraint is a
/// `|`-separated disjunction of alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WordFilter(pub Vec<String>);

impl WordFilter {
    pub fn parse(s: &str) -> WordFilter {
        if s.is_empty() {
            return WordFilter::default();
        }
        WordFilter(s.split(':').map(str::to_string).collect())
    }

    /// `checkModifiers=false` bypasses affix/infix/lenition alternatives;
    /// if every alternative in a constraint was skipped this way, that
    /// constraint passes regardless (morphology is checked later).
    pub fn check(&self, entry: &DictionaryEntry, check_modifiers: bool) -> bool {
        if self.0.is_empty() {
            return true;
        }

        for constraint in &self.0 {
            let alternatives: Vec<&str> = constraint.split('|').collect();
            let mut ok = false;
            let mut skipped = 0usize;

            for alt in &alternatives {
                match check_alternative(entry, alt, check_modifiers) {
                    AltOutcome::Pass => {
                        ok = true;
                        break;
                    }
                    AltOutcome::Skip => skipped += 1,
                    AltOutcome::Fail => {}
                }
            }

            if !ok && skipped != alternatives.len() {
                return false;
            }
        }

        true
    }
}

impl std::fmt::Display for WordFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

/// Several `WordFilter`s, any of which may match (used for multi-sense
/// lookup filters supplied at save time).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiWordFilter(pub Vec<WordFilter>);

impl MultiWordFilter {
    pub fn parse(s: &str) -> MultiWordFilter {
        if s.is_empty() {
            return MultiWordFilter::default();
        }
        MultiWordFilter(s.split(';').map(|part| WordFilter::parse(part.trim())).collect())
    }

    pub fn check(&self, entry: &DictionaryEntry, check_modifiers: bool) -> bool {
        if self.0.is_empty() {
            return true;
        }
        self.0.iter().any(|wf| wf.check(entry, check_modifiers))
    }
}

impl std::fmt::Display for MultiWordFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|wf| wf.to_string()).collect();
        write!(f, "{}", parts.join(";"))
    }
}

pub trait Dictionary {
    fn entry(&self, id: &str) -> Result<DictionaryEntry, DictionaryError>;
    fn lookup(&self, word: &str, allow_reef: bool) -> Result<Vec<DictionaryEntry>, DictionaryError>;
}

/// Concatenates `lookup` across providers; `entry` takes the first
/// non-`NotFound` answer.
#[derive(Default)]
pub struct CombinedDictionary(pub Vec<Box<dyn Dictionary + Send + Sync>>);

impl Dictionary for CombinedDictionary {
    fn entry(&self, id: &str) -> Result<DictionaryEntry, DictionaryError> {
        for dict in &self.0 {
            match dict.entry(id) {
                Err(DictionaryError::NotFound) => continue,
                other => return other,
            }
        }
        Err(DictionaryError::NotFound)
    }

    fn lookup(&self, word: &str, allow_reef: bool) -> Result<Vec<DictionaryEntry>, DictionaryError> {
        let mut all = Vec::new();
        for dict in &self.0 {
            match dict.lookup(word, allow_reef) {
                Ok(entries) => all.extend(entries),
                Err(DictionaryError::NotFound) => {}
            }
        }
        Ok(all)
    }
}

/// Rewrites `pos` for productive derivations so that e.g. `rol-yu` matches
/// a query for `n.` even though the base dictionary tags it as a verb.
pub struct WithDerivedPoS<D> {
    sub: D,
}

impl<D: Dictionary> WithDerivedPoS<D> {
    pub fn new(sub: D) -> Self {
        WithDerivedPoS { sub }
    }

    fn derive(entry: &mut DictionaryEntry) {
        if entry.is_verb() {
            if (entry.has_prefix("tì") && entry.has_infix("us"))
                || entry.has_suffix("tswo")
                || entry.has_suffix("yu")
                || entry.has_suffix("siyu")
            {
                entry.pos = "n.".to_string();
            } else if entry.has_prefix("tsuk") || entry.has_prefix("ketsuk") || entry.has_infix("us") || entry.has_infix("awn") {
                entry.pos = "adj.".to_string();
            }
        } else if entry.pos == "adj." && entry.has_prefix("nì") {
            entry.pos = "adv.".to_string();
        } else if entry.pos.contains("adj.") && (entry.has_prefix("a") || entry.has_suffix("a")) {
            entry.pos = "adj.".to_string();
        }
    }
}

impl<D: Dictionary> Dictionary for WithDerivedPoS<D> {
    fn entry(&self, id: &str) -> Result<DictionaryEntry, DictionaryError> {
        let mut entry = self.sub.entry(id)?;
        Self::derive(&mut entry);
        Ok(entry)
    }

    fn lookup(&self, word: &str, allow_reef: bool) -> Result<Vec<DictionaryEntry>, DictionaryError> {
        let mut entries = self.sub.lookup(word, allow_reef)?;
        for entry in &mut entries {
            Self::derive(entry);
        }
        Ok(entries)
    }
}

/// In-process `Dictionary` reference implementation: a flat table of
/// entries, indexed by exact word and by id.
#[derive(Default)]
pub struct MemoryDictionary {
    entries: Vec<DictionaryEntry>,
    by_id: HashMap<String, usize>,
    by_word: HashMap<String, Vec<usize>>,
}

impl MemoryDictionary {
    pub fn new(entries: Vec<DictionaryEntry>) -> Self {
        let mut dict = MemoryDictionary::default();
        for entry in entries {
            dict.insert(entry);
        }
        dict
    }

    pub fn insert(&mut self, entry: DictionaryEntry) {
        let index = self.entries.len();
        self.by_id.insert(entry.id.clone(), index);
        self.by_word.entry(entry.word.to_lowercase()).or_default().push(index);
        self.entries.push(entry);
    }
}

impl Dictionary for MemoryDictionary {
    fn entry(&self, id: &str) -> Result<DictionaryEntry, DictionaryError> {
        self.by_id.get(id).map(|&i| self.entries[i].clone()).ok_or(DictionaryError::NotFound)
    }

    fn lookup(&self, word: &str, allow_reef: bool) -> Result<Vec<DictionaryEntry>, DictionaryError> {
        let indices = self.by_word.get(&word.to_lowercase());
        let entries: Vec<DictionaryEntry> = indices
            .into_iter()
            .flatten()
            .map(|&i| &self.entries[i])
            .filter(|e| allow_reef || e.source != "reef")
            .cloned()
            .collect();
        if entries.is_empty() {
            Err(DictionaryError::NotFound)
        } else {
            Ok(entries)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, pos: &str) -> DictionaryEntry {
        DictionaryEntry { id: id.to_string(), word: "w".to_string(), pos: pos.to_string(), ..Default::default() }
    }

    #[test]
    fn infix_constraint() {
        let mut e = entry("2648", "vtr.");
        e.infixes = vec!["ol".to_string()];
        assert!(WordFilter::parse("2648:<ol>").check(&e, true));
        assert!(!WordFilter::parse("2648:<ìlm>").check(&e, true));
    }

    #[test]
    fn suffix_constraint_requires_every_listed_suffix() {
        let mut e = entry("puk", "n.");
        e.suffixes = vec!["o".to_string(), "ti".to_string()];
        assert!(WordFilter::parse("-o-ti").check(&e, true));

        let mut e2 = entry("pefneuniltìranyu", "n.");
        e2.suffixes = vec!["ti".to_string()];
        assert!(!WordFilter::parse("-o-ti").check(&e2, true));
    }

    #[test]
    fn check_modifiers_false_skips_affix_alternatives() {
        let mut e = entry("x", "n.");
        e.suffixes = vec!["ti".to_string()];
        assert!(WordFilter::parse("-o-ti").check(&e, false));
    }

    #[test]
    fn pos_constraint_is_always_checked() {
        let e = entry("x", "n.");
        assert!(WordFilter::parse("n.").check(&e, false));
        assert!(!WordFilter::parse("vtr.").check(&e, false));
    }

    #[test]
    fn productive_derivation_of_noun_from_verb() {
        let mut e = entry("x", "vtr.");
        e.suffixes = vec!["yu".to_string()];
        WithDerivedPoS::<MemoryDictionary>::derive(&mut e);
        assert_eq!(e.pos, "n.");
    }

    #[test]
    fn to_filter_round_trips_through_parse() {
        let mut e = entry("tute", "n.");
        e.prefixes = vec!["a".to_string()];
        let wf = e.to_filter();
        let reparsed = WordFilter::parse(&wf.to_string());
        assert_eq!(wf, reparsed);
    }
}
