//! The filter query language: tokenising a query string into an
//! operator/term sequence (spec §4.3) and resolving each term's word
//! against a dictionary into concrete entry combinations (spec §4.4).

use crate::base::HashMap;
use crate::dictionary::{Dictionary, DictionaryEntry, WordFilter};
use crate::error::{FilterErrorCode, FilterParseError};
use crate::example::ExampleFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Adjacent,
    Follow,
    AdjacentBoth,
    Before,
    Surrounding,
}

/// Longest-match-first token list, paired with its uppercase word form.
const OPERATORS: &[(&str, Operator)] = &[
    (">+<", Operator::Surrounding),
    ("++", Operator::AdjacentBoth),
    ("+>>", Operator::Before),
    ("+>", Operator::Follow),
    ("+", Operator::Adjacent),
    ("&&", Operator::And),
    ("||", Operator::Or),
    ("SURROUNDING", Operator::Surrounding),
    ("SURROUNDED BY", Operator::Surrounding),
    ("BEFORE", Operator::Before),
    ("FOLLOWED BY", Operator::Follow),
    ("NEXT TO", Operator::Adjacent),
    ("AND", Operator::And),
    ("OR", Operator::Or),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerm {
    pub operator: Operator,
    pub word: String,
    pub constraints: WordFilter,
    pub not: bool,
    pub is_text: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagConstraint {
    pub flag: ExampleFlag,
    pub negate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub terms: Vec<FilterTerm>,
    pub source_id: Option<String>,
    pub flags: Vec<FlagConstraint>,
    pub no_adjacent: bool,
}

const MAX_TERMS: usize = 8;
const MAX_CONSTRAINTS: usize = 8;

/// Finds the leftmost, longest-matching operator token in `s`, returning
/// its position, the operator, and the byte length consumed.
fn find_operator(s: &str) -> Option<(usize, Operator, usize)> {
    let mut best: Option<(usize, Operator, usize)> = None;
    for &(token, op) in OPERATORS {
        if let Some(pos) = s.find(token) {
            let better = match best {
                None => true,
                Some((best_pos, _, best_len)) => pos < best_pos || (pos == best_pos && token.len() > best_len),
            };
            if better {
                best = Some((pos, op, token.len()));
            }
        }
    }
    best
}

pub fn parse_filter(input: &str) -> Result<Filter, FilterParseError> {
    let mut filter = Filter::default();
    let mut rest = input;
    let mut next_operator = Operator::And;
    let mut term_index = 0usize;

    while !rest.is_empty() {
        let operator = next_operator;
        let term_string;

        match find_operator(rest) {
            Some((pos, op, len)) => {
                term_string = &rest[..pos];
                next_operator = op;
                rest = &rest[pos + len..];
            }
            None => {
                term_string = rest;
                rest = &rest[rest.len()..];
            }
        }

        let term_string = term_string.trim();
        let not = term_string.starts_with('!');
        let term_string = if not { &term_string[1..] } else { term_string };

        if term_string.is_empty() {
            return Err(FilterParseError { term: term_index, code: FilterErrorCode::EmptyQueryTerm, message: "A filter term cannot be empty.".to_string() });
        }

        if operator == Operator::And {
            if let Some(id) = term_string.strip_prefix("src:") {
                filter.source_id = Some(id.to_string());
                continue;
            }

            if let Some(flag_str) = term_string.strip_prefix("flag:") {
                let (negate, name) = match flag_str.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, flag_str),
                };
                let flag: ExampleFlag = name.parse().map_err(|_| FilterParseError {
                    term: term_index,
                    code: FilterErrorCode::FlagNotUnderstood,
                    message: "The flag you specified is not found.".to_string(),
                })?;
                filter.flags.push(FlagConstraint { flag, negate });
                continue;
            }

            if matches!(term_string, "opt:noadjacent" | "opt:no_adjacent" | "option:no_adjacent") {
                filter.no_adjacent = true;
                continue;
            }
        }

        let (word, is_text, constraints) = if let Some(quoted) = term_string.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            let text = &quoted[..end];
            let remainder = quoted.get(end + 1..).unwrap_or("").strip_prefix(':').unwrap_or("");

            if remainder.contains(':') {
                return Err(FilterParseError {
                    term: term_index,
                    code: FilterErrorCode::TextFilterConstraints,
                    message: "A text filter term can only take one constraint (the translation language).".to_string(),
                });
            }

            let constraints = if remainder.is_empty() { Vec::new() } else { vec![remainder.to_string()] };
            (text.to_string(), true, constraints)
        } else {
            let split: Vec<&str> = term_string.splitn(MAX_CONSTRAINTS + 2, ':').collect();
            if split.len() > MAX_CONSTRAINTS + 1 {
                return Err(FilterParseError {
                    term: term_index,
                    code: FilterErrorCode::TooManyConstraints,
                    message: "A filter term cannot have more than 8 constraints.".to_string(),
                });
            }
            (split[0].to_string(), false, split[1..].iter().map(|s| s.to_string()).collect())
        };

        filter.terms.push(FilterTerm { operator, word, constraints: WordFilter(constraints), not, is_text });

        term_index += 1;
        if term_index == MAX_TERMS && !rest.is_empty() {
            return Err(FilterParseError { term: term_index, code: FilterErrorCode::TooManyTerms, message: "A filter cannot have more than 8 terms.".to_string() });
        }
    }

    Ok(filter)
}

/// The Cartesian product of candidate dictionary entries for every
/// resolvable term, as an ordered list of `term_index -> entry` maps.
pub fn resolve(filter: &Filter, dictionary: &dyn Dictionary, allow_reef: bool) -> Result<Vec<HashMap<usize, DictionaryEntry>>, FilterParseError> {
    let mut maps: Vec<HashMap<usize, DictionaryEntry>> = vec![HashMap::default()];

    for (i, term) in filter.terms.iter().enumerate() {
        if term.is_text || term.word == "*" {
            continue;
        }

        let entries = dictionary.lookup(&term.word, allow_reef).unwrap_or_default();
        let filtered: Vec<DictionaryEntry> = entries.into_iter().filter(|e| term.constraints.check(e, false)).collect();

        if filtered.is_empty() {
            return Err(FilterParseError {
                term: i,
                code: FilterErrorCode::NoMatchedEntries,
                message: format!("No dictionary entry matched word or constraints of {}", term.word),
            });
        }

        for m in maps.iter_mut() {
            m.insert(i, filtered[0].clone());
        }

        let existing = maps.clone();
        for entry in &filtered[1..] {
            for m in &existing {
                let mut m2 = m.clone();
                m2.insert(i, entry.clone());
                maps.push(m2);
            }
        }
    }

    Ok(maps)
}

impl Filter {
    /// True when no term narrows the search to a posting list — every
    /// term is a text search or a wildcard — so a full scan is required.
    pub fn needs_full_list(&self) -> bool {
        self.terms.iter().all(|t| t.is_text || t.word == "*")
    }

    /// Groups resolved entries by `OR`-separated term run, for picking the
    /// shortest posting list to scan within each run.
    pub fn word_lookup_strategy(&self, resolved: &HashMap<usize, DictionaryEntry>) -> Vec<Vec<DictionaryEntry>> {
        let mut groups: Vec<Vec<DictionaryEntry>> = Vec::new();
        let mut current: Vec<DictionaryEntry> = Vec::new();

        for (i, term) in self.terms.iter().enumerate() {
            if term.operator == Operator::Or && !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            if !term.is_text && term.word != "*" {
                if let Some(entry) = resolved.get(&i) {
                    current.push(entry.clone());
                }
            }
        }

        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_term_is_an_error() {
        let err = parse_filter("  ").unwrap_err();
        assert_eq!(err.code, FilterErrorCode::EmptyQueryTerm);
    }

    #[test]
    fn nine_terms_is_too_many() {
        let query = (0..9).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" && ");
        let err = parse_filter(&query).unwrap_err();
        assert_eq!(err.code, FilterErrorCode::TooManyTerms);
    }

    #[test]
    fn src_and_flag_prefixes_are_consumed() {
        let f = parse_filter("src:NAVITERI2014 && flag:non_canon && tute").unwrap();
        assert_eq!(f.source_id.as_deref(), Some("NAVITERI2014"));
        assert_eq!(f.flags, vec![FlagConstraint { flag: ExampleFlag::NonCanon, negate: false }]);
        assert_eq!(f.terms.len(), 1);
        assert_eq!(f.terms[0].word, "tute");
    }

    #[test]
    fn operator_tokenization_longest_match_first() {
        let f = parse_filter("ikran +> tsyal").unwrap();
        assert_eq!(f.terms.len(), 2);
        assert_eq!(f.terms[1].operator, Operator::Follow);
    }

    #[test]
    fn adjacent_both_vs_adjacent() {
        let both = parse_filter("a ++ b").unwrap();
        assert_eq!(both.terms[1].operator, Operator::AdjacentBoth);
        let either = parse_filter("a + b").unwrap();
        assert_eq!(either.terms[1].operator, Operator::Adjacent);
    }

    #[test]
    fn negation_and_constraints() {
        let f = parse_filter("!tute:n.").unwrap();
        assert!(f.terms[0].not);
        assert_eq!(f.terms[0].constraints.0, vec!["n.".to_string()]);
    }

    #[test]
    fn quoted_text_term() {
        let f = parse_filter("\"i see you\":en").unwrap();
        assert!(f.terms[0].is_text);
        assert_eq!(f.terms[0].word, "i see you");
        assert_eq!(f.terms[0].constraints.0, vec!["en".to_string()]);
    }
}
