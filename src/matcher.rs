//! The example matcher: grows filter-term matches into part-index spans,
//! reconciles them against alternate spellings, and aligns them with each
//! translation (spec §4.5). The matcher never errors: a non-match is
//! simply `None`.

use crate::base::{HashMap, HashSet};
use crate::dictionary::DictionaryEntry;
use crate::example::Example;
use crate::filter::{Filter, Operator};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterMatch {
    pub example: Example,
    pub selections: Vec<u32>,
    pub spans: Vec<Vec<usize>>,
    pub translation_spans: HashMap<String, Vec<Vec<usize>>>,
    pub translation_adjacent: HashMap<String, Vec<Vec<usize>>>,
    pub word_map: HashMap<u32, String>,
}

/// Finds the leftmost substring hit of `term.word`, expanded via id
/// linkage, in either the main text or a named translation.
fn text_matches(word: &str, lang: Option<&str>, example: &Example) -> Vec<usize> {
    let Some(sentence) = (match lang {
        Some(l) => example.translations.get(l),
        None => Some(&example.text),
    }) else {
        return Vec::new();
    };

    let mut result = Vec::new();
    let mut ids: HashSet<u32> = HashSet::default();
    for hit in sentence.search_raw(word) {
        ids.clear();
        for &idx in &hit {
            ids.extend(sentence[idx].ids.iter().copied());
        }
        for (j, part) in example.text.iter().enumerate() {
            if part.ids.iter().any(|id| ids.contains(id)) {
                result.push(j);
            }
        }
    }
    result.sort_unstable();
    result.dedup();
    result
}

fn word_matches(term: &crate::filter::FilterTerm, entry: &DictionaryEntry, example: &Example) -> (Vec<usize>, Vec<u32>) {
    let mut matches = Vec::new();
    let mut selections = Vec::new();

    for (&id, words) in &example.words {
        for word in words {
            let matches_word = word.id == entry.id || term.word == "*";
            let passed = matches_word && term.constraints.check(word, true);
            if passed != term.not {
                for (j, part) in example.text.iter().enumerate() {
                    if part.has_id(id) {
                        matches.push(j);
                    }
                }
                selections.push(id);
                break;
            }
        }
    }

    matches.sort_unstable();
    matches.dedup();
    (matches, selections)
}

fn extend_adjacent(spans: &mut [Vec<usize>], expandable_start: usize, matches: &[usize], example: &Example, operator: Operator) -> bool {
    let mut found_any = false;

    for span in spans.iter_mut().skip(expandable_start) {
        if span.is_empty() {
            continue;
        }

        let mut matched_after = false;
        let mut matched_before = false;

        if let Some(next) = example.text.next_linked(*span.last().unwrap()) {
            if matches.contains(&next) {
                span.push(next);
                matched_after = true;
                found_any = true;
            }
        }

        if operator != Operator::Follow {
            if let Some(prev) = example.text.prev_linked(span[0]) {
                if matches.contains(&prev) {
                    span.insert(0, prev);
                    matched_before = true;
                    found_any = true;
                }
            }
        }

        let keep = if operator == Operator::AdjacentBoth { matched_after && matched_before } else { matched_after || matched_before };
        if !keep {
            span.clear();
        }
    }

    found_any
}

fn extend_before(spans: &mut [Vec<usize>], expandable_start: usize, matches: &[usize]) -> bool {
    let mut found_any = false;

    for span in spans.iter_mut().skip(expandable_start) {
        if span.is_empty() {
            continue;
        }

        let last = *span.last().unwrap();
        let attach = matches.iter().filter(|&&m| m > last).min().copied();
        match attach {
            Some(m) => {
                span.push(m);
                found_any = true;
            }
            None => span.clear(),
        }
    }

    found_any
}

fn extend_surrounding(spans: &mut [Vec<usize>], expandable_start: usize, matches: &[usize]) -> bool {
    let mut found_any = false;

    for span in spans.iter_mut().skip(expandable_start) {
        if span.len() < 2 {
            span.clear();
            continue;
        }

        let mut spliced = false;
        'pairs: for k in 0..span.len() - 1 {
            let (lo, hi) = (span[k], span[k + 1]);
            let between: Vec<usize> = matches.iter().copied().filter(|&m| m > lo && m < hi).collect();
            if !between.is_empty() {
                span.splice(k + 1..k + 1, between);
                spliced = true;
                break 'pairs;
            }
        }

        if spliced {
            found_any = true;
        } else {
            span.clear();
        }
    }

    found_any
}

pub fn check_example(filter: &Filter, example: &Example, resolved: &HashMap<usize, DictionaryEntry>) -> Option<FilterMatch> {
    if let Some(source_id) = &filter.source_id {
        if &example.source.id != source_id {
            return None;
        }
    }

    for constraint in &filter.flags {
        let has = example.has_flag(constraint.flag);
        if has == constraint.negate {
            return None;
        }
    }

    let mut spans: Vec<Vec<usize>> = Vec::new();
    let mut selections: Vec<u32> = Vec::new();
    let mut expandable_start = 0usize;
    let default_entry = DictionaryEntry::default();

    let mut i = 0usize;
    while i < filter.terms.len() {
        let term = &filter.terms[i];
        let entry = resolved.get(&i).unwrap_or(&default_entry);

        let (matches, term_selections) = if term.is_text {
            let lang = term.constraints.0.first().map(String::as_str);
            (text_matches(&term.word, lang, example), Vec::new())
        } else {
            word_matches(term, entry, example)
        };

        let succeeded = match term.operator {
            Operator::And => {
                if matches.is_empty() {
                    false
                } else {
                    expandable_start = spans.len();
                    spans.extend(matches.iter().map(|&m| vec![m]));
                    true
                }
            }
            Operator::Or => {
                expandable_start = spans.len();
                spans.extend(matches.iter().map(|&m| vec![m]));
                true
            }
            Operator::Adjacent | Operator::Follow | Operator::AdjacentBoth => {
                extend_adjacent(&mut spans, expandable_start, &matches, example, term.operator)
            }
            Operator::Before => extend_before(&mut spans, expandable_start, &matches),
            Operator::Surrounding => extend_surrounding(&mut spans, expandable_start, &matches),
        };

        if succeeded {
            selections.extend(term_selections);
            i += 1;
            continue;
        }

        match filter.terms[i + 1..].iter().position(|t| t.operator == Operator::Or) {
            Some(offset) => {
                spans.clear();
                selections.clear();
                expandable_start = 0;
                i += 1 + offset;
            }
            None => return None,
        }
    }

    let mut example = example.clone();
    example.text = example.text.without_alts(&mut spans);
    for translation in example.translations.values_mut() {
        *translation = translation.without_alts(&mut spans);
    }

    spans.retain(|span| !span.is_empty());

    selections.retain(|&id| spans.iter().any(|span| span.iter().any(|&idx| example.text[idx].has_id(id))));

    if selections.is_empty() && !filter.terms.is_empty() {
        return None;
    }

    let mut translation_spans: HashMap<String, Vec<Vec<usize>>> = HashMap::default();
    let mut translation_adjacent: HashMap<String, Vec<Vec<usize>>> = HashMap::default();
    let non_adjacent: HashSet<usize> = if filter.no_adjacent { spans.iter().flatten().copied().collect() } else { HashSet::default() };

    for (lang, translated) in &example.translations {
        if translated.is_empty() {
            continue;
        }

        let mut lang_spans = vec![Vec::new(); spans.len()];
        let mut lang_adjacent = vec![Vec::new(); spans.len()];
        let is_en = lang == "en";

        for (i, span) in spans.iter().enumerate() {
            let mut ids: Vec<u32> = Vec::new();
            let mut seen: HashSet<u32> = HashSet::default();
            for &idx in span {
                for &id in &example.text[idx].ids {
                    if seen.insert(id) {
                        ids.push(id);
                    }
                }
            }

            let mut rev_ids: Vec<u32> = Vec::new();
            let mut rev_seen: HashSet<u32> = HashSet::default();
            for (j, part) in translated.iter().enumerate() {
                if part.has_any_id(&ids) {
                    for &id in &part.ids {
                        if rev_seen.insert(id) {
                            rev_ids.push(id);
                        }
                    }
                    lang_spans[i].push(j);
                }
            }

            for (j, part) in example.text.iter().enumerate() {
                let in_span = span.contains(&j);
                if !in_span && part.has_any_id(&rev_ids) {
                    if is_en && filter.no_adjacent && !non_adjacent.contains(&j) {
                        return None;
                    }
                    lang_adjacent[i].push(j);
                }
            }
        }

        translation_spans.insert(lang.clone(), lang_spans);
        translation_adjacent.insert(lang.clone(), lang_adjacent);
    }

    let word_map = example.text.word_map();
    Some(FilterMatch { example, selections, spans, translation_spans, translation_adjacent, word_map })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::MemoryDictionary;
    use crate::example::{new_example, Input, Source};
    use crate::filter::parse_filter;

    fn dict() -> MemoryDictionary {
        MemoryDictionary::new(vec![
            DictionaryEntry { id: "ikran".into(), word: "ikran".into(), pos: "n.".into(), ..Default::default() },
            DictionaryEntry { id: "tsyal".into(), word: "tsyal".into(), pos: "n.".into(), ..Default::default() },
            DictionaryEntry { id: "pa".into(), word: "pa".into(), pos: "det.".into(), ..Default::default() },
        ])
    }

    fn example(text: &str) -> Example {
        let input = Input { text: text.to_string(), source: Source { id: "s1".into(), date: "2024-01-01".into(), url: "u".into(), ..Default::default() }, ..Default::default() };
        new_example(&input, &dict()).unwrap()
    }

    #[test]
    fn followed_by_requires_adjacency() {
        let filter = parse_filter("ikran +> tsyal").unwrap();
        let resolved = &crate::filter::resolve(&filter, &dict(), false).unwrap()[0];

        let adjacent = example("1ikran 2tsyal.");
        let m = check_example(&filter, &adjacent, resolved);
        assert!(m.is_some());
        assert_eq!(m.unwrap().spans.len(), 1);

        let not_adjacent = example("1ikran 2pa 3tsyal.");
        assert!(check_example(&filter, &not_adjacent, resolved).is_none());
    }

    #[test]
    fn adjacent_both_requires_both_sides() {
        let filter = parse_filter("pa ++ ikran").unwrap();
        let resolved = &crate::filter::resolve(&filter, &dict(), false).unwrap()[0];
        let one_side = example("1pa 2ikran.");
        assert!(check_example(&filter, &one_side, resolved).is_none());
    }

    #[test]
    fn source_id_must_match() {
        let filter = parse_filter("src:other && ikran").unwrap();
        let resolved = &crate::filter::resolve(&filter, &dict(), false).unwrap()[0];
        assert!(check_example(&filter, &example("1ikran."), resolved).is_none());
    }
}
