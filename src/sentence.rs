//! The sentence model and its hand-written recursive-descent parser.
//!
//! A `Sentence` is a flat list of `SentencePart`s. Parts carry the word ids
//! they belong to (an id-less part is punctuation or whitespace), and the
//! full scheme supports alternate spellings, hidden lookup text, glued
//! composite words, and line breaks. `parse`/`to_string` round-trip for
//! every sentence this corpus actually contains (see the test table below).

use crate::base::{HashMap, HashSet};
use std::fmt::Write as _;

/// Characters that end a run of word text. `-` is deliberately excluded
/// here and handled as its own case in `scan_word_text`, since it doubles
/// as the prepend marker.
const BOUNDARY: &[char] = &[
    '.', ',', ';', ':', '–', '—', '!', '?', ' ', '(', ')', '[', ']', '{', '}', '/', '\n',
];

fn is_boundary(c: char) -> bool {
    BOUNDARY.contains(&c) || c.is_ascii_digit()
}

fn is_sentence_ender(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SentencePart {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<u32>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_text: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub alt: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub newline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub prepend: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub sentence_boundary: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl SentencePart {
    pub fn has_id(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn has_any_id(&self, ids: &[u32]) -> bool {
        ids.iter().any(|id| self.has_id(*id))
    }

    /// The text used for dictionary lookup: `hidden_text` if present, else `text`.
    pub fn lookup_text(&self) -> &str {
        self.hidden_text.as_deref().unwrap_or(&self.text)
    }

    /// Whether round-tripping this part requires a bracket form.
    ///
    /// An id-bearing part needs wrapping whenever its text would
    /// otherwise be cut short by the id/word scanners: hidden lookup
    /// text, or any boundary character. A bare (id-less) part is usually
    /// safe unwrapped — the scanner reassembles a run of plain text or a
    /// merged run of boundary characters the same way either way — except
    /// when its text itself contains a bracket character, since the
    /// parser checks for a bracket opener before it ever looks for an id,
    /// so an unwrapped `(x)` would be misread as a fresh bracket group.
    fn needs_wrapping(&self) -> bool {
        if self.hidden_text.is_some() {
            return true;
        }
        if self.ids.is_empty() {
            return self.text.contains(['(', ')', '{', '}']);
        }
        self.text.chars().any(is_boundary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Sentence(pub Vec<SentencePart>);

impl std::ops::Deref for Sentence {
    type Target = [SentencePart];
    fn deref(&self) -> &[SentencePart] {
        &self.0
    }
}

impl std::ops::DerefMut for Sentence {
    fn deref_mut(&mut self) -> &mut [SentencePart] {
        &mut self.0
    }
}

impl FromIterator<SentencePart> for Sentence {
    fn from_iter<I: IntoIterator<Item = SentencePart>>(iter: I) -> Self {
        Sentence(iter.into_iter().collect())
    }
}

/// Parse state: alongside each pushed part, whether it used a bracket
/// form. Kept only for the duration of parsing (the punctuation-merge
/// rule needs it); the serializer re-derives bracket need from content,
/// not from how the source text happened to be written.
struct Scanner<'a> {
    parts: Vec<SentencePart>,
    bracketed: Vec<bool>,
    rest: &'a str,
}

fn push_part(s: &mut Scanner, part: SentencePart, bracketed: bool) {
    s.parts.push(part);
    s.bracketed.push(bracketed);
}

pub fn parse(raw: &str) -> Sentence {
    let mut s = Scanner { parts: Vec::with_capacity(raw.len() / 4), bracketed: Vec::new(), rest: raw };

    while !s.rest.is_empty() {
        let alt = consume_prefix(&mut s.rest, '/');
        let newline = consume_prefix(&mut s.rest, '\n');

        let (ids, has_id) = scan_ids(&mut s.rest);

        if let Some(open) = s.rest.chars().next().filter(|&c| c == '(' || c == '{') {
            let close = if open == '(' { ')' } else { '}' };
            s.rest = &s.rest[open.len_utf8()..];
            let end = s.rest.find(close).unwrap_or(s.rest.len());
            let inner = &s.rest[..end];
            s.rest = if end < s.rest.len() { &s.rest[end + close.len_utf8()..] } else { &s.rest[end..] };

            let (hidden_text, text) = split_hidden(inner);
            let mut prepend = false;
            if has_id && !text.is_empty() && s.rest.starts_with('-') {
                prepend = true;
                s.rest = &s.rest[1..];
            }

            push_part(
                &mut s,
                SentencePart { ids, text, hidden_text, alt, newline, prepend, sentence_boundary: false },
                true,
            );
            continue;
        }

        if has_id {
            let (text, prepend) = scan_word_text(&mut s.rest);
            push_part(
                &mut s,
                SentencePart { ids, text, hidden_text: None, alt, newline, prepend, sentence_boundary: false },
                false,
            );
            continue;
        }

        let idx = s.rest.find(is_boundary).unwrap_or(s.rest.len());
        if idx == 0 {
            let ch = s.rest.chars().next().unwrap();
            let chunk = &s.rest[..ch.len_utf8()];
            s.rest = &s.rest[ch.len_utf8()..];

            let can_append = !newline
                && !s.parts.is_empty()
                && !*s.bracketed.last().unwrap()
                && s.parts.last().unwrap().ids.is_empty();

            if can_append {
                let last = s.parts.last_mut().unwrap();
                last.text.push_str(chunk);
                if is_sentence_ender(ch) {
                    last.sentence_boundary = true;
                }
            } else {
                let sentence_boundary = is_sentence_ender(ch);
                push_part(&mut s, SentencePart { text: chunk.to_string(), alt, newline, sentence_boundary, ..Default::default() }, false);
            }
            continue;
        }

        let chunk = &s.rest[..idx];
        s.rest = &s.rest[idx..];
        push_part(&mut s, SentencePart { text: chunk.to_string(), alt, newline, ..Default::default() }, false);
    }

    for part in s.parts.iter_mut() {
        normalize_quotes(&mut part.text);
        if let Some(hidden) = part.hidden_text.as_mut() {
            normalize_quotes(hidden);
        }
    }

    Sentence(s.parts)
}

fn consume_prefix(rest: &mut &str, c: char) -> bool {
    if let Some(stripped) = rest.strip_prefix(c) {
        *rest = stripped;
        true
    } else {
        false
    }
}

/// Scans `1` or `1+2+4` style id prefixes. A `+` only starts a new id
/// segment when followed by a digit, so a trailing `+` (no following
/// digit) is left for the text scanner instead of being treated as part
/// of a composite id.
fn scan_ids(rest: &mut &str) -> (Vec<u32>, bool) {
    let mut ids = Vec::new();
    let mut current: u32 = 0;
    let mut has_digit = false;

    loop {
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if c.is_ascii_digit() => {
                current = current * 10 + c.to_digit(10).unwrap();
                has_digit = true;
                *rest = &rest[1..];
            }
            Some('+') if chars.next().is_some_and(|c| c.is_ascii_digit()) => {
                ids.push(current);
                current = 0;
                *rest = &rest[1..];
            }
            _ => break,
        }
    }

    if has_digit {
        ids.push(current);
    }

    (ids, has_digit)
}

fn split_hidden(inner: &str) -> (Option<String>, String) {
    if let Some(idx) = inner.find('|') {
        (Some(inner[..idx].to_string()), inner[idx + 1..].to_string())
    } else {
        (None, inner.to_string())
    }
}

/// Scans the text of an id-tagged, non-bracketed part. A `-` terminates
/// the scan and is dropped (setting `prepend`) only once some text has
/// been accumulated; a leading `-` is just ordinary text.
fn scan_word_text(rest: &mut &str) -> (String, bool) {
    let mut text = String::new();
    loop {
        let stop = rest.find(|c: char| is_boundary(c) || c == '-').unwrap_or(rest.len());
        text.push_str(&rest[..stop]);
        *rest = &rest[stop..];

        if rest.starts_with('-') {
            if !text.is_empty() {
                *rest = &rest[1..];
                return (text, true);
            }
            text.push('-');
            *rest = &rest[1..];
            continue;
        }
        return (text, false);
    }
}

fn normalize_quotes(text: &mut String) {
    const QUOTES: [char; 3] = ['\u{2018}', '\u{2019}', '\u{02BC}'];
    if text.contains(QUOTES) {
        *text = text.replace(QUOTES, "'");
    }
}

impl std::fmt::Display for Sentence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if part.newline {
                f.write_char('\n')?;
            }
            if part.alt {
                f.write_char('/')?;
            }
            for (j, id) in part.ids.iter().enumerate() {
                if j > 0 {
                    f.write_char('+')?;
                }
                write!(f, "{id}")?;
            }

            let wrap = part.needs_wrapping() || (self.collides_with(i) && (self.collides_with_neighbor(i, -1) || self.collides_with_neighbor(i, 1)));

            if wrap {
                let brace = part.text.contains(['(', ')']);
                let (open, close) = if brace { ('{', '}') } else { ('(', ')') };
                f.write_char(open)?;
                if let Some(hidden) = &part.hidden_text {
                    f.write_str(hidden)?;
                    f.write_char('|')?;
                }
                f.write_str(&part.text)?;
                f.write_char(close)?;
            } else {
                f.write_str(&part.text)?;
            }
            if part.prepend {
                f.write_char('-')?;
            }
        }
        Ok(())
    }
}

impl Sentence {
    fn collides_with(&self, index: usize) -> bool {
        let part = &self.0[index];
        !part.ids.is_empty() && !part.newline && !part.alt
    }

    fn collides_with_neighbor(&self, index: usize, offset: isize) -> bool {
        let idx = index as isize + offset;
        if idx < 0 || idx as usize >= self.0.len() {
            return false;
        }
        self.collides_with(idx as usize)
    }

    /// Concatenated non-alt part text, preserving newlines.
    pub fn raw_text(&self) -> String {
        let mut out = String::with_capacity(64);
        for part in &self.0 {
            if part.alt {
                continue;
            }
            if part.newline {
                out.push('\n');
            }
            out.push_str(&part.text);
        }
        out
    }

    /// Reconstructs the lookup string per id, per spec.md §4.1.
    pub fn word_map(&self) -> HashMap<u32, String> {
        let mut res: HashMap<u32, String> = HashMap::default();
        let mut no_space: HashSet<u32> = HashSet::default();

        for (i, part) in self.0.iter().enumerate() {
            if part.ids.is_empty() {
                continue;
            }

            let text = part.lookup_text();
            let next_has_id = self.0.get(i + 1).is_some_and(|p| !p.ids.is_empty());

            for &id in &part.ids {
                let entry = res.entry(id).or_default();
                if entry.is_empty() {
                    entry.push_str(text);
                } else if part.prepend {
                    *entry = format!("{text} {entry}");
                } else if no_space.contains(&id) {
                    entry.push_str(text);
                    no_space.remove(&id);
                } else {
                    entry.push(' ');
                    entry.push_str(text);
                }

                if next_has_id {
                    no_space.insert(id);
                }
            }
        }

        res
    }

    pub fn has_part_id(&self, id: u32) -> bool {
        self.0.iter().any(|part| part.has_id(id))
    }

    /// Finds substring occurrences of `query`, ignoring characters outside
    /// letters/space, case-insensitively, anchored on whitespace-bounded
    /// words via sentinel spaces. Each hit is the list of part indices it
    /// spans. Overlapping/adjacent hits are intentionally not merged (see
    /// spec.md §9's open question).
    pub fn search_raw(&self, query: &str) -> Vec<Vec<usize>> {
        let needle = normalize_for_search(query);
        if needle.trim().is_empty() {
            return vec![];
        }

        let mut haystack = String::from(" ");
        let mut part_of_byte: Vec<usize> = vec![usize::MAX];

        for (i, part) in self.0.iter().enumerate() {
            if part.alt {
                continue;
            }
            let normalized = normalize_for_search(&part.text);
            haystack.push_str(&normalized);
            part_of_byte.resize(haystack.len(), i);
        }
        haystack.push(' ');
        part_of_byte.push(usize::MAX);

        let mut hits = Vec::new();
        let mut search_from = 0;
        while search_from < haystack.len() {
            let Some(rel) = haystack[search_from..].find(&needle) else { break };
            let start = search_from + rel;
            let end = start + needle.len();

            let mut span: Vec<usize> = Vec::new();
            for &idx in &part_of_byte[start..end] {
                if idx != usize::MAX && !span.contains(&idx) {
                    span.push(idx);
                }
            }
            if !span.is_empty() {
                hits.push(span);
            }

            search_from = start + 1;
        }

        hits
    }

    /// Removes alt parts, swapping any alt selected by a span into the
    /// preceding non-alt slot, and renumbers every span's indices to the
    /// post-removal coordinate system.
    pub fn without_alts(&self, spans: &mut [Vec<usize>]) -> Sentence {
        let mut res: Vec<SentencePart> = Vec::with_capacity(self.0.len());
        let mut mapping: Vec<usize> = vec![0; self.0.len()];
        let mut last_non_alt: Option<usize> = None;

        for (i, part) in self.0.iter().enumerate() {
            if !part.alt {
                res.push(part.clone());
                let out_idx = res.len() - 1;
                mapping[i] = out_idx;
                last_non_alt = Some(out_idx);
                continue;
            }

            let selected = spans.iter().any(|span| span.contains(&i));
            match last_non_alt {
                Some(out_idx) => {
                    if selected {
                        let mut swapped = part.clone();
                        swapped.alt = false;
                        res[out_idx] = swapped;
                    }
                    mapping[i] = out_idx;
                }
                None => mapping[i] = 0,
            }
        }

        for span in spans.iter_mut() {
            for index in span.iter_mut() {
                *index = mapping[*index];
            }
        }

        Sentence(res)
    }

    pub fn next_linked(&self, index: usize) -> Option<usize> {
        self.0.iter().enumerate().skip(index + 1).find(|(_, p)| !p.ids.is_empty()).map(|(i, _)| i)
    }

    pub fn prev_linked(&self, index: usize) -> Option<usize> {
        self.0[..index].iter().enumerate().rev().find(|(_, p)| !p.ids.is_empty()).map(|(i, _)| i)
    }
}

fn normalize_for_search(s: &str) -> String {
    s.chars().filter(|c| c.is_alphabetic() || *c == ' ').flat_map(|c| c.to_lowercase()).collect()
}
