//! Text normalization and tokenization (spec §4.1, component C1).
//!
//! The classifier and similarity index both depend on tokens being stable
//! across evasion attempts; hidden formatting characters are a known way to
//! split up a banned word so it survives naive tokenization, so cleaning
//! happens before anything else touches the text.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

/// Zero-width and invisible formatting code points that must be stripped
/// before tokenization. This list is deliberately explicit rather than
/// derived from a Unicode category, so it can't silently grow or shrink
/// across a Unicode version bump.
const INVISIBLE_CHARS: &[char] = &[
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{2060}', // word joiner
    '\u{2062}', // invisible times
    '\u{2063}', // invisible separator
    '\u{2064}', // invisible plus
    '\u{2068}', // first strong isolate
    '\u{2069}', // pop directional isolate
    '\u{206F}', // nominal digit shapes
    '\u{FEFF}', // zero width no-break space / BOM
];

/// Removes zero-width joiners and other invisible formatting characters
/// without touching visible glyphs.
pub fn clean(text: &str) -> String {
    if !text.chars().any(|c| INVISIBLE_CHARS.contains(&c)) {
        return text.to_owned();
    }

    text.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect()
}

/// Lowercases `text`, splits it on runs of non-letter/non-digit characters,
/// and returns a multiset of the resulting tokens, excluding any token
/// present in `excluded`.
pub fn tokenize(text: &str, excluded: &HashSet<String>) -> HashMap<String, usize> {
    let cleaned = clean(text);
    let lowered = cleaned.to_lowercase();

    let mut counts = HashMap::new();
    for token in lowered.split(|c: char| !(c.is_alphanumeric())) {
        if token.is_empty() {
            continue;
        }
        if excluded.contains(token) {
            continue;
        }
        *counts.entry(token.to_owned()).or_insert(0usize) += 1;
    }

    counts
}

/// Same as [`tokenize`], but returns the distinct token set rather than a
/// multiset (used to build [`crate::model::Document`]s for the classifier,
/// per spec §3: "duplicates within a single document collapse to a set").
pub fn tokenize_unique(text: &str, excluded: &HashSet<String>) -> HashSet<String> {
    tokenize(text, excluded).into_keys().collect()
}

/// Reads non-empty, trimmed lines out of `reader`. Used to load stop-word,
/// sample, and excluded-token files (spec §6), all of which share the same
/// "UTF-8, one entry per line, blank lines skipped" shape.
pub fn read_lines<R: std::io::Read>(reader: R) -> std::io::Result<Vec<String>> {
    let buffered = std::io::BufReader::new(reader);
    let mut lines = Vec::new();
    for line in buffered.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_owned());
        }
    }
    Ok(lines)
}

/// Lazily yields non-empty, trimmed lines across the concatenation of
/// `readers`, in order (spec §4.1: `readerIterator(readers…)`). Unlike
/// [`read_lines`] this accepts any number of sources and never collects
/// eagerly — a caller chaining several large fixture files together can
/// stop pulling from the iterator as soon as it has what it needs.
pub fn reader_iterator<R: std::io::Read>(
    readers: impl IntoIterator<Item = R>,
) -> impl Iterator<Item = std::io::Result<String>> {
    readers.into_iter().flat_map(|reader| {
        std::io::BufReader::new(reader).lines().filter_map(|line| match line {
            Ok(line) => {
                let trimmed = line.trim().to_owned();
                (!trimmed.is_empty()).then_some(Ok(trimmed))
            }
            Err(err) => Some(Err(err)),
        })
    })
}
