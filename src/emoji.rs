//! Emoji counting and stripping (spec §4.2, component C2).
//!
//! Counting is done over grapheme clusters rather than code points so a ZWJ
//! sequence (e.g. a family or flag emoji built from several code points
//! joined by U+200D) counts once, and a variation selector or skin-tone
//! modifier attached to a base emoji doesn't inflate the count.

use unicode_segmentation::UnicodeSegmentation;

/// Inclusive code point ranges that make up "emoji" for this crate's
/// purposes. This is a practical working set (misc symbols, emoticons,
/// transport/map symbols, supplemental symbols, dingbats, and the regional
/// indicator range used for flags), not an attempt at completeness against
/// every future Unicode emoji addition.
const EMOJI_BLOCKS: &[(u32, u32)] = &[
    (0x1F300, 0x1F5FF), // misc symbols and pictographs
    (0x1F600, 0x1F64F), // emoticons
    (0x1F680, 0x1F6FF), // transport and map symbols
    (0x1F900, 0x1F9FF), // supplemental symbols and pictographs
    (0x1FA70, 0x1FAFF), // symbols and pictographs extended-a
    (0x2600, 0x26FF),   // misc symbols
    (0x2700, 0x27BF),   // dingbats
    (0x1F1E6, 0x1F1FF), // regional indicators (flags)
    (0x2300, 0x23FF),   // misc technical (includes ⌚ ⏰ etc.)
];

fn is_emoji_base(c: char) -> bool {
    let cp = c as u32;
    EMOJI_BLOCKS.iter().any(|&(lo, hi)| cp >= lo && cp <= hi)
}

fn cluster_is_emoji(cluster: &str) -> bool {
    cluster.chars().any(is_emoji_base)
}

/// Counts grapheme clusters whose base code point falls in an emoji block.
/// A cluster joined with ZWJ (e.g. "👨‍👩‍👧") is one cluster and counts once;
/// a base emoji followed only by variation selectors/skin-tone modifiers
/// also counts once.
pub fn count_emoji(text: &str) -> usize {
    text.graphemes(true).filter(|g| cluster_is_emoji(g)).count()
}

/// Removes emoji grapheme clusters from `text`, preserving surrounding
/// whitespace.
pub fn clean_emoji(text: &str) -> String {
    text.graphemes(true)
        .filter(|g| !cluster_is_emoji(g))
        .collect()
}
