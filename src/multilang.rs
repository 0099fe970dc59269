//! Multilingual script-mixing heuristic (spec §4.12 step 5, the "optional"
//! Unicode-script check).
//!
//! Resolves the spec's Open Question about what "distinct Unicode script
//! families" means: letters are grouped into a handful of script families
//! (Latin, Cyrillic, Greek, Gothic, Coptic) via the `unicode-script` crate;
//! anything script-agnostic (digits, punctuation, common symbols) is
//! compatible with every family and never triggers a mix.

use unicode_script::{Script, UnicodeScript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ScriptFamily {
    Latin,
    Cyrillic,
    Greek,
    Gothic,
    Coptic,
}

fn classify(script: Script) -> Option<ScriptFamily> {
    match script {
        Script::Latin => Some(ScriptFamily::Latin),
        Script::Cyrillic => Some(ScriptFamily::Cyrillic),
        Script::Greek => Some(ScriptFamily::Greek),
        Script::Gothic => Some(ScriptFamily::Gothic),
        Script::Coptic => Some(ScriptFamily::Coptic),
        _ => None,
    }
}

/// A token "mixes scripts" if its letters span more than one recognized
/// script family (common/unrecognized characters don't count toward either
/// side).
fn token_mixes_scripts(token: &str) -> bool {
    let mut seen: Option<ScriptFamily> = None;
    for c in token.chars() {
        if !c.is_alphabetic() {
            continue;
        }
        if let Some(family) = classify(c.script()) {
            match seen {
                None => seen = Some(family),
                Some(existing) if existing != family => return true,
                _ => {}
            }
        }
    }
    false
}

/// Counts tokens whose letter runs mix distinct script families.
pub fn count_mixed_script_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> usize {
    tokens.into_iter().filter(|token| token_mixes_scripts(token)).count()
}
