//! Label ranking for display-language selection.

use std::cmp::Reverse;

use crate::reference::{ReferenceLabel, PREF_LABEL};

/// Score for a label whose language equals the target exactly.
pub const EXACT_LANGUAGE_SCORE: i32 = 20;
/// Score for a label sharing only the primary subtag ("en" vs "en-GB").
pub const BASE_LANGUAGE_SCORE: i32 = 10;
/// Bonus for the preferred label kind.
pub const PREF_KIND_BONUS: i32 = 4;
/// Bonus for alternate labels.
pub const ALT_KIND_BONUS: i32 = 2;
/// Bonus for hidden labels; below alternates, above notes.
pub const HIDDEN_KIND_BONUS: i32 = 1;

fn normalize(tag: &str) -> String {
    tag.trim().replace('_', "-").to_lowercase()
}

fn primary_subtag(tag: &str) -> String {
    normalize(tag)
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Score one label against the target display language.
///
/// Language match dominates kind: an exact-language altLabel always
/// outranks a fallback-language prefLabel. Scores tie only when both
/// components tie, so ordering by score is total once combined with a
/// fixed secondary key.
pub fn rank_label(kind: &str, source_lang: &str, target_lang: &str) -> i32 {
    let language_score = if normalize(source_lang) == normalize(target_lang) {
        EXACT_LANGUAGE_SCORE
    } else if primary_subtag(source_lang) == primary_subtag(target_lang) {
        BASE_LANGUAGE_SCORE
    } else {
        0
    };

    let kind_score = match kind {
        k if k == PREF_LABEL => PREF_KIND_BONUS,
        "altLabel" => ALT_KIND_BONUS,
        "hiddenLabel" => HIDDEN_KIND_BONUS,
        _ => 0,
    };

    language_score + kind_score
}

/// Pick the single label to display for the target language.
///
/// Highest [`rank_label`] score wins; ties break on the smallest label
/// id so the same inputs always yield the same winner. Changing only
/// the target language never reorders two labels that share a source
/// language, because the kind component does not depend on the target.
pub fn best_label<'a>(labels: &'a [ReferenceLabel], target_lang: &str) -> Option<&'a ReferenceLabel> {
    labels.iter().min_by_key(|label| {
        (
            Reverse(rank_label(&label.valuetype_id, &label.language_id, target_lang)),
            label.id,
        )
    })
}
