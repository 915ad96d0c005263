//! Practice-sheet composition: parameter validation, entry selection,
//! prompt rendering, atomic persistence.

use serde::{Deserialize, Serialize};

use crate::db::{
    Direction, JapaneseDisplay, PracticeSheet, PromptLanguage, Store, VocabEntry,
};
use crate::error::{CoreError, Result};

/// Raw generation request as it arrives from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRequest {
    pub direction: String,
    /// Coerced to an integer; must end up greater than zero.
    pub count: f64,
    #[serde(default)]
    pub lesson_filter: Option<String>,
    #[serde(default)]
    pub japanese_display: Option<String>,
    #[serde(default)]
    pub show_romaji: bool,
}

/// Validated generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetParams {
    pub direction: Direction,
    pub count: i64,
    pub lesson_filter: Option<String>,
    pub japanese_display: JapaneseDisplay,
    pub show_romaji: bool,
}

impl SheetParams {
    /// Validate a raw request; errors name the offending field.
    pub fn from_request(request: &SheetRequest) -> Result<SheetParams> {
        let direction = Direction::parse(&request.direction)
            .ok_or_else(|| CoreError::validation("direction", "must be DE_JA, JA_DE or MIXED"))?;

        let japanese_display = match request.japanese_display.as_deref() {
            None | Some("") => JapaneseDisplay::Kana,
            Some(value) => JapaneseDisplay::parse(value)
                .ok_or_else(|| CoreError::validation("japaneseDisplay", "must be kana or kanji"))?,
        };

        if !request.count.is_finite() || request.count.floor() <= 0.0 {
            return Err(CoreError::validation("count", "must be greater than 0"));
        }
        let count = request.count.floor() as i64;

        let lesson_filter = request
            .lesson_filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);

        Ok(SheetParams { direction, count, lesson_filter, japanese_display, show_romaji: request.show_romaji })
    }
}

/// A composed sheet before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedSheet {
    pub direction: Direction,
    /// Actual item count, capped at the filtered entry set size.
    pub count: i64,
    pub lesson_filter: Option<String>,
    pub japanese_display: JapaneseDisplay,
    pub show_romaji: bool,
    pub items: Vec<ComposedItem>,
}

/// One item draft: a verbatim snapshot of its source entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedItem {
    pub vocab_id: Option<i64>,
    pub prompt_text: String,
    pub prompt_language: PromptLanguage,
    pub answer_kana: String,
    pub answer_kanji: String,
    pub answer_romaji: String,
    pub answer_text: String,
    pub position: i64,
}

/// Compose a sheet from the current vocabulary set.
///
/// Entries arrive pre-sorted by `order_index` then creation time; selection
/// is the deterministic prefix of the filtered set, never a random sample.
/// An over-large `count` is silently capped; an empty filtered set is a
/// validation error.
pub fn compose(params: &SheetParams, entries: &[VocabEntry]) -> Result<ComposedSheet> {
    let filtered: Vec<&VocabEntry> = match &params.lesson_filter {
        Some(filter) => {
            let query = filter.trim().to_lowercase();
            entries
                .iter()
                .filter(|entry| entry.lesson_or_domain.trim().to_lowercase() == query)
                .collect()
        }
        None => entries.iter().collect(),
    };

    if filtered.is_empty() {
        return Err(CoreError::validation("lessonFilter", "no entries match this filter"));
    }

    let actual = (params.count as usize).min(filtered.len());
    let items = filtered[..actual]
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let prompt_language = match params.direction {
                Direction::DeJa => PromptLanguage::De,
                Direction::JaDe => PromptLanguage::Ja,
                // Alternating, German first.
                Direction::Mixed => {
                    if index % 2 == 0 {
                        PromptLanguage::De
                    } else {
                        PromptLanguage::Ja
                    }
                }
            };

            let prompt_text = match prompt_language {
                PromptLanguage::De => entry.source_text.clone(),
                PromptLanguage::Ja => with_romaji(
                    format_japanese(entry, params.japanese_display),
                    &entry.target_romaji,
                    params.show_romaji,
                ),
            };

            ComposedItem {
                vocab_id: Some(entry.id),
                prompt_text,
                prompt_language,
                answer_kana: entry.target_kana.clone(),
                answer_kanji: entry.target_kanji.clone(),
                answer_romaji: entry.target_romaji.clone(),
                answer_text: entry.source_text.clone(),
                position: index as i64 + 1,
            }
        })
        .collect();

    Ok(ComposedSheet {
        direction: params.direction,
        count: actual as i64,
        lesson_filter: params.lesson_filter.clone(),
        japanese_display: params.japanese_display,
        show_romaji: params.show_romaji,
        items,
    })
}

/// Validate, compose and persist a sheet in one call.
pub fn generate_sheet(store: &mut Store, request: &SheetRequest) -> Result<PracticeSheet> {
    let params = SheetParams::from_request(request)?;
    let entries = store.list_entries()?;
    let composed = compose(&params, &entries)?;
    store.create_sheet(&composed)
}

/// Japanese prompt form: kanji display prefers kanji but falls back to kana
/// when the kanji field is empty.
fn format_japanese(entry: &VocabEntry, display: JapaneseDisplay) -> String {
    match display {
        JapaneseDisplay::Kanji if !entry.target_kanji.is_empty() => entry.target_kanji.clone(),
        _ => entry.target_kana.clone(),
    }
}

fn with_romaji(value: String, romaji: &str, show_romaji: bool) -> String {
    if !show_romaji || romaji.is_empty() {
        return value;
    }
    format!("{value} ({romaji})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn entry(id: i64, source: &str, kana: &str, kanji: &str, romaji: &str, lesson: &str) -> VocabEntry {
        VocabEntry {
            id,
            source_language: "German".into(),
            source_text: source.into(),
            target_language: "Japanese".into(),
            target_kana: kana.into(),
            target_kanji: kanji.into(),
            target_romaji: romaji.into(),
            lesson_or_domain: lesson.into(),
            order_index: id,
            created_at: Utc::now(),
        }
    }

    fn entries() -> Vec<VocabEntry> {
        vec![
            entry(1, "Reis", "ごはん", "ご飯", "gohan", "Essen"),
            entry(2, "Fisch", "さかな", "魚", "sakana", "Essen"),
            entry(3, "Wasser", "みず", "水", "mizu", "Essen"),
            entry(4, "Zug", "でんしゃ", "電車", "densha", "Reisen"),
            entry(5, "Koffer", "かばん", "鞄", "kaban", "Reisen"),
        ]
    }

    fn params(direction: Direction, count: i64) -> SheetParams {
        SheetParams {
            direction,
            count,
            lesson_filter: None,
            japanese_display: JapaneseDisplay::Kana,
            show_romaji: false,
        }
    }

    #[test]
    fn mixed_direction_alternates_starting_with_german() {
        let composed = compose(&params(Direction::Mixed, 4), &entries()).unwrap();
        let sequence: Vec<PromptLanguage> =
            composed.items.iter().map(|item| item.prompt_language).collect();
        assert_eq!(
            sequence,
            vec![PromptLanguage::De, PromptLanguage::Ja, PromptLanguage::De, PromptLanguage::Ja]
        );
    }

    #[test]
    fn ja_de_prompts_are_all_japanese() {
        let composed = compose(&params(Direction::JaDe, 5), &entries()).unwrap();
        assert!(composed.items.iter().all(|item| item.prompt_language == PromptLanguage::Ja));
        assert_eq!(composed.items[0].prompt_text, "ごはん");
    }

    #[test]
    fn lesson_filter_is_case_insensitive_whole_label_match() {
        let mut p = params(Direction::DeJa, 10);
        p.lesson_filter = Some("essen".into());
        let composed = compose(&p, &entries()).unwrap();
        assert_eq!(composed.count, 3);
        assert!(composed.items.iter().all(|item| item.prompt_language == PromptLanguage::De));
    }

    #[test]
    fn lesson_filter_does_not_match_substrings() {
        let mut p = params(Direction::DeJa, 10);
        p.lesson_filter = Some("Esse".into());
        match compose(&p, &entries()) {
            Err(CoreError::Validation { field, .. }) => assert_eq!(field, "lessonFilter"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn over_large_count_is_capped_not_rejected() {
        let mut p = params(Direction::DeJa, 50);
        p.lesson_filter = Some("Reisen".into());
        let composed = compose(&p, &entries()).unwrap();
        assert_eq!(composed.count, 2);
        assert_eq!(composed.items.len(), 2);
    }

    #[test]
    fn selection_is_the_prefix_of_the_ordered_set() {
        let composed = compose(&params(Direction::DeJa, 2), &entries()).unwrap();
        assert_eq!(composed.items[0].answer_text, "Reis");
        assert_eq!(composed.items[1].answer_text, "Fisch");
        assert_eq!(composed.items[0].position, 1);
        assert_eq!(composed.items[1].position, 2);
    }

    #[test]
    fn kanji_display_falls_back_to_kana_when_kanji_is_empty() {
        let mut list = entries();
        list[0].target_kanji = String::new();
        let mut p = params(Direction::JaDe, 2);
        p.japanese_display = JapaneseDisplay::Kanji;
        let composed = compose(&p, &list).unwrap();
        assert_eq!(composed.items[0].prompt_text, "ごはん");
        assert_eq!(composed.items[1].prompt_text, "魚");
    }

    #[test]
    fn romaji_suffix_only_when_enabled_and_present() {
        let mut list = entries();
        list[1].target_romaji = String::new();
        let mut p = params(Direction::JaDe, 2);
        p.show_romaji = true;
        let composed = compose(&p, &list).unwrap();
        assert_eq!(composed.items[0].prompt_text, "ごはん (gohan)");
        assert_eq!(composed.items[1].prompt_text, "さかな");
    }

    #[test]
    fn request_validation_names_the_field() {
        let mut request = SheetRequest {
            direction: "DE_JA".into(),
            count: 4.0,
            lesson_filter: None,
            japanese_display: None,
            show_romaji: false,
        };

        request.direction = "DE_EN".into();
        match SheetParams::from_request(&request) {
            Err(CoreError::Validation { field, .. }) => assert_eq!(field, "direction"),
            other => panic!("expected validation error, got {other:?}"),
        }

        request.direction = "DE_JA".into();
        request.count = 0.7;
        match SheetParams::from_request(&request) {
            Err(CoreError::Validation { field, .. }) => assert_eq!(field, "count"),
            other => panic!("expected validation error, got {other:?}"),
        }

        request.count = 4.9;
        request.japanese_display = Some("hiragana".into());
        match SheetParams::from_request(&request) {
            Err(CoreError::Validation { field, .. }) => assert_eq!(field, "japaneseDisplay"),
            other => panic!("expected validation error, got {other:?}"),
        }

        request.japanese_display = Some("kanji".into());
        let params = SheetParams::from_request(&request).unwrap();
        assert_eq!(params.count, 4);
        assert_eq!(params.japanese_display, JapaneseDisplay::Kanji);
    }

    #[test]
    fn generated_sheet_is_a_snapshot_of_its_entries() {
        use crate::db::EntryDraft;

        let mut store = Store::open_in_memory().unwrap();
        let created = store
            .add_entry(&EntryDraft {
                source_text: "Hund".into(),
                target_kana: "いぬ".into(),
                target_kanji: "犬".into(),
                target_romaji: "inu".into(),
                lesson_or_domain: "Tiere".into(),
                ..EntryDraft::default()
            })
            .unwrap();

        let request = SheetRequest {
            direction: "DE_JA".into(),
            count: 1.0,
            lesson_filter: None,
            japanese_display: None,
            show_romaji: false,
        };
        let sheet = generate_sheet(&mut store, &request).unwrap();
        assert_eq!(sheet.count, 1);
        assert_eq!(sheet.items[0].answer_kana, "いぬ");

        // Editing the entry afterwards must not change the persisted sheet.
        let mut edited = EntryDraft {
            source_text: "Hund".into(),
            target_kana: "わんちゃん".into(),
            target_kanji: "犬".into(),
            target_romaji: "wan-chan".into(),
            lesson_or_domain: "Tiere".into(),
            ..EntryDraft::default()
        };
        edited.order_index = Some(created.order_index);
        store.update_entry(created.id, &edited).unwrap();

        let reloaded = store.get_sheet(sheet.id).unwrap();
        assert_eq!(reloaded.items[0].answer_kana, "いぬ");
    }

    #[test]
    fn empty_vocabulary_set_cannot_generate_a_sheet() {
        let mut store = Store::open_in_memory().unwrap();
        let request = SheetRequest {
            direction: "MIXED".into(),
            count: 5.0,
            lesson_filter: Some("Nichtvorhanden".into()),
            japanese_display: None,
            show_romaji: false,
        };
        assert!(generate_sheet(&mut store, &request).is_err());
        assert_eq!(store.list_sheets().unwrap().len(), 0);
    }
}
