//! On-screen answer checking. Pure functions over persisted items; no
//! storage access.

use std::collections::HashMap;

use crate::db::{PracticeItem, PromptLanguage};
use crate::normalize::{normalize_german, normalize_japanese};

/// Grade one answer against its item.
///
/// A German prompt expects a Japanese answer: kana or kanji are both
/// accepted. A Japanese prompt expects the German source text. Both sides of
/// every comparison go through the same normalization rule; empty or
/// whitespace-only input is always incorrect.
pub fn grade_item(item: &PracticeItem, user_input: &str) -> bool {
    match item.prompt_language {
        PromptLanguage::De => {
            let input = normalize_japanese(user_input);
            !input.is_empty()
                && (input == normalize_japanese(&item.answer_kana)
                    || input == normalize_japanese(&item.answer_kanji))
        }
        PromptLanguage::Ja => {
            let input = normalize_german(user_input);
            !input.is_empty() && input == normalize_german(&item.answer_text)
        }
    }
}

/// Grade a whole sheet at once. Answers are keyed by item id; a missing
/// answer grades as incorrect.
pub fn grade_sheet(items: &[PracticeItem], answers: &HashMap<i64, String>) -> HashMap<i64, bool> {
    items
        .iter()
        .map(|item| {
            let input = answers.get(&item.id).map(String::as_str).unwrap_or("");
            (item.id, grade_item(item, input))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(prompt_language: PromptLanguage) -> PracticeItem {
        PracticeItem {
            id: 1,
            sheet_id: 1,
            vocab_id: Some(1),
            prompt_text: "Katze".into(),
            prompt_language,
            answer_kana: "ねこ".into(),
            answer_kanji: "猫".into(),
            answer_romaji: "neko".into(),
            answer_text: "Katze".into(),
            position: 1,
        }
    }

    #[test]
    fn japanese_answer_accepts_kana_or_kanji() {
        let item = item(PromptLanguage::De);
        assert!(grade_item(&item, "ねこ"));
        assert!(grade_item(&item, "猫"));
        assert!(grade_item(&item, " ねこ "));
        assert!(!grade_item(&item, "neko"));
    }

    #[test]
    fn kana_matches_even_when_kanji_differs() {
        let mut item = item(PromptLanguage::De);
        item.answer_kanji = "別".into();
        assert!(grade_item(&item, "ねこ"));
    }

    #[test]
    fn german_answer_is_case_and_whitespace_insensitive() {
        let mut item = item(PromptLanguage::Ja);
        item.answer_text = "hund".into();
        assert!(grade_item(&item, " Hund "));
        assert!(grade_item(&item, "HUND"));
        assert!(!grade_item(&item, "Katze"));
    }

    #[test]
    fn internal_whitespace_runs_collapse_on_both_sides() {
        let mut item = item(PromptLanguage::Ja);
        item.answer_text = "der  Hund".into();
        assert!(grade_item(&item, "der Hund"));
    }

    #[test]
    fn empty_or_whitespace_input_is_incorrect_not_ungraded() {
        assert!(!grade_item(&item(PromptLanguage::De), ""));
        assert!(!grade_item(&item(PromptLanguage::De), "   "));
        assert!(!grade_item(&item(PromptLanguage::Ja), "\t"));
    }

    #[test]
    fn sheet_grading_marks_missing_answers_incorrect() {
        let mut second = item(PromptLanguage::Ja);
        second.id = 2;
        let items = vec![item(PromptLanguage::De), second];

        let mut answers = HashMap::new();
        answers.insert(1, "ねこ".to_string());

        let graded = grade_sheet(&items, &answers);
        assert!(graded[&1]);
        assert!(!graded[&2]);
    }
}
