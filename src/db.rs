//! SQLite persistence for vocabulary entries and practice sheets.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row, ToSql};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::sheet::ComposedSheet;

/// Which language is shown as the prompt vs. the expected answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "DE_JA")]
    DeJa,
    #[serde(rename = "JA_DE")]
    JaDe,
    #[serde(rename = "MIXED")]
    Mixed,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::DeJa => "DE_JA",
            Direction::JaDe => "JA_DE",
            Direction::Mixed => "MIXED",
        }
    }

    pub fn parse(value: &str) -> Option<Direction> {
        match value {
            "DE_JA" => Some(Direction::DeJa),
            "JA_DE" => Some(Direction::JaDe),
            "MIXED" => Some(Direction::Mixed),
            _ => None,
        }
    }
}

/// Which Japanese form is rendered into prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JapaneseDisplay {
    Kana,
    Kanji,
}

impl JapaneseDisplay {
    pub fn as_str(&self) -> &'static str {
        match self {
            JapaneseDisplay::Kana => "kana",
            JapaneseDisplay::Kanji => "kanji",
        }
    }

    pub fn parse(value: &str) -> Option<JapaneseDisplay> {
        match value {
            "kana" => Some(JapaneseDisplay::Kana),
            "kanji" => Some(JapaneseDisplay::Kanji),
            _ => None,
        }
    }
}

/// Language of a rendered prompt (the answer is expected in the other one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptLanguage {
    #[serde(rename = "DE")]
    De,
    #[serde(rename = "JA")]
    Ja,
}

impl PromptLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptLanguage::De => "DE",
            PromptLanguage::Ja => "JA",
        }
    }

    pub fn parse(value: &str) -> Option<PromptLanguage> {
        match value {
            "DE" => Some(PromptLanguage::De),
            "JA" => Some(PromptLanguage::Ja),
            _ => None,
        }
    }
}

macro_rules! sql_enum {
    ($name:ident) => {
        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value.as_str().and_then(|s| $name::parse(s).ok_or(FromSqlError::InvalidType))
            }
        }
    };
}

sql_enum!(Direction);
sql_enum!(JapaneseDisplay);
sql_enum!(PromptLanguage);

/// A single translation pair in the vocabulary set.
///
/// The pair (`source_text`, `target_kana`) is the natural key; it is unique
/// and drives import reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabEntry {
    pub id: i64,
    pub source_language: String,
    pub source_text: String,
    pub target_language: String,
    pub target_kana: String,
    pub target_kanji: String,
    pub target_romaji: String,
    pub lesson_or_domain: String,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

/// A validated row accepted by import reconciliation, ready for upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabRecord {
    pub source_text: String,
    pub target_kana: String,
    pub target_kanji: String,
    pub target_romaji: String,
    pub lesson_or_domain: String,
    pub order_index: i64,
}

/// Fields for manual create/update of a vocabulary entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryDraft {
    pub source_language: Option<String>,
    pub source_text: String,
    pub target_language: Option<String>,
    pub target_kana: String,
    pub target_kanji: String,
    pub target_romaji: String,
    pub lesson_or_domain: String,
    pub order_index: Option<i64>,
}

/// One generated worksheet with its ordered items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSheet {
    pub id: i64,
    pub direction: Direction,
    pub count: i64,
    pub lesson_filter: Option<String>,
    pub japanese_display: JapaneseDisplay,
    pub show_romaji: bool,
    pub created_at: DateTime<Utc>,
    pub items: Vec<PracticeItem>,
}

/// One row of a worksheet: a snapshot of the source entry at generation
/// time. Later edits to the entry never change a generated sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeItem {
    pub id: i64,
    pub sheet_id: i64,
    /// Back-reference to the source entry, cleared if the entry is deleted.
    pub vocab_id: Option<i64>,
    pub prompt_text: String,
    pub prompt_language: PromptLanguage,
    pub answer_kana: String,
    pub answer_kanji: String,
    pub answer_romaji: String,
    pub answer_text: String,
    /// 1-based position within the sheet, contiguous.
    #[serde(rename = "order")]
    pub position: i64,
}

/// Process-wide persistence handle. Open once at startup and share; all
/// multi-row writes run as single transactions on this connection.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Store> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Store> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Store> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Store { conn })
    }

    /// All entries ordered by `order_index`, then creation time.
    pub fn list_entries(&self) -> Result<Vec<VocabEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_language, source_text, target_language, target_kana,
                    target_kanji, target_romaji, lesson_or_domain, order_index, created_at
             FROM vocab_entries
             ORDER BY order_index ASC, created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([], entry_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_entry(&self, id: i64) -> Result<VocabEntry> {
        let result = self.conn.query_row(
            "SELECT id, source_language, source_text, target_language, target_kana,
                    target_kanji, target_romaji, lesson_or_domain, order_index, created_at
             FROM vocab_entries WHERE id = ?1",
            params![id],
            entry_from_row,
        );
        match result {
            Ok(entry) => Ok(entry),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(CoreError::NotFound("vocab entry")),
            Err(e) => Err(e.into()),
        }
    }

    /// Create an entry from a manual form. `order_index` defaults to
    /// `max(existing) + 1`; a natural-key collision is a [`CoreError::Conflict`].
    pub fn add_entry(&self, draft: &EntryDraft) -> Result<VocabEntry> {
        let draft = validated(draft)?;
        let order_index = match draft.order_index {
            Some(index) => index,
            None => self.next_order_index()?,
        };

        let result = self.conn.execute(
            "INSERT INTO vocab_entries
                 (source_language, source_text, target_language, target_kana,
                  target_kanji, target_romaji, lesson_or_domain, order_index, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                draft.source_language.as_deref().unwrap_or("German"),
                draft.source_text,
                draft.target_language.as_deref().unwrap_or("Japanese"),
                draft.target_kana,
                draft.target_kanji,
                draft.target_romaji,
                draft.lesson_or_domain,
                order_index,
                Utc::now(),
            ],
        );

        match result {
            Ok(_) => self.get_entry(self.conn.last_insert_rowid()),
            Err(e) if is_constraint_violation(&e) => Err(CoreError::Conflict {
                source_text: draft.source_text,
                target_kana: draft.target_kana,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Update an entry in place. Missing id is [`CoreError::NotFound`]; moving
    /// the natural key onto an existing pair is [`CoreError::Conflict`].
    pub fn update_entry(&self, id: i64, draft: &EntryDraft) -> Result<VocabEntry> {
        let draft = validated(draft)?;

        let result = self.conn.execute(
            "UPDATE vocab_entries SET
                 source_language = COALESCE(?1, source_language),
                 source_text = ?2,
                 target_language = COALESCE(?3, target_language),
                 target_kana = ?4,
                 target_kanji = ?5,
                 target_romaji = ?6,
                 lesson_or_domain = ?7,
                 order_index = COALESCE(?8, order_index)
             WHERE id = ?9",
            params![
                draft.source_language,
                draft.source_text,
                draft.target_language,
                draft.target_kana,
                draft.target_kanji,
                draft.target_romaji,
                draft.lesson_or_domain,
                draft.order_index,
                id,
            ],
        );

        match result {
            Ok(0) => Err(CoreError::NotFound("vocab entry")),
            Ok(_) => self.get_entry(id),
            Err(e) if is_constraint_violation(&e) => Err(CoreError::Conflict {
                source_text: draft.source_text,
                target_kana: draft.target_kana,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn delete_entry(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM vocab_entries WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(CoreError::NotFound("vocab entry"));
        }
        Ok(())
    }

    /// Apply a reconciled import batch atomically: one idempotent
    /// insert-or-update per record, keyed by (`source_text`, `target_kana`),
    /// all inside a single transaction. Upserts overwrite kanji, romaji,
    /// lesson and order but preserve id and creation time.
    pub fn upsert_batch(&mut self, records: &[VocabRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO vocab_entries
                     (source_text, target_kana, target_kanji, target_romaji,
                      lesson_or_domain, order_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(source_text, target_kana) DO UPDATE SET
                     target_kanji = excluded.target_kanji,
                     target_romaji = excluded.target_romaji,
                     lesson_or_domain = excluded.lesson_or_domain,
                     order_index = excluded.order_index",
            )?;
            for record in records {
                stmt.execute(params![
                    record.source_text,
                    record.target_kana,
                    record.target_kanji,
                    record.target_romaji,
                    record.lesson_or_domain,
                    record.order_index,
                    Utc::now(),
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("upserted {} vocabulary records", records.len());
        Ok(records.len())
    }

    /// Persist a composed sheet and its items as one transaction, so a
    /// failed item write never leaves an orphaned sheet header behind.
    pub fn create_sheet(&mut self, composed: &ComposedSheet) -> Result<PracticeSheet> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO practice_sheets
                 (direction, item_count, lesson_filter, japanese_display, show_romaji, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                composed.direction,
                composed.count,
                composed.lesson_filter,
                composed.japanese_display,
                composed.show_romaji,
                Utc::now(),
            ],
        )?;
        let sheet_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO practice_items
                     (sheet_id, vocab_id, prompt_text, prompt_language,
                      answer_kana, answer_kanji, answer_romaji, answer_text, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for item in &composed.items {
                stmt.execute(params![
                    sheet_id,
                    item.vocab_id,
                    item.prompt_text,
                    item.prompt_language,
                    item.answer_kana,
                    item.answer_kanji,
                    item.answer_romaji,
                    item.answer_text,
                    item.position,
                ])?;
            }
        }
        tx.commit()?;
        self.get_sheet(sheet_id)
    }

    pub fn get_sheet(&self, id: i64) -> Result<PracticeSheet> {
        let result = self.conn.query_row(
            "SELECT id, direction, item_count, lesson_filter, japanese_display,
                    show_romaji, created_at
             FROM practice_sheets WHERE id = ?1",
            params![id],
            sheet_from_row,
        );
        let mut sheet = match result {
            Ok(sheet) => sheet,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(CoreError::NotFound("practice sheet"));
            }
            Err(e) => return Err(e.into()),
        };
        sheet.items = self.sheet_items(id)?;
        Ok(sheet)
    }

    /// All sheets, newest first, items included.
    pub fn list_sheets(&self) -> Result<Vec<PracticeSheet>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, direction, item_count, lesson_filter, japanese_display,
                    show_romaji, created_at
             FROM practice_sheets
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], sheet_from_row)?;
        let mut sheets = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        for sheet in &mut sheets {
            sheet.items = self.sheet_items(sheet.id)?;
        }
        Ok(sheets)
    }

    /// Delete a sheet; its items cascade with it.
    pub fn delete_sheet(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM practice_sheets WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(CoreError::NotFound("practice sheet"));
        }
        Ok(())
    }

    fn sheet_items(&self, sheet_id: i64) -> Result<Vec<PracticeItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sheet_id, vocab_id, prompt_text, prompt_language,
                    answer_kana, answer_kanji, answer_romaji, answer_text, position
             FROM practice_items
             WHERE sheet_id = ?1
             ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![sheet_id], item_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn next_order_index(&self) -> Result<i64> {
        let max: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(order_index), 0) FROM vocab_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(max + 1)
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> &Connection {
        &self.conn
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS vocab_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_language TEXT NOT NULL DEFAULT 'German',
            source_text TEXT NOT NULL,
            target_language TEXT NOT NULL DEFAULT 'Japanese',
            target_kana TEXT NOT NULL,
            target_kanji TEXT NOT NULL,
            target_romaji TEXT NOT NULL,
            lesson_or_domain TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(source_text, target_kana)
        );

        CREATE TABLE IF NOT EXISTS practice_sheets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            direction TEXT NOT NULL,
            item_count INTEGER NOT NULL,
            lesson_filter TEXT,
            japanese_display TEXT NOT NULL,
            show_romaji INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS practice_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sheet_id INTEGER NOT NULL REFERENCES practice_sheets(id) ON DELETE CASCADE,
            vocab_id INTEGER REFERENCES vocab_entries(id) ON DELETE SET NULL,
            prompt_text TEXT NOT NULL,
            prompt_language TEXT NOT NULL,
            answer_kana TEXT NOT NULL,
            answer_kanji TEXT NOT NULL,
            answer_romaji TEXT NOT NULL,
            answer_text TEXT NOT NULL,
            position INTEGER NOT NULL,
            UNIQUE(sheet_id, position)
        );",
    )
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<VocabEntry> {
    Ok(VocabEntry {
        id: row.get(0)?,
        source_language: row.get(1)?,
        source_text: row.get(2)?,
        target_language: row.get(3)?,
        target_kana: row.get(4)?,
        target_kanji: row.get(5)?,
        target_romaji: row.get(6)?,
        lesson_or_domain: row.get(7)?,
        order_index: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn sheet_from_row(row: &Row<'_>) -> rusqlite::Result<PracticeSheet> {
    Ok(PracticeSheet {
        id: row.get(0)?,
        direction: row.get(1)?,
        count: row.get(2)?,
        lesson_filter: row.get(3)?,
        japanese_display: row.get(4)?,
        show_romaji: row.get(5)?,
        created_at: row.get(6)?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<PracticeItem> {
    Ok(PracticeItem {
        id: row.get(0)?,
        sheet_id: row.get(1)?,
        vocab_id: row.get(2)?,
        prompt_text: row.get(3)?,
        prompt_language: row.get(4)?,
        answer_kana: row.get(5)?,
        answer_kanji: row.get(6)?,
        answer_romaji: row.get(7)?,
        answer_text: row.get(8)?,
        position: row.get(9)?,
    })
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Trim all draft fields and reject empty required ones, naming the field.
fn validated(draft: &EntryDraft) -> Result<EntryDraft> {
    fn required(field: &'static str, value: &str) -> Result<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CoreError::validation(field, "must not be empty"));
        }
        Ok(trimmed.to_string())
    }

    fn optional(value: &Option<String>) -> Option<String> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
    }

    Ok(EntryDraft {
        source_language: optional(&draft.source_language),
        source_text: required("sourceText", &draft.source_text)?,
        target_language: optional(&draft.target_language),
        target_kana: required("targetKana", &draft.target_kana)?,
        target_kanji: required("targetKanji", &draft.target_kanji)?,
        target_romaji: required("targetRomaji", &draft.target_romaji)?,
        lesson_or_domain: required("lessonOrDomain", &draft.lesson_or_domain)?,
        order_index: draft.order_index,
    })
}
