//! Vocabulary export: one sheet, fixed column order, xlsx or csv.

use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};

use crate::db::VocabEntry;
use crate::error::Result;

/// Fixed export column order. The combined "Lektion/Bereich" label is a
/// display heading, not one of the lesson names the import locator accepts.
pub const EXPORT_COLUMNS: [&str; 5] =
    ["Deutsch", "Japanisch", "Kanji", "Romaji/Lautschrift", "Lektion/Bereich"];

const SHEET_NAME: &str = "Vokabeln";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<ExportFormat> {
        match value.to_lowercase().as_str() {
            "xlsx" => Some(ExportFormat::Xlsx),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn filename(&self) -> String {
        format!("vokabeln-export.{}", self.extension())
    }
}

/// Serialize entries (already ordered by the store) into the selected format.
pub fn export_vocab(entries: &[VocabEntry], format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => write_xlsx(entries),
        ExportFormat::Csv => write_csv(entries),
    }
}

fn entry_row(entry: &VocabEntry) -> [&str; 5] {
    [
        &entry.source_text,
        &entry.target_kana,
        &entry.target_kanji,
        &entry.target_romaji,
        &entry.lesson_or_domain,
    ]
}

fn write_xlsx(entries: &[VocabEntry]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in EXPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *name)?;
    }
    for (row, entry) in entries.iter().enumerate() {
        for (col, value) in entry_row(entry).iter().enumerate() {
            worksheet.write_string(row as u32 + 1, col as u16, *value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_csv(entries: &[VocabEntry]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_COLUMNS)?;
    for entry in entries {
        writer.write_record(entry_row(entry))?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{EntryDraft, Store};
    use crate::import::{locate_header, read_xlsx_grids, reconcile};
    use pretty_assertions::assert_eq;

    fn sample_entries() -> Vec<VocabEntry> {
        let store = Store::open_in_memory().unwrap();
        for (source, kana, kanji, romaji, lesson) in [
            ("Hund", "いぬ", "犬", "inu", "Tiere"),
            ("Reis", "ごはん", "ご飯", "gohan", "Essen"),
        ] {
            store
                .add_entry(&EntryDraft {
                    source_text: source.to_string(),
                    target_kana: kana.to_string(),
                    target_kanji: kanji.to_string(),
                    target_romaji: romaji.to_string(),
                    lesson_or_domain: lesson.to_string(),
                    ..EntryDraft::default()
                })
                .unwrap();
        }
        store.list_entries().unwrap()
    }

    #[test]
    fn format_selection_and_metadata() {
        assert_eq!(ExportFormat::parse("XLSX"), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::parse("ods"), None);
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv");
        assert_eq!(ExportFormat::Xlsx.filename(), "vokabeln-export.xlsx");
    }

    #[test]
    fn csv_export_has_fixed_header_and_rows() {
        let bytes = export_vocab(&sample_entries(), ExportFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Deutsch,Japanisch,Kanji,Romaji/Lautschrift,Lektion/Bereich"
        );
        assert_eq!(lines.next().unwrap(), "Hund,いぬ,犬,inu,Tiere");
        assert_eq!(lines.next().unwrap(), "Reis,ごはん,ご飯,gohan,Essen");
    }

    #[test]
    fn xlsx_export_writes_the_fixed_header_and_rows() {
        let entries = sample_entries();
        let bytes = export_vocab(&entries, ExportFormat::Xlsx).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.xlsx");
        std::fs::write(&path, bytes).unwrap();

        let grids = read_xlsx_grids(&path).unwrap();
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0][0], EXPORT_COLUMNS.map(str::to_string));
        assert_eq!(grids[0][1], ["Hund", "いぬ", "犬", "inu", "Tiere"].map(str::to_string));
        assert_eq!(grids[0][2], ["Reis", "ごはん", "ご飯", "gohan", "Essen"].map(str::to_string));

        // "Lektion/Bereich" is not an accepted lesson column name, so an
        // export is not re-importable as-is.
        assert_eq!(locate_header(&grids[0]), None);

        // Renaming the lesson heading to a plain "Lektion" makes the same
        // data rows import cleanly.
        let mut grid = grids.into_iter().next().unwrap();
        grid[0][4] = "Lektion".to_string();
        let header = locate_header(&grid).unwrap();
        let records = reconcile(&grid, &header).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_text, "Hund");
        assert_eq!(records[1].lesson_or_domain, "Essen");
    }
}
