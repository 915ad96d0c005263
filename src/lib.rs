//! Vokabel Core - engine for a German-Japanese vocabulary trainer.
//!
//! Provides SQLite vocabulary storage, spreadsheet import reconciliation,
//! xlsx/csv export, practice sheet generation, answer grading, and an
//! LLM-assisted autofill helper. Rendering, HTTP surfaces and PDF output
//! live outside this crate.

mod autofill;
mod db;
mod error;
mod export;
mod grade;
mod import;
mod normalize;
mod sheet;

pub use autofill::{AutofillClient, AutofillCoordinator, AutofillField, AutofillFields};
pub use db::{
    Direction, EntryDraft, JapaneseDisplay, PracticeItem, PracticeSheet, PromptLanguage, Store,
    VocabEntry, VocabRecord,
};
pub use error::{CoreError, ImportError, Result};
pub use export::{export_vocab, ExportFormat, EXPORT_COLUMNS};
pub use grade::{grade_item, grade_sheet};
pub use import::{
    import_file, locate_header, read_csv_grid, read_xlsx_grids, reconcile, reconcile_workbook,
    Grid, HeaderMap,
};
pub use normalize::{normalize_german, normalize_japanese, normalize_whitespace};
pub use sheet::{compose, generate_sheet, ComposedItem, ComposedSheet, SheetParams, SheetRequest};
