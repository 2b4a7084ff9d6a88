//! Range extraction into a standalone single-sheet workbook.
//!
//! The source is read with `umya-spreadsheet` and the rectangle is copied
//! cell by cell into a fresh workbook, so styles travel as values rather
//! than as indices into the source's tables.

use crate::config::{ExtractConfig, FormulaMode};
use crate::error::{ExportError, Result};
use crate::range::CellRange;
use std::path::Path;
use tracing::debug;
use umya_spreadsheet::{Cell, Spreadsheet, Style, Worksheet};

/// Copies a rectangle of one sheet into a new workbook.
#[derive(Debug, Clone, Default)]
pub struct RangeExtractor {
    formula_mode: FormulaMode,
}

impl RangeExtractor {
    /// Create an extractor from its configuration.
    pub fn new(config: &ExtractConfig) -> Self {
        Self {
            formula_mode: config.formula_mode,
        }
    }

    /// Formula handling in use.
    pub fn formula_mode(&self) -> FormulaMode {
        self.formula_mode
    }

    /// Write the cells of `range_spec` on `sheet_name` to a new workbook at
    /// `destination`.
    ///
    /// The new workbook has one sheet with the same name, and the range's
    /// top-left cell becomes `A1`. Nothing is written when the sheet is
    /// missing, the range is malformed or the source cannot be read.
    pub fn extract(
        &self,
        source: &Path,
        sheet_name: &str,
        range_spec: &str,
        destination: &Path,
    ) -> Result<()> {
        let mut book = umya_spreadsheet::reader::xlsx::lazy_read(source)?;
        let sheet = book
            .get_sheet_by_name_mut(sheet_name)
            .ok_or_else(|| ExportError::SheetNotFound(sheet_name.to_string()))?;
        let range = CellRange::parse(range_spec)?;

        let extract = self.build_extract(sheet, &range)?;
        umya_spreadsheet::writer::xlsx::write(&extract, destination)?;
        Ok(())
    }

    fn build_extract(&self, sheet: &Worksheet, range: &CellRange) -> Result<Spreadsheet> {
        let mut book = umya_spreadsheet::new_file_empty_worksheet();
        let target = book
            .new_sheet(sheet.get_name())
            .map_err(|reason| ExportError::SheetName {
                name: sheet.get_name().to_string(),
                reason,
            })?;

        let mut copied = 0usize;
        for cell in sheet.get_cell_collection() {
            let col = *cell.get_coordinate().get_col_num();
            let row = *cell.get_coordinate().get_row_num();
            if !range.contains(col, row) {
                continue;
            }
            let relocated = (col - range.min_col + 1, row - range.min_row + 1);
            self.copy_cell(cell, target.get_cell_mut(relocated));
            copied += 1;
        }

        // A blank bottom-right corner still has to widen the dimension.
        target.get_cell_mut((range.width(), range.height()));

        debug!(
            "Copied {} cells of {}!{} into a {}x{} extract",
            copied,
            sheet.get_name(),
            range,
            range.width(),
            range.height()
        );
        Ok(book)
    }

    fn copy_cell(&self, from: &Cell, to: &mut Cell) {
        let mut value = from.get_cell_value().clone();
        match self.formula_mode {
            // Shared and array members are rewritten as standalone formulas.
            FormulaMode::Verbatim if from.is_formula() => {
                value.set_formula(from.get_formula().to_string());
            }
            _ => {
                value.remove_formula();
            }
        }
        to.set_cell_value(value);

        if has_explicit_style(from) {
            to.set_style(from.get_style().clone());
        }
    }
}

/// The reader leaves the default style on cells without an `s` attribute.
fn has_explicit_style(cell: &Cell) -> bool {
    cell.get_style() != &Style::default()
}
