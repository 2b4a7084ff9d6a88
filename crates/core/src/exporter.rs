//! The public export facade.

use crate::charts::{resolve_chart_ranges, ChartRanges};
use crate::config::ExporterConfig;
use crate::convert::ConversionInvoker;
use crate::error::{ExportError, Result};
use crate::extract::RangeExtractor;
use crate::range::{union_rectangles, CellRange};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use uuid::Uuid;

/// Where the workbook to export comes from.
pub enum WorkbookSource {
    /// A workbook file on disk.
    Path(PathBuf),
    /// Raw xlsx bytes.
    Bytes(Vec<u8>),
    /// A workbook built in memory.
    Workbook(rust_xlsxwriter::Workbook),
}

impl std::fmt::Debug for WorkbookSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkbookSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            WorkbookSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            WorkbookSource::Workbook(_) => f.write_str("Workbook(..)"),
        }
    }
}

impl From<PathBuf> for WorkbookSource {
    fn from(path: PathBuf) -> Self {
        WorkbookSource::Path(path)
    }
}

impl From<&Path> for WorkbookSource {
    fn from(path: &Path) -> Self {
        WorkbookSource::Path(path.to_path_buf())
    }
}

impl From<&str> for WorkbookSource {
    fn from(path: &str) -> Self {
        WorkbookSource::Path(PathBuf::from(path))
    }
}

impl From<String> for WorkbookSource {
    fn from(path: String) -> Self {
        WorkbookSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for WorkbookSource {
    fn from(bytes: Vec<u8>) -> Self {
        WorkbookSource::Bytes(bytes)
    }
}

impl From<rust_xlsxwriter::Workbook> for WorkbookSource {
    fn from(workbook: rust_xlsxwriter::Workbook) -> Self {
        WorkbookSource::Workbook(workbook)
    }
}

/// Exports ranges, sheets and chart regions of one workbook.
///
/// The exporter owns a work directory for extract workbooks and
/// intermediate PDFs. It is removed when the exporter is dropped.
pub struct Exporter {
    source: PathBuf,
    config: ExporterConfig,
    extractor: RangeExtractor,
    invoker: ConversionInvoker,
    work_dir: TempDir,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("source", &self.source)
            .field("work_dir", &self.work_dir.path())
            .field("config", &self.config)
            .finish()
    }
}

impl Exporter {
    /// Create an exporter with default settings.
    pub fn new(source: impl Into<WorkbookSource>) -> Result<Self> {
        Self::with_config(source, ExporterConfig::default())
    }

    /// Create an exporter.
    ///
    /// In-memory sources are written to the work directory here, so every
    /// later operation reads a file.
    pub fn with_config(
        source: impl Into<WorkbookSource>,
        config: ExporterConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("sheet-export-");
        let work_dir = match &config.temp_dir {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        };

        let source = match source.into() {
            WorkbookSource::Path(path) => path.canonicalize()?,
            WorkbookSource::Bytes(bytes) => {
                let path = work_dir.path().join("source.xlsx");
                std::fs::write(&path, bytes)?;
                path
            }
            WorkbookSource::Workbook(mut workbook) => {
                let path = work_dir.path().join("source.xlsx");
                workbook.save(&path)?;
                path
            }
        };
        debug!("Exporter source {:?}, work dir {:?}", source, work_dir.path());

        Ok(Self {
            extractor: RangeExtractor::new(&config.extract),
            invoker: ConversionInvoker::new(
                config.tools.clone(),
                config.render.clone(),
                work_dir.path(),
            ),
            source,
            config,
            work_dir,
        })
    }

    /// Absolute path of the workbook being exported.
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// Directory holding this exporter's intermediate files.
    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// Active configuration.
    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Sheet names in tab order.
    pub fn sheet_names(&self) -> Result<Vec<String>> {
        let book = umya_spreadsheet::reader::xlsx::lazy_read(&self.source)?;
        Ok(book
            .get_sheet_collection_no_check()
            .iter()
            .map(|sheet| sheet.get_name().to_string())
            .collect())
    }

    /// Source rectangles of every chart on `sheet`, keyed by chart title.
    pub fn chart_ranges(&self, sheet: &str) -> Result<ChartRanges> {
        resolve_chart_ranges(&self.source, sheet)
    }

    /// The smallest rectangle covering every range `chart` reads.
    pub fn chart_range(&self, sheet: &str, chart: &str) -> Result<CellRange> {
        let charts = self.chart_ranges(sheet)?;
        let ranges = charts.get(chart).ok_or_else(|| ExportError::ChartNotFound {
            sheet: sheet.to_string(),
            chart: chart.to_string(),
        })?;
        union_rectangles(ranges)
    }

    /// Copy `range` of `sheet` into a new single-sheet workbook and return
    /// its path. The file lives as long as the exporter.
    pub fn extract_range(&self, sheet: &str, range: &str) -> Result<PathBuf> {
        let path = self
            .work_dir
            .path()
            .join(format!("range-{}.xlsx", Uuid::new_v4()));
        self.extractor.extract(&self.source, sheet, range, &path)?;
        Ok(path)
    }

    /// Export `range` of `sheet` to a PDF at `output`.
    pub fn export_range_to_pdf(
        &self,
        sheet: &str,
        range: &str,
        output: impl AsRef<Path>,
    ) -> Result<()> {
        let extract = self.extract_range(sheet, range)?;
        self.invoker.to_pdf(&extract, output.as_ref())
    }

    /// Export `range` of `sheet` to a PNG of its first page at `output`.
    pub fn export_range_to_png(
        &self,
        sheet: &str,
        range: &str,
        output: impl AsRef<Path>,
    ) -> Result<()> {
        let extract = self.extract_range(sheet, range)?;
        self.invoker.to_png(&extract, output.as_ref())
    }

    /// Export the whole workbook to a PDF at `output`.
    pub fn export_sheet_to_pdf(&self, output: impl AsRef<Path>) -> Result<()> {
        self.invoker.to_pdf(&self.source, output.as_ref())
    }

    /// Export the workbook's first page to a PNG at `output`.
    pub fn export_sheet_to_png(&self, output: impl AsRef<Path>) -> Result<()> {
        self.invoker.to_png(&self.source, output.as_ref())
    }

    /// Export the cells feeding `chart` on `sheet` to a PDF at `output`.
    pub fn export_chart_to_pdf(
        &self,
        sheet: &str,
        chart: &str,
        output: impl AsRef<Path>,
    ) -> Result<()> {
        let range = self.chart_range(sheet, chart)?;
        info!("Chart '{}' on '{}' covers {}", chart, sheet, range);
        self.export_range_to_pdf(sheet, &range.to_string(), output)
    }

    /// Export the cells feeding `chart` on `sheet` to a PNG at `output`.
    pub fn export_chart_to_png(
        &self,
        sheet: &str,
        chart: &str,
        output: impl AsRef<Path>,
    ) -> Result<()> {
        let range = self.chart_range(sheet, chart)?;
        info!("Chart '{}' on '{}' covers {}", chart, sheet, range);
        self.export_range_to_png(sheet, &range.to_string(), output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormulaMode;
    use rust_xlsxwriter::Workbook;

    fn two_sheet_workbook() -> Workbook {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet()
            .set_name("Summary")
            .unwrap()
            .write_string(0, 0, "Total")
            .unwrap();
        workbook
            .add_worksheet()
            .set_name("Data")
            .unwrap()
            .write_number(2, 1, 7.0)
            .unwrap();
        workbook
    }

    #[test]
    fn test_workbook_source_conversions() {
        assert!(matches!(
            WorkbookSource::from("book.xlsx"),
            WorkbookSource::Path(p) if p == Path::new("book.xlsx")
        ));
        assert!(matches!(
            WorkbookSource::from(vec![1u8, 2, 3]),
            WorkbookSource::Bytes(b) if b.len() == 3
        ));
        assert_eq!(
            format!("{:?}", WorkbookSource::from(vec![0u8; 4])),
            "Bytes(4 bytes)"
        );
    }

    #[test]
    fn test_in_memory_workbook_is_persisted() {
        let exporter = Exporter::new(two_sheet_workbook()).unwrap();
        assert!(exporter.source_path().starts_with(exporter.work_dir()));
        assert!(exporter.source_path().exists());
        assert_eq!(
            exporter.sheet_names().unwrap(),
            vec!["Summary".to_string(), "Data".to_string()]
        );
    }

    #[test]
    fn test_bytes_source_is_persisted() {
        let bytes = two_sheet_workbook().save_to_buffer().unwrap();
        let exporter = Exporter::new(bytes).unwrap();
        assert_eq!(exporter.sheet_names().unwrap().len(), 2);
    }

    #[test]
    fn test_path_source_is_made_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        two_sheet_workbook().save(&path).unwrap();

        let exporter = Exporter::new(path.as_path()).unwrap();
        assert!(exporter.source_path().is_absolute());
    }

    #[test]
    fn test_missing_path_source_fails() {
        let result = Exporter::new("/nonexistent/book.xlsx");
        assert!(matches!(result, Err(ExportError::Io(_))));
    }

    #[test]
    fn test_work_dir_is_removed_on_drop() {
        let exporter = Exporter::new(two_sheet_workbook()).unwrap();
        let work_dir = exporter.work_dir().to_path_buf();
        let extract = exporter.extract_range("Data", "B3").unwrap();
        assert!(extract.exists());

        drop(exporter);
        assert!(!work_dir.exists());
    }

    #[test]
    fn test_work_dir_honours_temp_dir() {
        let root = tempfile::tempdir().unwrap();
        let config = ExporterConfig::default()
            .temp_dir(root.path())
            .formula_mode(FormulaMode::Values);
        let exporter = Exporter::with_config(two_sheet_workbook(), config).unwrap();
        assert!(exporter.work_dir().starts_with(root.path()));
        assert_eq!(exporter.config().extract.formula_mode, FormulaMode::Values);
    }

    #[test]
    fn test_chart_range_without_charts() {
        let exporter = Exporter::new(two_sheet_workbook()).unwrap();
        assert!(exporter.chart_ranges("Data").unwrap().is_empty());
        assert!(matches!(
            exporter.chart_range("Data", "Revenue"),
            Err(ExportError::ChartNotFound { chart, .. }) if chart == "Revenue"
        ));
    }

    #[test]
    fn test_extract_range_missing_sheet() {
        let exporter = Exporter::new(two_sheet_workbook()).unwrap();
        let err = exporter.extract_range("Nope", "A1:B2").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }
}
