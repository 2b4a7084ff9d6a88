//! # sheet-export-core
//!
//! Export spreadsheet ranges, whole sheets and chart-backed regions to PDF
//! or PNG.
//!
//! Rendering is delegated:
//!
//! - **LibreOffice** (headless `soffice`) turns a workbook into a PDF
//! - **pdftoppm** or **pdfium** turns the PDF's first page into a PNG
//!
//! The library's own work is reading the workbook with `umya-spreadsheet`:
//! copying a cell rectangle into a standalone extract workbook, and finding
//! the cells a chart's series read from.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sheet_export_core::Exporter;
//!
//! fn main() -> anyhow::Result<()> {
//!     let exporter = Exporter::new("report.xlsx")?;
//!
//!     // A fixed range
//!     exporter.export_range_to_pdf("Data", "B2:D10", "out/table.pdf")?;
//!
//!     // The cells behind a chart, as an image
//!     exporter.export_chart_to_png("Data", "Quarterly Sales", "out/sales.png")?;
//!
//!     // Everything
//!     exporter.export_sheet_to_pdf("out/report.pdf")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use sheet_export_core::{Exporter, ExporterConfig, FormulaMode, RenderConfig, ToolConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ExporterConfig::default()
//!         .tools(ToolConfig::default().soffice_path("/opt/libreoffice/program/soffice"))
//!         .render(RenderConfig::with_dpi(300))
//!         .formula_mode(FormulaMode::Values);
//!
//!     let exporter = Exporter::with_config("report.xlsx", config)?;
//!     for sheet in exporter.sheet_names()? {
//!         println!("{sheet}: {:?}", exporter.chart_ranges(&sheet)?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod charts;
pub mod config;
pub mod convert;
pub mod error;
pub mod exporter;
pub mod extract;
pub mod range;

// Re-export main types for convenience
pub use charts::{resolve_chart_ranges, ChartRanges, UNNAMED_CHART};
pub use config::{
    ExporterConfig, ExtractConfig, FormulaMode, RasterizerKind, RenderConfig, ToolConfig,
};
pub use convert::{
    ConversionInvoker, OfficeConverter, PdfiumRasterizer, PdftoppmRasterizer, Rasterizer,
};
pub use error::{ErrorKind, ExportError, Result};
pub use exporter::{Exporter, WorkbookSource};
pub use extract::RangeExtractor;
pub use range::{union_rectangles, CellRange};

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs; the
/// filter comes from `RUST_LOG`.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init();
}
