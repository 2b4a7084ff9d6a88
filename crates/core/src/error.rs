//! Error types for sheet-export.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the sheet-export library.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The requested sheet does not exist in the workbook.
    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    /// The requested chart does not exist on the sheet.
    #[error("Chart '{chart}' not found in sheet '{sheet}'")]
    ChartNotFound { sheet: String, chart: String },

    /// A cell range string could not be parsed.
    #[error("Invalid cell range '{0}'")]
    InvalidRange(String),

    /// A union was requested over zero rectangles.
    #[error("No ranges provided")]
    EmptyInput,

    /// An external tool could not be located.
    #[error("{tool} not found. Please install it and ensure it is in PATH or configured explicitly")]
    ToolNotFound { tool: &'static str },

    /// An external tool exited with a failure status.
    #[error("{tool} failed for '{path}': {message}")]
    ToolFailed {
        tool: &'static str,
        path: PathBuf,
        message: String,
    },

    /// An external tool reported success but its output file is missing.
    #[error("{tool} did not produce the expected file '{expected}'")]
    MissingOutput {
        tool: &'static str,
        expected: PathBuf,
    },

    /// The source workbook could not be read, or an extract could not be written.
    #[error("Failed to read or write workbook: {0}")]
    Spreadsheet(#[from] umya_spreadsheet::XlsxError),

    /// A sheet name was rejected when building an extract workbook.
    #[error("Cannot create sheet '{name}': {reason}")]
    SheetName { name: String, reason: &'static str },

    /// I/O failure while reading, writing or spawning.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An in-memory workbook could not be saved.
    #[error("Failed to save workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pdfium library error.
    #[error("Pdfium error: {0}")]
    PdfiumError(String),

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncodingError(String),
}

/// Coarse classification of an [`ExportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A sheet or chart name is absent.
    NotFound,
    /// A range string is malformed.
    InvalidRange,
    /// A chart has no resolvable series ranges.
    EmptyInput,
    /// A delegated process failed or did not produce its output.
    ExternalTool,
    /// Everything else (I/O, workbook, configuration, rendering).
    Other,
}

impl ExportError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::SheetNotFound(_) | ExportError::ChartNotFound { .. } => {
                ErrorKind::NotFound
            }
            ExportError::InvalidRange(_) => ErrorKind::InvalidRange,
            ExportError::EmptyInput => ErrorKind::EmptyInput,
            ExportError::ToolNotFound { .. }
            | ExportError::ToolFailed { .. }
            | ExportError::MissingOutput { .. } => ErrorKind::ExternalTool,
            _ => ErrorKind::Other,
        }
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_sheet_not_found() {
        let err = ExportError::SheetNotFound("Data".to_string());
        assert_eq!(err.to_string(), "Sheet 'Data' not found");
    }

    #[test]
    fn test_error_display_chart_not_found() {
        let err = ExportError::ChartNotFound {
            sheet: "Data".to_string(),
            chart: "Revenue".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Revenue"));
        assert!(msg.contains("Data"));
    }

    #[test]
    fn test_error_display_tool_failed() {
        let err = ExportError::ToolFailed {
            tool: "soffice",
            path: PathBuf::from("/tmp/range.xlsx"),
            message: "source file could not be loaded".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("soffice"));
        assert!(msg.contains("/tmp/range.xlsx"));
        assert!(msg.contains("could not be loaded"));
    }

    #[test]
    fn test_error_display_missing_output() {
        let err = ExportError::MissingOutput {
            tool: "pdftoppm",
            expected: PathBuf::from("/out/chart.png"),
        };
        assert!(err.to_string().contains("/out/chart.png"));
    }

    #[test]
    fn test_error_kind_taxonomy() {
        assert_eq!(
            ExportError::SheetNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ExportError::ChartNotFound {
                sheet: "s".into(),
                chart: "c".into()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ExportError::InvalidRange("A0".into()).kind(),
            ErrorKind::InvalidRange
        );
        assert_eq!(ExportError::EmptyInput.kind(), ErrorKind::EmptyInput);
        assert_eq!(
            ExportError::ToolNotFound { tool: "soffice" }.kind(),
            ErrorKind::ExternalTool
        );
        assert_eq!(
            ExportError::InvalidConfig("dpi".into()).kind(),
            ErrorKind::Other
        );
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ExportError = io_err.into();
        match err {
            ExportError::Io(_) => (),
            _ => panic!("Expected Io"),
        }
    }

    #[test]
    fn test_error_from_workbook_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::InvalidData, "not a zip");
        let err: ExportError = umya_spreadsheet::XlsxError::Io(io_err).into();
        assert!(matches!(err, ExportError::Spreadsheet(_)));
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(err.to_string().contains("not a zip"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_error() -> Result<i32> {
            Err(ExportError::EmptyInput)
        }
        assert!(returns_error().is_err());
    }
}
