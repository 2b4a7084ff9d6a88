//! Configuration types for sheet exports.

use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which rasterizer turns the intermediate PDF into a PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterizerKind {
    /// Poppler's `pdftoppm` command.
    #[default]
    Pdftoppm,
    /// In-process rendering with pdfium.
    Pdfium,
}

/// Locations of the external tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Path to the soffice binary. If None, well-known locations and PATH are searched.
    pub soffice_path: Option<PathBuf>,

    /// Path to the pdftoppm binary. If None, PATH is searched.
    pub pdftoppm_path: Option<PathBuf>,

    /// Rasterizer used for PNG exports.
    pub rasterizer: RasterizerKind,
}

impl ToolConfig {
    /// Set the soffice binary path.
    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.soffice_path = Some(path.into());
        self
    }

    /// Set the pdftoppm binary path.
    pub fn pdftoppm_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pdftoppm_path = Some(path.into());
        self
    }

    /// Select the rasterizer.
    pub fn rasterizer(mut self, kind: RasterizerKind) -> Self {
        self.rasterizer = kind;
        self
    }
}

/// Configuration for PDF to PNG rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output DPI (dots per inch).
    /// Default: 150, which is pdftoppm's own default.
    pub dpi: u32,

    /// Whether to keep the alpha channel (pdfium only).
    /// Default: false.
    pub use_alpha: bool,

    /// Background color composited under transparent areas (pdfium only).
    /// Default: white (255, 255, 255).
    pub background_color: (u8, u8, u8),
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            use_alpha: false,
            background_color: (255, 255, 255),
        }
    }
}

impl RenderConfig {
    /// Create a render config with specified DPI.
    pub fn with_dpi(dpi: u32) -> Self {
        Self {
            dpi,
            ..Default::default()
        }
    }

    /// Enable alpha channel.
    pub fn use_alpha(mut self, enabled: bool) -> Self {
        self.use_alpha = enabled;
        self
    }

    /// Set the background color.
    pub fn background_color(mut self, rgb: (u8, u8, u8)) -> Self {
        self.background_color = rgb;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 || self.dpi > 1200 {
            return Err(ExportError::InvalidConfig(
                "dpi must be between 1 and 1200".to_string(),
            ));
        }
        Ok(())
    }
}

/// What happens to formula cells copied into an extract workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaMode {
    /// Copy formula text and its cached result unchanged. References to
    /// cells outside the extracted rectangle are not rewritten.
    #[default]
    Verbatim,
    /// Drop formulas and keep only the last calculated result.
    Values,
}

/// Configuration for range extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Formula handling.
    pub formula_mode: FormulaMode,
}

/// Combined configuration for the exporter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// External tool configuration.
    pub tools: ToolConfig,

    /// Render configuration.
    pub render: RenderConfig,

    /// Extraction configuration.
    pub extract: ExtractConfig,

    /// Directory in which the exporter creates its work directory.
    /// Default: system temp directory.
    pub temp_dir: Option<PathBuf>,
}

impl ExporterConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ExportError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Set the tool configuration.
    pub fn tools(mut self, tools: ToolConfig) -> Self {
        self.tools = tools;
        self
    }

    /// Set the render configuration.
    pub fn render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Set the formula handling mode.
    pub fn formula_mode(mut self, mode: FormulaMode) -> Self {
        self.extract.formula_mode = mode;
        self
    }

    /// Set the temporary directory.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        self.render.validate()?;
        if let Some(dir) = &self.temp_dir {
            if !dir.is_dir() {
                return Err(ExportError::InvalidConfig(format!(
                    "temp_dir {} is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}
