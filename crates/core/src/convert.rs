//! Delegated conversion: spreadsheet to PDF with LibreOffice, PDF to PNG
//! with a rasterizer.
//!
//! Every call blocks until the external process exits. Outputs are placed
//! at the caller's path only after the tool reports success and the
//! expected file exists.

use crate::config::{RasterizerKind, RenderConfig, ToolConfig};
use crate::error::{ExportError, Result};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, trace};

const SOFFICE: &str = "soffice";
const PDFTOPPM: &str = "pdftoppm";

/// Where to look for one external binary when no path is configured.
struct ToolSearch {
    tool: &'static str,
    /// Checked in order before PATH.
    install_paths: &'static [&'static str],
    /// Names tried on PATH.
    path_names: &'static [&'static str],
}

const SOFFICE_SEARCH: ToolSearch = ToolSearch {
    tool: SOFFICE,
    install_paths: &[
        "/Applications/LibreOffice.app/Contents/MacOS/soffice",
        "/usr/bin/soffice",
        "/usr/lib/libreoffice/program/soffice",
        "/opt/libreoffice/program/soffice",
        "/snap/bin/libreoffice.soffice",
    ],
    path_names: &["soffice", "libreoffice"],
};

const PDFTOPPM_SEARCH: ToolSearch = ToolSearch {
    tool: PDFTOPPM,
    install_paths: &[],
    path_names: &["pdftoppm"],
};

impl ToolSearch {
    /// A configured path must exist; it is never second-guessed.
    fn locate(&self, configured: Option<&Path>) -> Result<PathBuf> {
        let found = match configured {
            Some(path) => path.exists().then(|| path.to_path_buf()),
            None => self
                .install_paths
                .iter()
                .map(Path::new)
                .find(|path| path.exists())
                .map(Path::to_path_buf)
                .or_else(|| {
                    self.path_names
                        .iter()
                        .find_map(|name| which::which(name).ok())
                }),
        };
        trace!("{} resolved to {:?}", self.tool, found);
        found.ok_or(ExportError::ToolNotFound { tool: self.tool })
    }
}

/// Locate the soffice binary.
pub fn find_soffice(tools: &ToolConfig) -> Result<PathBuf> {
    SOFFICE_SEARCH.locate(tools.soffice_path.as_deref())
}

/// Locate the pdftoppm binary.
pub fn find_pdftoppm(tools: &ToolConfig) -> Result<PathBuf> {
    PDFTOPPM_SEARCH.locate(tools.pdftoppm_path.as_deref())
}

/// Run a prepared command, turning spawn failures and nonzero exits into
/// [`ExportError::ToolFailed`].
fn run_tool(tool: &'static str, mut cmd: Command, subject: &Path) -> Result<()> {
    let output = cmd.output().map_err(|e| ExportError::ToolFailed {
        tool,
        path: subject.to_path_buf(),
        message: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr.trim().to_string()
        };
        return Err(ExportError::ToolFailed {
            tool,
            path: subject.to_path_buf(),
            message,
        });
    }
    Ok(())
}

/// File name LibreOffice gives the PDF it writes for `input`.
fn pdf_name(input: &Path) -> OsString {
    let mut name = input
        .file_stem()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".pdf");
    name
}

/// `base` with `.png` appended, which is what pdftoppm writes in
/// single-file mode. Existing dots in the name are kept.
fn with_png_suffix(base: &Path) -> PathBuf {
    let mut path = base.as_os_str().to_os_string();
    path.push(".png");
    PathBuf::from(path)
}

/// Fresh directory next to `output` for a tool to write into, so nothing
/// already beside `output` can be mistaken for the tool's result.
fn staging_dir(output: &Path, prefix: &str) -> Result<tempfile::TempDir> {
    let dir = parent_dir(output);
    std::fs::create_dir_all(&dir)?;
    Ok(tempfile::Builder::new().prefix(prefix).tempdir_in(dir)?)
}

/// Headless LibreOffice spreadsheet-to-PDF converter.
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    soffice_path: PathBuf,
}

impl OfficeConverter {
    /// Resolve the soffice binary from `tools`.
    pub fn new(tools: &ToolConfig) -> Result<Self> {
        Ok(Self {
            soffice_path: find_soffice(tools)?,
        })
    }

    /// Binary in use.
    pub fn soffice_path(&self) -> &Path {
        &self.soffice_path
    }

    /// Convert `input` to PDF inside `output_dir` and return the PDF's path.
    ///
    /// LibreOffice names its output after the input's stem. Each call runs
    /// with its own throwaway user profile.
    pub fn convert_to_pdf(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let start = Instant::now();
        let profile = tempfile::Builder::new().prefix("lo-profile-").tempdir()?;

        let mut cmd = Command::new(&self.soffice_path);
        cmd.args([
            "--headless",
            "--invisible",
            "--nologo",
            "--nofirststartwizard",
            "--norestore",
        ]);
        cmd.arg(format!(
            "-env:UserInstallation=file://{}",
            profile.path().display()
        ));
        cmd.args(["--convert-to", "pdf", "--outdir"]);
        cmd.arg(output_dir);
        cmd.arg(input);

        debug!("Converting {:?} to PDF in {:?}", input, output_dir);
        run_tool(SOFFICE, cmd, input)?;

        let pdf_path = output_dir.join(pdf_name(input));
        if !pdf_path.exists() {
            return Err(ExportError::MissingOutput {
                tool: SOFFICE,
                expected: pdf_path,
            });
        }

        debug!("Converted {:?} in {:?}", input, start.elapsed());
        Ok(pdf_path)
    }
}

/// Turns the first page of a PDF into a PNG file.
pub trait Rasterizer {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Render page 1 of `pdf` and write the image to exactly `output`.
    fn rasterize_first_page(&self, pdf: &Path, output: &Path) -> Result<()>;
}

/// Rasterizer backed by poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    pdftoppm_path: PathBuf,
    dpi: u32,
}

impl PdftoppmRasterizer {
    /// Resolve the pdftoppm binary from `tools`.
    pub fn new(tools: &ToolConfig, render: &RenderConfig) -> Result<Self> {
        render.validate()?;
        Ok(Self {
            pdftoppm_path: find_pdftoppm(tools)?,
            dpi: render.dpi,
        })
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn name(&self) -> &'static str {
        PDFTOPPM
    }

    fn rasterize_first_page(&self, pdf: &Path, output: &Path) -> Result<()> {
        let staging = staging_dir(output, ".pdftoppm-")?;
        let base = staging
            .path()
            .join(output.file_stem().unwrap_or_else(|| OsStr::new("page")));
        let produced = with_png_suffix(&base);

        let mut cmd = Command::new(&self.pdftoppm_path);
        cmd.args(["-png", "-singlefile", "-r"]);
        cmd.arg(self.dpi.to_string());
        cmd.arg(pdf);
        cmd.arg(&base);

        debug!("Rasterizing {:?} to {:?} at {} DPI", pdf, produced, self.dpi);
        run_tool(PDFTOPPM, cmd, pdf)?;

        if !produced.exists() {
            return Err(ExportError::MissingOutput {
                tool: PDFTOPPM,
                expected: produced,
            });
        }
        std::fs::rename(&produced, output)?;
        Ok(())
    }
}

/// In-process rasterizer using pdfium.
pub struct PdfiumRasterizer {
    config: RenderConfig,
    pdfium: Pdfium,
}

impl std::fmt::Debug for PdfiumRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumRasterizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PdfiumRasterizer {
    /// Bind to the pdfium library and create a rasterizer.
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;

        let bindings = bind_pdfium()?;
        debug!("pdfium rasterizer ready at {} DPI", config.dpi);
        Ok(Self {
            config,
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Configured DPI.
    pub fn dpi(&self) -> u32 {
        self.config.dpi
    }

    /// Render the first page of `pdf` to an RGBA image.
    pub fn render_first_page(&self, pdf: &Path) -> Result<RgbaImage> {
        let document = self
            .pdfium
            .load_pdf_from_file(pdf, None)
            .map_err(|e| ExportError::PdfiumError(format!("Failed to load PDF: {}", e)))?;

        let page = document
            .pages()
            .first()
            .map_err(|e| ExportError::PdfiumError(format!("PDF has no first page: {}", e)))?;

        // Page geometry is in points, 72 to the inch.
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.config.dpi as f32 / 72.0)
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let mut image = page
            .render_with_config(&render_config)
            .map_err(|e| ExportError::PdfiumError(format!("Failed to render page 1: {}", e)))?
            .as_image()
            .into_rgba8();
        if !self.config.use_alpha {
            flatten_onto(&mut image, self.config.background_color);
        }
        Ok(image)
    }
}

/// Library directories tried before the system loader's own search.
const PDFIUM_DIRS: [&str; 3] = ["./", "/usr/lib", "/usr/local/lib"];

fn bind_pdfium() -> Result<Box<dyn PdfiumLibraryBindings>> {
    for dir in PDFIUM_DIRS {
        match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", dir);
                return Ok(bindings);
            }
            Err(e) => trace!("No pdfium in {}: {}", dir, e),
        }
    }
    Pdfium::bind_to_system_library()
        .map_err(|e| ExportError::PdfiumError(format!("Failed to load pdfium library: {}", e)))
}

impl Rasterizer for PdfiumRasterizer {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn rasterize_first_page(&self, pdf: &Path, output: &Path) -> Result<()> {
        let image = self.render_first_page(pdf)?;
        let mut png = Vec::new();
        encode_png(&image, &mut png)?;
        std::fs::write(output, png)?;
        debug!(
            "Rendered {:?} to {:?} ({}x{})",
            pdf,
            output,
            image.width(),
            image.height()
        );
        Ok(())
    }
}

/// Blend every translucent pixel over an opaque background colour.
fn flatten_onto(image: &mut RgbaImage, (r, g, b): (u8, u8, u8)) {
    let background = [r, g, b];
    for pixel in image.pixels_mut() {
        let alpha = u32::from(pixel[3]);
        if alpha == 255 {
            continue;
        }
        for (channel, under) in pixel.0.iter_mut().zip(background) {
            let blended = u32::from(*channel) * alpha + u32::from(under) * (255 - alpha);
            *channel = ((blended + 127) / 255) as u8;
        }
        pixel[3] = 255;
    }
}

/// Write `image` as an 8-bit RGBA PNG to `sink`.
fn encode_png<W: Write>(image: &RgbaImage, sink: W) -> Result<()> {
    let mut encoder = png::Encoder::new(sink, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Fast);

    encoder
        .write_header()
        .and_then(|mut writer| {
            writer.write_image_data(image.as_raw())?;
            writer.finish()
        })
        .map_err(|e| ExportError::PngEncodingError(e.to_string()))
}

/// Runs the converter and rasterizer for one export and places the result.
#[derive(Debug, Clone)]
pub struct ConversionInvoker {
    tools: ToolConfig,
    render: RenderConfig,
    scratch_root: PathBuf,
}

impl ConversionInvoker {
    /// Create an invoker whose intermediate PDFs go under `scratch_root`.
    pub fn new(tools: ToolConfig, render: RenderConfig, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            render,
            scratch_root: scratch_root.into(),
        }
    }

    /// Build the configured rasterizer.
    pub fn rasterizer(&self) -> Result<Box<dyn Rasterizer>> {
        Ok(match self.tools.rasterizer {
            RasterizerKind::Pdftoppm => Box::new(PdftoppmRasterizer::new(&self.tools, &self.render)?),
            RasterizerKind::Pdfium => Box::new(PdfiumRasterizer::new(self.render.clone())?),
        })
    }

    /// Convert `spreadsheet` to a PDF at exactly `output`.
    ///
    /// LibreOffice writes into a fresh directory beside `output`, so a file
    /// already named after the input's stem is never taken for its result.
    pub fn to_pdf(&self, spreadsheet: &Path, output: &Path) -> Result<()> {
        let converter = OfficeConverter::new(&self.tools)?;
        let staging = staging_dir(output, ".soffice-")?;

        let pdf = converter.convert_to_pdf(spreadsheet, staging.path())?;
        std::fs::rename(&pdf, output)?;
        info!("Exported {:?} to {:?}", spreadsheet, output);
        Ok(())
    }

    /// Convert `spreadsheet` to PDF in a scratch directory, then rasterize
    /// its first page to exactly `output`.
    pub fn to_png(&self, spreadsheet: &Path, output: &Path) -> Result<()> {
        let converter = OfficeConverter::new(&self.tools)?;
        let rasterizer = self.rasterizer()?;
        std::fs::create_dir_all(parent_dir(output))?;

        let scratch = tempfile::Builder::new()
            .prefix("pdf-")
            .tempdir_in(&self.scratch_root)?;
        let pdf = converter.convert_to_pdf(spreadsheet, scratch.path())?;
        rasterizer.rasterize_first_page(&pdf, output)?;

        info!(
            "Exported {:?} to {:?} via {}",
            spreadsheet,
            output,
            rasterizer.name()
        );
        Ok(())
    }
}

/// Directory holding `path`, `.` for bare file names.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
