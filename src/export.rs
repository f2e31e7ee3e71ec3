//! End-to-end export: capture, normalize, assemble, write.
//!
//! Nothing is written until every surface has been captured and encoded, so a
//! failure anywhere leaves no partial file behind.

use crate::capture::{run_capture, SectionReport};
use crate::clock::{Clock, SystemClock};
use crate::normalize::normalize_surface;
use crate::pdf::{self, PageSize};
use crate::{CaptureConfig, DocumentPage, Result};
use log::info;
use std::path::{Path, PathBuf};

/// Name used when the document has no usable title
pub const FALLBACK_NAME: &str = "docshot-export";

/// Options for [`export`]
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub capture: CaptureConfig,
    /// Directory receiving `<title>.pdf`
    pub output_dir: PathBuf,
    pub page_size: PageSize,
    /// File stem used when the page title is empty
    pub fallback_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            output_dir: PathBuf::from("."),
            page_size: PageSize::default(),
            fallback_name: FALLBACK_NAME.to_string(),
        }
    }
}

/// A finished PDF held in memory
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub title: Option<String>,
    pub pages: usize,
    pub sections: Vec<SectionReport>,
    pub bytes: Vec<u8>,
}

/// Outcome of a successful export
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub pages: usize,
    pub sections: Vec<SectionReport>,
}

/// Export the page's document to `<output_dir>/<title>.pdf` using wall-clock waits
pub fn export<P: DocumentPage>(page: P, opts: &ExportOptions) -> Result<ExportSummary> {
    export_with_clock(page, &SystemClock::new(), opts)
}

pub fn export_with_clock<P, C>(page: P, clock: &C, opts: &ExportOptions) -> Result<ExportSummary>
where
    P: DocumentPage,
    C: Clock + ?Sized,
{
    let doc = render_document(page, clock, opts)?;
    let path = write_document(&doc, &opts.output_dir, &opts.fallback_name)?;
    Ok(ExportSummary {
        path,
        pages: doc.pages,
        sections: doc.sections,
    })
}

/// Run the capture loop and build the PDF without touching the filesystem
pub fn render_document<P, C>(mut page: P, clock: &C, opts: &ExportOptions) -> Result<RenderedDocument>
where
    P: DocumentPage,
    C: Clock + ?Sized,
{
    let report = run_capture(&mut page, clock, &opts.capture)?;

    info!("building PDF, {} pages", report.surfaces.len());
    let mut images = Vec::with_capacity(report.surfaces.len());
    for id in &report.surfaces {
        let pixels = page.surface_pixels(*id)?;
        images.push(normalize_surface(&pixels)?);
    }

    let title = page.title()?;
    let bytes = pdf::assemble(&images, opts.page_size, title.as_deref())?;

    Ok(RenderedDocument {
        title,
        pages: images.len(),
        sections: report.sections,
        bytes,
    })
}

/// Write `doc` into `dir`, creating it if needed, and return the file path
pub fn write_document(doc: &RenderedDocument, dir: &Path, fallback: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(output_file_name(doc.title.as_deref(), fallback));
    std::fs::write(&path, &doc.bytes)?;
    info!("saved {}", path.display());
    Ok(path)
}

/// Longest file stem in bytes; most filesystems cap a name at 255 bytes
const MAX_STEM_BYTES: usize = 200;

/// `<title>.pdf` with characters that are unsafe in file names replaced
pub fn output_file_name(title: Option<&str>, fallback: &str) -> String {
    let mut cleaned = String::new();
    for c in title.unwrap_or("").trim().chars() {
        let c = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        if cleaned.len() + c.len_utf8() > MAX_STEM_BYTES {
            break;
        }
        cleaned.push(c);
    }
    let cleaned = cleaned.trim_end_matches(['.', ' ']).trim();

    let stem = if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        fallback
    } else {
        cleaned
    };
    format!("{}.pdf", stem)
}
