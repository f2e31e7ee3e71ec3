//! docshot
//!
//! Capture a paginated web document's rendered page canvases into a single
//! PDF. The document's outline is clicked entry by entry, each section is
//! scrolled until no new canvases appear, and every canvas seen is written as
//! one PDF page, in the order it was first seen.
//!
//! # Features
//!
//! - **CDP Backend** (default): drives a Chrome tab via the DevTools protocol
//! - **Pluggable page**: the capture loop only talks to the [`DocumentPage`]
//!   trait, so it can run against any backend (or a scripted fake in tests)
//! - **Session controller**: an async start/observe facade that refuses
//!   overlapping runs
//!
//! # Example
//!
//! ```no_run
//! use docshot::{cdp::CdpPage, BrowserConfig, ExportOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut page = CdpPage::launch(BrowserConfig::default())?;
//! page.load_url("https://docs.example.com/doc/123")?;
//!
//! let summary = docshot::export(&mut page, &ExportOptions::default())?;
//! println!("wrote {} pages to {}", summary.pages, summary.path.display());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod clock;
pub mod export;
pub mod normalize;
pub mod outline;
pub mod pdf;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async session controller (worker-thread backed)
pub mod controller;

pub use capture::{CaptureReport, SectionOutcome, SectionReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{ExportController, SessionState};
pub use export::{export, export_with_clock, output_file_name, ExportOptions, ExportSummary};
pub use normalize::NormalizedImage;
pub use outline::{OutlineCandidate, OutlineEntry, OutlineHandle};
pub use pdf::PageSize;

/// Configuration for the browser hosting the document
///
/// Defaults launch a headless Chrome with a desktop viewport. `headers` are
/// sent with every request, which is how session cookies for private
/// documents are supplied (see [`BrowserConfig::with_cookie`]).
///
/// # Examples
///
/// ```
/// let cfg = docshot::BrowserConfig::default();
/// assert!(cfg.headless);
/// ```
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// User agent string to send with requests
    pub user_agent: Option<String>,
    /// Viewport dimensions
    pub viewport: Viewport,
    /// Run Chrome without a window
    pub headless: bool,
    /// Timeout for page loads in milliseconds
    pub timeout_ms: u64,
    /// How long to wait for outline labels to appear after loading
    pub outline_wait_ms: u64,
    /// Custom HTTP headers
    pub headers: HashMap<String, String>,
    /// Attach to a running browser at this DevTools websocket URL instead of launching one
    pub connect_url: Option<String>,
    /// Where the outline, the page surfaces and the scroller live in the DOM
    pub selectors: Selectors,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            viewport: Viewport::default(),
            headless: true,
            timeout_ms: 30000,
            outline_wait_ms: 15000,
            headers: HashMap::new(),
            connect_url: None,
            selectors: Selectors::default(),
        }
    }
}

impl BrowserConfig {
    /// Add a raw `Cookie` header value, appending to any existing one
    pub fn with_cookie(mut self, cookie: &str) -> Self {
        let cookie = cookie.trim();
        if cookie.is_empty() {
            return self;
        }
        self.headers
            .entry("Cookie".to_string())
            .and_modify(|v| {
                v.push_str("; ");
                v.push_str(cookie);
            })
            .or_insert_with(|| cookie.to_string());
        self
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

/// CSS selectors used to find the outline, the page surfaces and the scroller
#[derive(Debug, Clone)]
pub struct Selectors {
    /// Text elements inside outline entries
    pub outline_label: String,
    /// Rendered page surfaces (canvases)
    pub surface: String,
    /// Scroll container candidates, first match wins; falls back to the document element
    pub scrollers: Vec<String>,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            outline_label: ".headline-inner-text".to_string(),
            surface: ".melo-page-canvas-view canvas".to_string(),
            scrollers: vec![
                ".navigation-panel-scroller".to_string(),
                ".melo-editor-canvas-container".to_string(),
                ".page-content-container".to_string(),
            ],
        }
    }
}

/// Timing and termination parameters of the capture loop
///
/// The defaults were tuned against one document viewer and have no deeper
/// derivation; adjust them for slower pages.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Wait after clicking an outline entry
    pub chapter_wait_ms: u64,
    /// Wait after each scroll step
    pub scroll_delay_ms: u64,
    /// Fraction of the visible height advanced per round
    pub scroll_step: f64,
    /// Consecutive rounds without new surfaces that end a section
    pub stable_rounds: u32,
    /// Soft per-section time limit
    pub section_timeout_ms: u64,
    /// Distance from the scroll extent that counts as "bottom"
    pub bottom_margin_px: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chapter_wait_ms: 2000,
            scroll_delay_ms: 800,
            scroll_step: 0.9,
            stable_rounds: 4,
            section_timeout_ms: 40000,
            bottom_margin_px: 50.0,
        }
    }
}

impl CaptureConfig {
    pub fn chapter_wait(&self) -> Duration {
        Duration::from_millis(self.chapter_wait_ms)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn section_timeout(&self) -> Duration {
        Duration::from_millis(self.section_timeout_ms)
    }

    /// Reject parameter combinations that would make the loop spin in place or never stop
    pub fn validate(&self) -> Result<()> {
        if !(self.scroll_step > 0.0 && self.scroll_step.is_finite()) {
            return Err(Error::ConfigError(format!(
                "scroll_step must be a positive number, got {}",
                self.scroll_step
            )));
        }
        if self.stable_rounds == 0 {
            return Err(Error::ConfigError("stable_rounds must be at least 1".into()));
        }
        if !(self.bottom_margin_px >= 0.0 && self.bottom_margin_px.is_finite()) {
            return Err(Error::ConfigError(format!(
                "bottom_margin_px must be a non-negative number, got {}",
                self.bottom_margin_px
            )));
        }
        Ok(())
    }
}

impl Selectors {
    pub fn validate(&self) -> Result<()> {
        if self.outline_label.trim().is_empty() || self.surface.trim().is_empty() {
            return Err(Error::ConfigError("outline and surface selectors must not be empty".into()));
        }
        Ok(())
    }
}

/// Geometry of the scroll container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Visible height of the container
    pub client_height: f64,
    /// Full scrollable height of the container
    pub scroll_height: f64,
}

/// Stable identifier of a rendered surface, assigned by the page on first sight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Everything the capture loop needs from a live document page
///
/// Implementations own the page; the loop never touches the DOM except
/// through these calls, and the only thing it writes is the scroll offset.
pub trait DocumentPage {
    /// Interactive elements found above each outline label, in discovery order
    fn outline_candidates(&mut self) -> Result<Vec<OutlineCandidate>>;

    /// Trigger navigation to an outline entry
    fn click_outline(&mut self, entry: &OutlineEntry) -> Result<()>;

    /// Current geometry of the scroll container
    fn scroll_metrics(&mut self) -> Result<ScrollMetrics>;

    /// Set the scroll container's offset
    fn scroll_to(&mut self, offset: f64) -> Result<()>;

    /// Surfaces currently in the page, in document order
    ///
    /// A surface keeps the same id for the whole run, even after it scrolls
    /// out of view and back.
    fn visible_surfaces(&mut self) -> Result<Vec<SurfaceId>>;

    /// Read the pixels of a previously reported surface
    fn surface_pixels(&mut self, id: SurfaceId) -> Result<image::RgbaImage>;

    /// Document title, if the page has one
    fn title(&mut self) -> Result<Option<String>>;
}

impl<P: DocumentPage + ?Sized> DocumentPage for &mut P {
    fn outline_candidates(&mut self) -> Result<Vec<OutlineCandidate>> {
        (**self).outline_candidates()
    }

    fn click_outline(&mut self, entry: &OutlineEntry) -> Result<()> {
        (**self).click_outline(entry)
    }

    fn scroll_metrics(&mut self) -> Result<ScrollMetrics> {
        (**self).scroll_metrics()
    }

    fn scroll_to(&mut self, offset: f64) -> Result<()> {
        (**self).scroll_to(offset)
    }

    fn visible_surfaces(&mut self) -> Result<Vec<SurfaceId>> {
        (**self).visible_surfaces()
    }

    fn surface_pixels(&mut self, id: SurfaceId) -> Result<image::RgbaImage> {
        (**self).surface_pixels(id)
    }

    fn title(&mut self) -> Result<Option<String>> {
        (**self).title()
    }
}

#[cfg(test)]
pub(crate) mod testing;
