//! docshot CLI - capture an outlined web document into a PDF

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info};

use docshot::cdp::CdpPage;
use docshot::{
    BrowserConfig, CaptureConfig, ExportController, ExportOptions, PageSize, SectionOutcome,
    Selectors, Viewport,
};

#[derive(Parser)]
#[command(name = "docshot")]
#[command(version)]
#[command(about = "Capture a document's rendered pages, section by section, into one PDF", long_about = None)]
struct Cli {
    /// Document URL to open (optional with --connect: the current tab is used)
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Attach to a running Chrome via its DevTools websocket URL
    #[arg(long, value_name = "WS_URL")]
    connect: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Cookie header value, e.g. "uid=1; token=abc" (repeatable)
    #[arg(long, value_name = "COOKIE")]
    cookie: Vec<String>,

    /// Extra request header as NAME=VALUE (repeatable)
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// User agent override
    #[arg(long)]
    user_agent: Option<String>,

    /// Viewport as WIDTHxHEIGHT
    #[arg(long, default_value = "1440x900", value_parser = parse_viewport)]
    viewport: Viewport,

    /// Page box sizing
    #[arg(long, value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Wait after clicking an outline entry (ms)
    #[arg(long, default_value_t = 2000)]
    chapter_wait_ms: u64,

    /// Wait after each scroll step (ms)
    #[arg(long, default_value_t = 800)]
    scroll_delay_ms: u64,

    /// Fraction of the visible height scrolled per step
    #[arg(long, default_value_t = 0.9)]
    scroll_step: f64,

    /// Rounds without new pages that end a section
    #[arg(long, default_value_t = 4)]
    stable_rounds: u32,

    /// Soft time limit per section (ms)
    #[arg(long, default_value_t = 40000)]
    section_timeout_ms: u64,

    /// Distance from the bottom (px) at which a section counts as fully scrolled
    #[arg(long, default_value_t = 50.0)]
    bottom_margin_px: f64,

    /// How long to wait for the outline after loading (ms)
    #[arg(long, default_value_t = 15000)]
    outline_wait_ms: u64,

    /// Selector of outline label elements
    #[arg(long)]
    outline_selector: Option<String>,

    /// Selector of rendered page canvases
    #[arg(long)]
    surface_selector: Option<String>,

    /// Scroll container selector, tried in order (repeatable)
    #[arg(long = "scroller")]
    scrollers: Vec<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PageSizeArg {
    /// Fixed A4 pages
    A4,
    /// A4-wide pages sized to each image
    Fit,
}

impl From<PageSizeArg> for PageSize {
    fn from(arg: PageSizeArg) -> Self {
        match arg {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Fit => PageSize::FitImage,
        }
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let height = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    if width == 0 || height == 0 {
        return Err("viewport dimensions must be positive".to_string());
    }
    Ok(Viewport { width, height })
}

impl Cli {
    fn selectors(&self) -> Selectors {
        let mut s = Selectors::default();
        if let Some(label) = &self.outline_selector {
            s.outline_label = label.clone();
        }
        if let Some(surface) = &self.surface_selector {
            s.surface = surface.clone();
        }
        if !self.scrollers.is_empty() {
            s.scrollers = self.scrollers.clone();
        }
        s
    }

    fn browser_config(&self) -> BrowserConfig {
        let mut cfg = BrowserConfig {
            user_agent: self.user_agent.clone(),
            viewport: self.viewport,
            headless: !self.headful,
            outline_wait_ms: self.outline_wait_ms,
            connect_url: self.connect.clone(),
            selectors: self.selectors(),
            ..Default::default()
        };
        cfg.headers.extend(self.headers.iter().cloned());
        for c in &self.cookie {
            cfg = cfg.with_cookie(c);
        }
        cfg
    }

    fn export_options(&self) -> ExportOptions {
        ExportOptions {
            capture: CaptureConfig {
                chapter_wait_ms: self.chapter_wait_ms,
                scroll_delay_ms: self.scroll_delay_ms,
                scroll_step: self.scroll_step,
                stable_rounds: self.stable_rounds,
                section_timeout_ms: self.section_timeout_ms,
                bottom_margin_px: self.bottom_margin_px,
            },
            output_dir: self.output.clone(),
            page_size: self.page_size.into(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.url.is_none() && cli.connect.is_none() {
        eprintln!("error: a URL is required unless --connect is given");
        return ExitCode::from(2);
    }
    if let Some(u) = &cli.url {
        if let Err(e) = url::Url::parse(u) {
            eprintln!("error: invalid URL '{}': {}", u, e);
            return ExitCode::from(2);
        }
    }

    let options = cli.export_options();
    let browser_config = cli.browser_config();
    if let Err(e) = options
        .capture
        .validate()
        .and_then(|_| browser_config.selectors.validate())
    {
        eprintln!("error: {}", e);
        return ExitCode::from(2);
    }

    let target = cli.url.clone();

    let controller = match ExportController::new(move || {
        let mut page = CdpPage::launch(browser_config)?;
        if let Some(u) = target {
            info!("loading {}", u);
            page.load_url(&u)?;
        }
        Ok(page)
    })
    .await
    {
        Ok(c) => c,
        Err(e) => {
            error!("failed to open page: {}", e);
            eprintln!("Export failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = controller.run(options).await;
    let _ = controller.close().await;

    match result {
        Ok(summary) => {
            for s in &summary.sections {
                if s.outcome == SectionOutcome::TimedOut {
                    eprintln!("warning: section '{}' timed out; it may be incomplete", s.label);
                }
            }
            println!(
                "Export complete: {} pages from {} sections -> {}",
                summary.pages,
                summary.sections.len(),
                summary.path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Export failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
