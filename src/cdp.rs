//! Chrome DevTools Protocol page implementation

use crate::{
    BrowserConfig, DocumentPage, Error, OutlineCandidate, OutlineEntry, Result, ScrollMetrics,
    Selectors, SurfaceId,
};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Page-side registry. Outline elements and canvases are kept alive here and
// addressed by index, which is the id handed back to Rust.
const REGISTRY: &str = r#"const __ds = window.__docshot || (window.__docshot = { outline: [], surfaces: [], ids: new WeakMap(), scroller: null });
const __dsScroller = function(){ return (__ds.scroller && __ds.scroller.isConnected) ? __ds.scroller : document.documentElement; };"#;

/// CDP-backed document page (uses the `headless_chrome` crate)
///
/// Launches a headless Chrome (or attaches to a running one), manages a
/// single tab, and implements [`DocumentPage`] over it with small injected
/// scripts.
pub struct CdpPage {
    browser: Browser,
    tab: Arc<Tab>,
    config: BrowserConfig,
}

#[derive(Deserialize)]
struct RawCandidate {
    handle: u64,
    text: String,
}

#[derive(Deserialize)]
struct RawMetrics {
    client_height: f64,
    scroll_height: f64,
}

impl CdpPage {
    /// Launch Chrome, or attach to `config.connect_url` when set
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        config.selectors.validate()?;

        let (browser, tab) = match &config.connect_url {
            Some(ws_url) => {
                let browser = Browser::connect(ws_url.clone())
                    .map_err(|e| Error::InitializationError(format!("Failed to connect to {}: {}", ws_url, e)))?;
                let tab = browser
                    .wait_for_initial_tab()
                    .map_err(|e| Error::InitializationError(format!("No tab to attach to: {}", e)))?;
                (browser, tab)
            }
            None => {
                let launch_options = LaunchOptions::default_builder()
                    .headless(config.headless)
                    .window_size(Some((config.viewport.width, config.viewport.height)))
                    .idle_browser_timeout(Duration::from_secs(600))
                    .build()
                    .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

                let browser = Browser::new(launch_options)
                    .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

                let tab = browser
                    .new_tab()
                    .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
                (browser, tab)
            }
        };

        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        if let Some(ua) = &config.user_agent {
            tab.set_user_agent(ua, None, None)
                .map_err(|e| Error::InitializationError(format!("Failed to set user agent: {}", e)))?;
        }

        if !config.headers.is_empty() {
            // headless_chrome expects a HashMap<&str, &str>
            let headers: std::collections::HashMap<&str, &str> = config
                .headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();

            tab.set_extra_http_headers(headers)
                .map_err(|e| Error::InitializationError(format!("Failed to set headers: {}", e)))?;
        }

        Ok(Self {
            browser,
            tab,
            config,
        })
    }

    fn selectors(&self) -> &Selectors {
        &self.config.selectors
    }

    /// Navigate to `url`, then wait for the outline labels to show up
    pub fn load_url(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        if !self.wait_for_outline(Duration::from_millis(self.config.outline_wait_ms))? {
            warn!(
                "no element matching {} after {}ms; is the outline expanded?",
                self.selectors().outline_label, self.config.outline_wait_ms
            );
        }
        Ok(())
    }

    /// Poll until an outline label exists; `false` if `timeout` elapsed first
    pub fn wait_for_outline(&self, timeout: Duration) -> Result<bool> {
        let script = format!(
            "document.querySelector({}) !== null",
            js_string(&self.selectors().outline_label)
        );
        let start = Instant::now();
        loop {
            if let Ok(result) = self.tab.evaluate(&script, false) {
                if result.value.and_then(|v| v.as_bool()) == Some(true) {
                    return Ok(true);
                }
            }
            if start.elapsed() > timeout {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(200));
        }
    }

    /// Current page URL
    pub fn url(&self) -> String {
        self.tab.get_url()
    }

    /// Close the tab's browser (a no-op for attached browsers beyond disconnecting)
    pub fn close(self) -> Result<()> {
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }

    fn eval_string(&self, body: &str) -> Result<String> {
        let script = format!("(function(){{\n{}\n{}\n}})()", REGISTRY, body);
        let result = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| Error::ScriptError(format!("Evaluation failed: {}", e)))?;

        match result.value {
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(other) => Err(Error::ScriptError(format!("Expected a string result, got {}", other))),
            None => Err(Error::ScriptError("No value returned from evaluation".into())),
        }
    }

    fn eval_json<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        let raw = self.eval_string(body)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::ScriptError(format!("Malformed script result: {}", e)))
    }
}

impl DocumentPage for CdpPage {
    fn outline_candidates(&mut self) -> Result<Vec<OutlineCandidate>> {
        let body = format!(
            r#"
            __ds.scroller = null;
            for (const sel of {scrollers}) {{
                const el = document.querySelector(sel);
                if (el) {{ __ds.scroller = el; break; }}
            }}
            const found = [];
            document.querySelectorAll({label}).forEach(function(textEl) {{
                let parent = textEl.parentElement;
                for (let i = 0; i < 6 && parent; i++) {{
                    const cls = typeof parent.className === 'string' ? parent.className : '';
                    if (parent.onclick || parent.getAttribute('role') === 'button' || /outline|headline/i.test(cls)) {{
                        let idx = __ds.outline.indexOf(parent);
                        if (idx < 0) {{ idx = __ds.outline.length; __ds.outline.push(parent); }}
                        found.push({{ handle: idx, text: parent.innerText || '' }});
                        break;
                    }}
                    parent = parent.parentElement;
                }}
            }});
            return JSON.stringify(found);
            "#,
            scrollers = serde_json::to_string(&self.selectors().scrollers)
                .map_err(|e| Error::ConfigError(e.to_string()))?,
            label = js_string(&self.selectors().outline_label),
        );

        let raw: Vec<RawCandidate> = self.eval_json(&body)?;
        Ok(raw
            .into_iter()
            .map(|c| OutlineCandidate::new(c.handle, c.text))
            .collect())
    }

    fn click_outline(&mut self, entry: &OutlineEntry) -> Result<()> {
        let body = format!(
            r#"
            const el = __ds.outline[{}];
            if (!el || !el.isConnected) return 'missing';
            el.click();
            return 'ok';
            "#,
            entry.handle.0
        );
        match self.eval_string(&body)?.as_str() {
            "ok" => Ok(()),
            _ => Err(Error::ScriptError(format!(
                "outline entry '{}' is no longer in the page",
                entry.label
            ))),
        }
    }

    fn scroll_metrics(&mut self) -> Result<ScrollMetrics> {
        let m: RawMetrics = self.eval_json(
            r#"
            const el = __dsScroller();
            return JSON.stringify({ client_height: el.clientHeight, scroll_height: el.scrollHeight });
            "#,
        )?;
        Ok(ScrollMetrics {
            client_height: m.client_height,
            scroll_height: m.scroll_height,
        })
    }

    fn scroll_to(&mut self, offset: f64) -> Result<()> {
        let body = format!("__dsScroller().scrollTop = {}; return 'ok';", offset);
        self.eval_string(&body).map(|_| ())
    }

    fn visible_surfaces(&mut self) -> Result<Vec<SurfaceId>> {
        let body = format!(
            r#"
            const ids = [];
            document.querySelectorAll({}).forEach(function(c) {{
                let id = __ds.ids.get(c);
                if (id === undefined) {{ id = __ds.surfaces.length; __ds.surfaces.push(c); __ds.ids.set(c, id); }}
                ids.push(id);
            }});
            return JSON.stringify(ids);
            "#,
            js_string(&self.selectors().surface)
        );
        let ids: Vec<u64> = self.eval_json(&body)?;
        Ok(ids.into_iter().map(SurfaceId).collect())
    }

    fn surface_pixels(&mut self, id: SurfaceId) -> Result<image::RgbaImage> {
        let body = format!(
            r#"
            const c = __ds.surfaces[{}];
            if (!c) return '';
            return c.toDataURL('image/png');
            "#,
            id.0
        );
        let data_url = self.eval_string(&body)?;
        let img = decode_png_data_url(&data_url)
            .map_err(|e| Error::RenderError(format!("surface {}: {}", id.0, e)))?;
        debug!("surface {}: {}x{}", id.0, img.width(), img.height());
        Ok(img)
    }

    fn title(&mut self) -> Result<Option<String>> {
        let title = self
            .tab
            .get_title()
            .map_err(|e| Error::ScriptError(format!("Failed to get title: {}", e)))?;
        let title = title.trim();
        Ok((!title.is_empty()).then(|| title.to_string()))
    }
}

/// Quote `s` as a JavaScript string literal
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Decode a `data:image/png;base64,...` URL into RGBA pixels
pub fn decode_png_data_url(data_url: &str) -> Result<image::RgbaImage> {
    let payload = data_url
        .strip_prefix("data:image/png;base64,")
        .ok_or_else(|| Error::RenderError("not a PNG data URL (empty or zero-sized canvas?)".into()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| Error::RenderError(format!("bad base64: {}", e)))?;
    let img = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)?;
    Ok(img.to_rgba8())
}
