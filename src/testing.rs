//! Scripted in-memory page for unit tests

use crate::{
    DocumentPage, Error, OutlineCandidate, OutlineEntry, OutlineHandle, Result, ScrollMetrics,
    SurfaceId,
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Candidates,
    Click(String),
    ScrollTo(f64),
    Query,
}

/// One section's scroll geometry and the surfaces that appear as it scrolls
#[derive(Debug, Clone)]
pub struct SectionScript {
    pub client_height: f64,
    pub scroll_height: f64,
    /// (offset at which the surface appears, surface id)
    pub reveals: Vec<(f64, u64)>,
    /// Emit a brand-new surface on every query
    pub endless: bool,
}

impl SectionScript {
    pub fn new(client_height: f64, scroll_height: f64) -> Self {
        Self {
            client_height,
            scroll_height,
            reveals: Vec::new(),
            endless: false,
        }
    }

    pub fn reveal(mut self, at: f64, id: u64) -> Self {
        self.reveals.push((at, id));
        self
    }

    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct ScriptedPage {
    pub candidates: Vec<OutlineCandidate>,
    pub sections: HashMap<OutlineHandle, SectionScript>,
    pub title: Option<String>,
    pub calls: Vec<Call>,
    pub fail_queries: bool,
    current: Option<OutlineHandle>,
    offset: f64,
    next_endless_id: u64,
    shown: Vec<u64>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self {
            next_endless_id: 10_000,
            ..Default::default()
        }
    }

    pub fn candidate(mut self, handle: u64, text: &str) -> Self {
        self.candidates.push(OutlineCandidate::new(handle, text));
        self
    }

    pub fn section(mut self, handle: u64, script: SectionScript) -> Self {
        self.sections.insert(OutlineHandle(handle), script);
        self
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn clicks(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Click(l) => Some(l.clone()),
                _ => None,
            })
            .collect()
    }

    fn current_section(&self) -> Result<&SectionScript> {
        self.current
            .and_then(|h| self.sections.get(&h))
            .ok_or_else(|| Error::ScriptError("no section selected".into()))
    }
}

/// Surface pixels encode their id in the width so page order is observable
pub fn surface_size(id: u64) -> (u32, u32) {
    (8 + id as u32, 12)
}

impl DocumentPage for ScriptedPage {
    fn outline_candidates(&mut self) -> Result<Vec<OutlineCandidate>> {
        self.calls.push(Call::Candidates);
        Ok(self.candidates.clone())
    }

    fn click_outline(&mut self, entry: &OutlineEntry) -> Result<()> {
        self.calls.push(Call::Click(entry.label.clone()));
        self.current = Some(entry.handle);
        self.offset = 0.0;
        Ok(())
    }

    fn scroll_metrics(&mut self) -> Result<ScrollMetrics> {
        let s = self.current_section()?;
        Ok(ScrollMetrics {
            client_height: s.client_height,
            scroll_height: s.scroll_height,
        })
    }

    fn scroll_to(&mut self, offset: f64) -> Result<()> {
        self.calls.push(Call::ScrollTo(offset));
        self.offset = offset;
        Ok(())
    }

    fn visible_surfaces(&mut self) -> Result<Vec<SurfaceId>> {
        self.calls.push(Call::Query);
        if self.fail_queries {
            return Err(Error::ScriptError("querySelectorAll failed".into()));
        }
        let offset = self.offset;
        let s = self.current_section()?.clone();
        for (at, id) in &s.reveals {
            if *at <= offset && !self.shown.contains(id) {
                self.shown.push(*id);
            }
        }
        if s.endless {
            self.next_endless_id += 1;
            self.shown.push(self.next_endless_id);
        }
        Ok(self.shown.iter().map(|id| SurfaceId(*id)).collect())
    }

    fn surface_pixels(&mut self, id: SurfaceId) -> Result<image::RgbaImage> {
        let (w, h) = surface_size(id.0);
        Ok(image::RgbaImage::new(w, h))
    }

    fn title(&mut self) -> Result<Option<String>> {
        Ok(self.title.clone())
    }
}
