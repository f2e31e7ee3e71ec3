//! The chapter-by-chapter scroll-and-capture loop.
//!
//! For every outline entry the loop clicks it, waits for the section to start
//! rendering, then scrolls the container in steps of `scroll_step` visible
//! heights, recording each surface the first time it is seen. A section ends
//! when nothing new has shown up for `stable_rounds` rounds, when the scroll
//! position reaches the bottom of the container, or when the section has run
//! for longer than `section_timeout_ms`. The timeout is a soft limit: the
//! section keeps what it collected and the next one starts.
//!
//! Readiness is approximated by fixed waits. Nothing checks that a section
//! was captured completely.

use crate::clock::Clock;
use crate::outline::{collect_entries, OutlineEntry};
use crate::{CaptureConfig, DocumentPage, Error, Result, SurfaceId};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Duration;

/// How a section's inner loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionOutcome {
    /// No new surfaces for the configured number of rounds
    Stable,
    /// Scroll position reached the container's extent
    BottomReached,
    /// Section ran past its time limit
    TimedOut,
}

/// Per-section statistics
#[derive(Debug, Clone, PartialEq)]
pub struct SectionReport {
    pub label: String,
    pub outcome: SectionOutcome,
    /// Surfaces first seen during this section
    pub added: usize,
    /// Scroll rounds run
    pub rounds: u32,
    pub elapsed: Duration,
}

/// Result of a whole capture run
#[derive(Debug, Clone, Default)]
pub struct CaptureReport {
    /// Every distinct surface, in first-seen order
    pub surfaces: Vec<SurfaceId>,
    pub sections: Vec<SectionReport>,
}

/// Accumulated state of one export run
///
/// The surface set only grows: ids are appended the first time they are seen
/// and never removed or reordered.
#[derive(Debug, Default)]
pub struct CaptureSession {
    seen: HashSet<SurfaceId>,
    order: Vec<SurfaceId>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the currently visible surfaces and return how many were new
    pub fn absorb<I>(&mut self, visible: I) -> usize
    where
        I: IntoIterator<Item = SurfaceId>,
    {
        let before = self.order.len();
        for id in visible {
            if self.seen.insert(id) {
                self.order.push(id);
            }
        }
        self.order.len() - before
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn surfaces(&self) -> &[SurfaceId] {
        &self.order
    }

    pub fn into_surfaces(self) -> Vec<SurfaceId> {
        self.order
    }
}

/// Ask the page for outline candidates and reduce them to the entries to visit
pub fn discover_outline<P: DocumentPage + ?Sized>(page: &mut P) -> Result<Vec<OutlineEntry>> {
    let candidates = page.outline_candidates()?;
    let found = candidates.len();
    let entries = collect_entries(candidates);
    debug!("outline: {} candidates, {} distinct entries", found, entries.len());
    Ok(entries)
}

/// Run the capture loop over every outline entry of the page.
///
/// Returns [`Error::NoOutline`] before touching the page if no entries are
/// found. Any page error aborts the run and is returned as-is.
pub fn run_capture<P, C>(page: &mut P, clock: &C, config: &CaptureConfig) -> Result<CaptureReport>
where
    P: DocumentPage + ?Sized,
    C: Clock + ?Sized,
{
    config.validate()?;

    let entries = discover_outline(page)?;
    if entries.is_empty() {
        return Err(Error::NoOutline);
    }

    let mut session = CaptureSession::new();
    let mut sections = Vec::with_capacity(entries.len());

    for entry in &entries {
        info!("capturing section: {}", entry.label);

        page.click_outline(entry)?;
        clock.sleep(config.chapter_wait());

        let report = capture_section(page, clock, config, entry, &mut session)?;
        info!(
            "section [{}] done ({:?}), {} pages so far",
            entry.label,
            report.outcome,
            session.len()
        );
        sections.push(report);
    }

    info!("capture finished: {} pages across {} sections", session.len(), sections.len());

    Ok(CaptureReport {
        surfaces: session.into_surfaces(),
        sections,
    })
}

fn capture_section<P, C>(
    page: &mut P,
    clock: &C,
    config: &CaptureConfig,
    entry: &OutlineEntry,
    session: &mut CaptureSession,
) -> Result<SectionReport>
where
    P: DocumentPage + ?Sized,
    C: Clock + ?Sized,
{
    let start = clock.now();
    let before = session.len();
    let mut position = 0.0_f64;
    let mut stable = 0_u32;
    let mut rounds = 0_u32;

    let outcome = loop {
        if stable >= config.stable_rounds {
            break SectionOutcome::Stable;
        }
        if clock.now().saturating_sub(start) > config.section_timeout() {
            warn!("section [{}] scroll timed out", entry.label);
            break SectionOutcome::TimedOut;
        }

        let metrics = page.scroll_metrics()?;
        position += metrics.client_height * config.scroll_step;
        page.scroll_to(position)?;
        clock.sleep(config.scroll_delay());
        rounds += 1;

        let added = session.absorb(page.visible_surfaces()?);
        stable = if added > 0 { 0 } else { stable + 1 };
        debug!("scrolled to {}px, new surfaces: {}", position.floor(), added);

        // The extent is re-read: it may have grown while new content rendered
        let metrics = page.scroll_metrics()?;
        if position >= metrics.scroll_height - config.bottom_margin_px {
            info!("section [{}] reached bottom", entry.label);
            break SectionOutcome::BottomReached;
        }
    };

    Ok(SectionReport {
        label: entry.label.clone(),
        outcome,
        added: session.len() - before,
        rounds,
        elapsed: clock.now().saturating_sub(start),
    })
}
