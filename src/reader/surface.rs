//! Double-buffered display surfaces.
//!
//! The reader renders into the standby slot and swaps only once loading
//! succeeded, so an observer of the active slot never sees a half-loaded
//! document.

use std::mem;

use thiserror::Error;

use super::command::Direction;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Surface unavailable: {0}")]
    Unavailable(String),
    #[error("Surface I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can show an HTML document.
pub trait DisplaySurface: Send {
    fn load_html(&mut self, html: &str, base_url: &str) -> Result<(), SurfaceError>;
    fn clear(&mut self);

    /// Scroll the loaded document to `fraction` (0.0 top, 1.0 bottom).
    /// Surfaces that cannot scroll ignore it.
    fn scroll_to(&mut self, _fraction: f32) {}
}

/// In-memory surface that keeps the last loaded document.
#[derive(Debug, Default, Clone)]
pub struct HtmlBuffer {
    document: Option<String>,
    loads: usize,
    scroll_fraction: f32,
}

impl HtmlBuffer {
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Number of documents loaded over the buffer's lifetime.
    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn scroll_fraction(&self) -> f32 {
        self.scroll_fraction
    }
}

impl DisplaySurface for HtmlBuffer {
    fn load_html(&mut self, html: &str, _base_url: &str) -> Result<(), SurfaceError> {
        self.document = Some(html.to_string());
        self.loads += 1;
        self.scroll_fraction = 0.0;
        Ok(())
    }

    fn clear(&mut self) {
        self.document = None;
        self.scroll_fraction = 0.0;
    }

    fn scroll_to(&mut self, fraction: f32) {
        if self.document.is_some() {
            self.scroll_fraction = fraction;
        }
    }
}

/// Which way the last swap moved, for hosts that animate page turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// In-place reload (toggle, first open).
    Replace,
    Slide(Direction),
}

/// Two named slots, `active` and `standby`.
pub struct SurfacePair<S> {
    active: S,
    standby: S,
    last_transition: Option<Transition>,
}

impl<S: DisplaySurface> SurfacePair<S> {
    pub fn new(active: S, standby: S) -> Self {
        Self {
            active,
            standby,
            last_transition: None,
        }
    }

    /// Load into standby, then swap. On failure the active slot is left
    /// as it was.
    pub fn present(
        &mut self,
        html: &str,
        base_url: &str,
        transition: Transition,
    ) -> Result<(), SurfaceError> {
        if let Err(e) = self.standby.load_html(html, base_url) {
            self.standby.clear();
            return Err(e);
        }
        mem::swap(&mut self.active, &mut self.standby);
        self.standby.clear();
        self.last_transition = Some(transition);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.standby.clear();
        self.last_transition = None;
    }

    pub fn active(&self) -> &S {
        &self.active
    }

    pub fn scroll_active(&mut self, fraction: f32) {
        self.active.scroll_to(fraction);
    }

    pub fn standby(&self) -> &S {
        &self.standby
    }

    pub fn last_transition(&self) -> Option<Transition> {
        self.last_transition
    }
}

impl<S: DisplaySurface + Default> Default for SurfacePair<S> {
    fn default() -> Self {
        Self::new(S::default(), S::default())
    }
}
