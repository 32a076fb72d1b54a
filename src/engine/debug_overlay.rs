// Debug line sink. The simulation pushes line requests here every step;
// whatever front end is attached drains and renders them. Nothing in the
// core ever reads a line back, so this is purely observational.

use glam::Vec3;

/// One requested line: two world points plus a style index the renderer
/// maps to a material/color however it likes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    pub style: usize,
    pub start: Vec3,
    pub end: Vec3,
}

#[derive(Debug, Default)]
pub struct DebugLines {
    enabled: bool,
    lines: Vec<DebugLine>,
}

impl DebugLines {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            lines: Vec::new(),
        }
    }

    /// Flip collection on or off. Requests made while disabled are dropped
    /// at the call site rather than buffered.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.lines.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn request(&mut self, style: usize, start: Vec3, end: Vec3) {
        if self.enabled {
            self.lines.push(DebugLine { style, start, end });
        }
    }

    /// Hand the buffered lines to the caller and clear the buffer.
    pub fn drain(&mut self) -> Vec<DebugLine> {
        std::mem::take(&mut self.lines)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
