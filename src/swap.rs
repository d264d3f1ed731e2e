/// Tracks which of the two generation slots is exposed for drawing.
///
/// The stepper reads `current()` and writes `next()`; the renderer only ever
/// reads `current()`. Both backends share this controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapController {
    current: usize,
}

impl SwapController {
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn next(&self) -> usize {
        1 - self.current
    }

    /// Called once per frame, right after a step completed.
    pub fn swap(&mut self) {
        self.current = self.next();
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}
