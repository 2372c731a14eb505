// src/progress.rs
/// Lightweight progress reporting for long-running stages (scrape, review repair).
/// Frontends implement this to surface status to users.
pub trait Progress {
    /// Called when a stage starts, with the number of items it will touch (if known).
    fn begin(&mut self, _stage: &str, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// One record finished; `found` is how many reviews it gained.
    fn item_done(&mut self, _index: usize, _title: &str, _found: usize) {}

    /// One record could not be repaired.
    fn item_failed(&mut self, _index: usize, _title: &str) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}
