//! Per-category "soon" and "now" alert loops with start/stop/restart control.

mod scheduler;

pub use scheduler::{deliver, persist_category, AlertLoops, LoopCtx, LoopHandle};
