//! Services separating file and progress concerns from the metric core

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{BatchProgress, NoOpProgressReporter, ProgressReporter};
