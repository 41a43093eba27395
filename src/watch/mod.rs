//! Change detection for the state record.
//!
//! [`ChangeDetector`] owns one [`ChangeSource`]: native filesystem
//! notifications when the host supports them, fixed-interval polling
//! otherwise. Downstream code only sees parsed records.

mod detector;
mod source;

pub use detector::{ChangeDetector, DetectorOptions, WatcherMode};
pub use source::{ChangeSource, NativeSource, PollingSource, SourceKind, SourceSignal};
