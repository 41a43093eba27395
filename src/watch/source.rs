//! Interchangeable change sources behind the detector.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, trace, warn};

use crate::error::{Result, SkillViewError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Native,
    Polling,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Polling => "polling",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSignal {
    /// The record may have changed; the detector decides whether it did.
    Changed,
    /// Nothing happened within the timeout.
    Idle,
    /// The source stopped working and should be replaced.
    Failed(String),
}

/// Something that tells the detector when to look at the record again.
pub trait ChangeSource {
    fn kind(&self) -> SourceKind;

    /// Block for at most `timeout` waiting for a signal.
    fn wait(&mut self, timeout: Duration) -> SourceSignal;

    /// Release the underlying mechanism. Safe to call more than once.
    fn stop(&mut self);
}

/// Filesystem notifications on the record's directory, filtered to its file name.
///
/// Watching the directory rather than the file keeps working across
/// write-to-temp-then-rename replacements.
pub struct NativeSource {
    watcher: Option<RecommendedWatcher>,
    signals: Receiver<SourceSignal>,
}

impl NativeSource {
    pub fn start(record_path: &Path) -> Result<Self> {
        let directory = record_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = record_path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| {
                SkillViewError::Watch(format!("{} has no file name", record_path.display()))
            })?;

        let (tx, rx) = unbounded();
        let mut watcher = notify::recommended_watcher(event_handler(tx, file_name))
            .map_err(|err| SkillViewError::Watch(format!("create watcher: {err}")))?;
        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|err| {
                SkillViewError::Watch(format!("watch {}: {err}", directory.display()))
            })?;
        debug!(target: "watch", dir = %directory.display(), "native watcher started");

        Ok(Self {
            watcher: Some(watcher),
            signals: rx,
        })
    }
}

fn event_handler(
    tx: Sender<SourceSignal>,
    file_name: OsString,
) -> impl Fn(notify::Result<Event>) + Send + 'static {
    move |result: notify::Result<Event>| {
        let signal = match result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                let ours = event
                    .paths
                    .iter()
                    .any(|path| path.file_name() == Some(file_name.as_os_str()));
                if !ours {
                    return;
                }
                trace!(target: "watch", kind = ?event.kind, "record touched");
                SourceSignal::Changed
            }
            Err(err) => SourceSignal::Failed(err.to_string()),
        };
        // The receiver is gone once the source is dropped.
        let _ = tx.send(signal);
    }
}

impl ChangeSource for NativeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Native
    }

    fn wait(&mut self, timeout: Duration) -> SourceSignal {
        if self.watcher.is_none() {
            thread::sleep(timeout);
            return SourceSignal::Idle;
        }
        match self.signals.recv_timeout(timeout) {
            Ok(SourceSignal::Changed) => {
                // Coalesce a burst of notifications into one read.
                let mut signal = SourceSignal::Changed;
                while let Ok(next) = self.signals.try_recv() {
                    if let SourceSignal::Failed(_) = next {
                        signal = next;
                        break;
                    }
                }
                signal
            }
            Ok(other) => other,
            Err(RecvTimeoutError::Timeout) => SourceSignal::Idle,
            Err(RecvTimeoutError::Disconnected) => {
                SourceSignal::Failed("watcher channel closed".to_string())
            }
        }
    }

    fn stop(&mut self) {
        if self.watcher.take().is_some() {
            debug!(target: "watch", "native watcher stopped");
        }
    }
}

/// Fixed-interval polling. Every tick reports a possible change.
pub struct PollingSource {
    interval: Duration,
    next_tick: Instant,
    stopped: bool,
}

impl PollingSource {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!(target: "watch", "zero poll interval; using the default");
            Self::DEFAULT_INTERVAL
        } else {
            interval
        };
        Self {
            interval,
            next_tick: Instant::now() + interval,
            stopped: false,
        }
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl ChangeSource for PollingSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Polling
    }

    fn wait(&mut self, timeout: Duration) -> SourceSignal {
        if self.stopped {
            thread::sleep(timeout);
            return SourceSignal::Idle;
        }
        let now = Instant::now();
        let remaining = self.next_tick.saturating_duration_since(now);
        if remaining > timeout {
            thread::sleep(timeout);
            return SourceSignal::Idle;
        }
        thread::sleep(remaining);
        self.next_tick = Instant::now() + self.interval;
        SourceSignal::Changed
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
