use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SkillViewError};
use crate::execution::StateRecord;

use super::source::{ChangeSource, NativeSource, PollingSource, SourceKind, SourceSignal};

/// Which change source the detector starts with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherMode {
    /// Native notifications, falling back to polling when unavailable.
    #[default]
    Auto,
    /// Native notifications only; start fails when unavailable.
    Native,
    Polling,
}

impl FromStr for WatcherMode {
    type Err = SkillViewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "native" => Ok(Self::Native),
            "polling" | "poll" => Ok(Self::Polling),
            other => Err(SkillViewError::Config(format!(
                "unknown watcher mode: {other} (expected auto, native or polling)"
            ))),
        }
    }
}

impl fmt::Display for WatcherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Native => "native",
            Self::Polling => "polling",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorOptions {
    pub mode: WatcherMode,
    pub poll_interval: Duration,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            mode: WatcherMode::Auto,
            poll_interval: PollingSource::DEFAULT_INTERVAL,
        }
    }
}

/// Modifications closer than this to the read that saw them are rechecked by
/// content, since mtime granularity can hide a second same-length write.
const RACY_WINDOW: Duration = Duration::from_secs(2);

/// What was last successfully read. Size joins the timestamp because some
/// filesystems only keep second-resolution mtimes; the digest settles the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
    digest: [u8; 32],
    read_at: SystemTime,
}

impl Fingerprint {
    fn of(metadata: &fs::Metadata, raw: &str) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
            digest: Sha256::digest(raw.as_bytes()).into(),
            read_at: SystemTime::now(),
        }
    }

    /// Metadata alone says nothing changed, and the last read came well after
    /// the modification it saw.
    fn settles(&self, metadata: &fs::Metadata) -> bool {
        let modified = metadata.modified().ok();
        if self.modified != modified || self.len != metadata.len() {
            return false;
        }
        modified.is_some_and(|modified| {
            self.read_at
                .duration_since(modified)
                .is_ok_and(|gap| gap >= RACY_WINDOW)
        })
    }
}

/// Watches the state record and hands back each new, parseable version of it.
pub struct ChangeDetector {
    path: PathBuf,
    options: DetectorOptions,
    source: Option<Box<dyn ChangeSource>>,
    last_seen: Option<Fingerprint>,
}

impl fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("source", &self.source_kind())
            .finish_non_exhaustive()
    }
}

impl ChangeDetector {
    /// Ensure the record's directory exists, then start the configured source.
    pub fn start(path: impl Into<PathBuf>, options: DetectorOptions) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let source = select_source(&path, options)?;
        info!(
            target: "watch",
            path = %path.display(),
            source = %source.kind(),
            "watching state record"
        );
        Ok(Self {
            path,
            options,
            source: Some(source),
            last_seen: None,
        })
    }

    /// Detector driven by an explicit source.
    pub fn with_source(path: impl Into<PathBuf>, source: Box<dyn ChangeSource>) -> Self {
        Self {
            path: path.into(),
            options: DetectorOptions::default(),
            source: Some(source),
            last_seen: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.source.as_ref().map(|source| source.kind())
    }

    pub const fn is_disposed(&self) -> bool {
        self.source.is_none()
    }

    /// Wait up to `timeout` for the record to change and parse.
    pub fn next_change(&mut self, timeout: Duration) -> Option<StateRecord> {
        let signal = self.source.as_mut()?.wait(timeout);
        match signal {
            SourceSignal::Idle => None,
            SourceSignal::Changed => self.read_if_changed(),
            SourceSignal::Failed(reason) => {
                warn!(target: "watch", %reason, "native watcher failed; switching to polling");
                self.replace_source(Box::new(PollingSource::new(self.options.poll_interval)));
                self.read_if_changed()
            }
        }
    }

    /// Read the record if it differs from the last good read.
    ///
    /// A missing file or unparsable content yields `None` and leaves the last
    /// good fingerprint in place, so the same content is retried next time.
    pub fn read_if_changed(&mut self) -> Option<StateRecord> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                trace!(target: "watch", "state record absent");
                return None;
            }
            Err(err) => {
                debug!(target: "watch", error = %err, "state record metadata unavailable");
                return None;
            }
        };
        if self.last_seen.is_some_and(|seen| seen.settles(&metadata)) {
            trace!(target: "watch", "state record unchanged");
            return None;
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(target: "watch", error = %err, "state record read failed; will retry");
                return None;
            }
        };
        let fingerprint = Fingerprint::of(&metadata, &raw);
        if self.last_seen.is_some_and(|seen| seen.digest == fingerprint.digest) {
            trace!(target: "watch", "state record content unchanged");
            self.last_seen = Some(fingerprint);
            return None;
        }
        match StateRecord::parse(&raw) {
            Ok(record) => {
                self.last_seen = Some(fingerprint);
                Some(record)
            }
            Err(err) => {
                debug!(target: "watch", error = %err, "state record not parseable yet; will retry");
                None
            }
        }
    }

    /// Forget the last read so the next read is always processed.
    pub fn invalidate(&mut self) {
        self.last_seen = None;
    }

    fn replace_source(&mut self, source: Box<dyn ChangeSource>) {
        if let Some(mut old) = self.source.replace(source) {
            old.stop();
        }
    }

    /// Stop the change source. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            debug!(target: "watch", path = %self.path.display(), "detector disposed");
        }
    }
}

impl Drop for ChangeDetector {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn select_source(path: &Path, options: DetectorOptions) -> Result<Box<dyn ChangeSource>> {
    match options.mode {
        WatcherMode::Polling => Ok(Box::new(PollingSource::new(options.poll_interval))),
        WatcherMode::Native => Ok(Box::new(NativeSource::start(path)?)),
        WatcherMode::Auto => match NativeSource::start(path) {
            Ok(native) => Ok(Box::new(native)),
            Err(err) => {
                warn!(
                    target: "watch",
                    error = %err,
                    "native notifications unavailable; polling instead"
                );
                Ok(Box::new(PollingSource::new(options.poll_interval)))
            }
        },
    }
}
