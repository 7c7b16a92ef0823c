//! The streaming pull protocol: interprets the server's progress records,
//! tracks download phases, accumulates the status transcript, renders
//! progress in verbose mode, and enforces the overall timeout.
//!
//! All state lives in a [`PullSession`] owned by a single in-flight call, so
//! concurrent pulls never share anything.

mod progress;

use std::io::{self, Write};
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt, pin_mut};
use tracing::{debug, warn};

use crate::errors::{OllamaError, PullError};
use crate::models::PullRecord;
use progress::{Palette, SPINNER_FRAMES, completion_line, download_line, manifest_line};

/// Default budget for one pull. Generous, since large models over slow
/// connections can legitimately take a day or more.
pub(crate) const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(48 * 60 * 60);

/// Status prefixes the server emits during a normal pull. Only consulted in
/// strict mode; by default unrecognized statuses are inert display text.
const KNOWN_STATUS_PREFIXES: [&str; 5] =
    ["pulling", "downloading", "verifying", "writing", "removing"];

fn is_known_status(status: &str) -> bool {
    status == "success" || KNOWN_STATUS_PREFIXES.iter().any(|prefix| status.starts_with(prefix))
}

/// Phase of an in-flight pull. The session only moves forward through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PullPhase {
    Init,
    Manifest,
    Downloading,
    Verifying,
    Done,
    Failed,
    TimedOut,
}

impl PullPhase {
    const fn rank(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Manifest => 1,
            Self::Downloading => 2,
            Self::Verifying => 3,
            Self::Done => 4,
            Self::Failed | Self::TimedOut => 5,
        }
    }
}

/// Phase suggested by a single record in isolation.
fn classify(record: &PullRecord) -> PullPhase {
    if record.total > 0 {
        PullPhase::Downloading
    } else if record.status.starts_with("verifying") || record.status.starts_with("writing") {
        PullPhase::Verifying
    } else {
        PullPhase::Manifest
    }
}

/// Remembers the digest of the layer currently being reported, to notice when
/// the server moves on to a new one.
#[derive(Debug, Default)]
struct DigestTracker {
    last_digest: Option<String>,
}

impl DigestTracker {
    /// True when a non-empty digest replaces a different non-empty one. The
    /// stored digest always becomes the current record's digest, so a
    /// digest-less record clears it.
    fn observe(&mut self, digest: Option<&str>) -> bool {
        let current = digest.filter(|d| !d.is_empty());
        let boundary = match (self.last_digest.as_deref(), current) {
            (Some(previous), Some(current)) => previous != current,
            _ => false,
        };
        self.last_digest = current.map(str::to_owned);
        boundary
    }
}

/// Display decision produced for one observed record.
#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    /// An in-place progress line; `line_break_before` marks a layer boundary,
    /// so verbose output starts a fresh line instead of overwriting.
    Progress { line: String, line_break_before: bool },
    /// The server reported success: show the completion line and stop reading.
    Complete { line: String },
}

/// Mutable state for one in-flight pull. Created per call, dropped when the
/// call returns.
#[derive(Debug)]
pub(crate) struct PullSession {
    model: String,
    verbose: bool,
    strict_statuses: bool,
    budget: Duration,
    started: Instant,
    phase: PullPhase,
    tracker: DigestTracker,
    spinner_position: usize,
    transcript: String,
    palette: Palette,
}

impl PullSession {
    pub(crate) fn new(
        model: impl Into<String>,
        verbose: bool,
        strict_statuses: bool,
        budget: Duration,
    ) -> Self {
        Self {
            model: model.into(),
            verbose,
            strict_statuses,
            budget,
            started: Instant::now(),
            phase: PullPhase::Init,
            tracker: DigestTracker::default(),
            spinner_position: 0,
            transcript: String::new(),
            palette: Palette::from_env(),
        }
    }

    fn advance(&mut self, next: PullPhase) {
        if next.rank() > self.phase.rank() {
            debug!("pull of {}: phase {:?} -> {:?}", self.model, self.phase, next);
            self.phase = next;
        }
    }

    /// Applies one record to the session: layer-boundary detection, the
    /// rendering decision, transcript accumulation, then the success, strict
    /// status, and timeout checks in that order. A success record always wins,
    /// even when the budget is already exhausted.
    pub(crate) fn observe(&mut self, record: &PullRecord) -> Result<Step, OllamaError> {
        let line_break_before = self.tracker.observe(record.digest.as_deref());

        let line = if record.total == 0 {
            let frame = SPINNER_FRAMES[self.spinner_position % SPINNER_FRAMES.len()];
            self.spinner_position += 1;
            manifest_line(&self.palette, frame)
        } else {
            download_line(
                &self.palette,
                &self.model,
                record.digest.as_deref().unwrap_or_default(),
                record.progress_percent().unwrap_or_default(),
                record.completed,
                record.total,
            )
        };

        self.transcript.push_str(&record.status);
        self.transcript.push('\n');

        if record.is_success() {
            self.advance(PullPhase::Done);
            return Ok(Step::Complete { line: completion_line(&self.model) });
        }

        self.advance(classify(record));

        if self.strict_statuses && !is_known_status(&record.status) {
            self.advance(PullPhase::Failed);
            warn!("pull of {}: unexpected status {:?}", self.model, record.status);
            return Err(OllamaError::UnexpectedStatus {
                model: self.model.clone(),
                status: record.status.clone(),
            });
        }

        if self.started.elapsed() > self.budget {
            self.advance(PullPhase::TimedOut);
            warn!("pull of {}: no success after {:?}", self.model, self.budget);
            return Err(OllamaError::PullTimedOut {
                model: self.model.clone(),
                budget: self.budget,
            });
        }

        Ok(Step::Progress { line, line_break_before })
    }
}

/// Drives a pull session over a decoded record stream until the server
/// reports success or the session fails.
///
/// Every failure carries the transcript accumulated so far: transport and
/// decode errors from the stream, the timeout, a strict-mode status, and a
/// stream that ends without ever reporting success.
pub(crate) async fn run_pull<S>(mut session: PullSession, records: S) -> Result<String, PullError>
where
    S: Stream<Item = Result<PullRecord, OllamaError>>,
{
    pin_mut!(records);
    while let Some(next) = records.next().await {
        let record = match next {
            Ok(record) => record,
            Err(e) => {
                session.advance(PullPhase::Failed);
                return Err(PullError::new(session.transcript, e));
            }
        };
        match session.observe(&record) {
            Ok(Step::Progress { line, line_break_before }) => {
                if session.verbose {
                    if line_break_before {
                        println!();
                    }
                    print!("{line}");
                    let _ = io::stdout().flush();
                }
            }
            Ok(Step::Complete { line }) => {
                if session.verbose {
                    print!("{line}");
                    let _ = io::stdout().flush();
                }
                return Ok(session.transcript);
            }
            Err(e) => return Err(PullError::new(session.transcript, e)),
        }
    }
    session.advance(PullPhase::Failed);
    warn!("pull of {}: stream ended before success", session.model);
    Err(PullError::new(
        session.transcript,
        OllamaError::MalformedResponse("pull stream ended before success".to_string()),
    ))
}
