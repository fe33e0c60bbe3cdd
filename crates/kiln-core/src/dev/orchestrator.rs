//! Incremental rebuild state machine.
//!
//! ```text
//! Idle -> Building -> Ready  -> Idle
//!                  \-> Failed -> Idle
//! ```
//!
//! Ready and Failed last only until the pass result has been handed back;
//! [`DevSession::state`] is Idle again between passes, and
//! [`DevSession::last_pass`] keeps how the most recent pass ended.
//!
//! One batch of changes is processed at a time. A batch invalidates the
//! changed modules and everything that transitively imports them; every
//! other module is reused from the last good graph.

use super::hmr::HmrMessage;
use crate::bundler::{BuildError, BuildOutcome, Bundler, CancelToken, ModuleId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Quiet period after the last event before a batch is released.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Building,
    Ready,
    Failed,
}

/// Collects file events and releases them as one batch once events stop
/// arriving for [`COALESCE_WINDOW`].
#[derive(Debug, Clone)]
pub struct ChangeQueue {
    pending: BTreeSet<PathBuf>,
    last_event: Option<Instant>,
    window: Duration,
}

impl Default for ChangeQueue {
    fn default() -> Self {
        Self::new(COALESCE_WINDOW)
    }
}

impl ChangeQueue {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            pending: BTreeSet::new(),
            last_event: None,
            window,
        }
    }

    pub fn push(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path);
        self.last_event = Some(now);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// When the current batch becomes ready.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_event.map(|t| t + self.window)
    }

    /// Take the batch if the window has passed.
    pub fn take_ready(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.last_event = None;
                Some(std::mem::take(&mut self.pending).into_iter().collect())
            }
            _ => None,
        }
    }
}

/// The token of the pass currently running, shared with the watcher so a
/// new event can mark that pass stale.
#[derive(Debug, Clone, Default)]
pub struct CancelSlot(Arc<Mutex<CancelToken>>);

impl CancelSlot {
    /// Cancel whatever pass is running.
    pub fn cancel_current(&self) {
        if let Ok(token) = self.0.lock() {
            token.cancel();
        }
    }

    fn fresh(&self) -> CancelToken {
        let token = CancelToken::new();
        if let Ok(mut slot) = self.0.lock() {
            *slot = token.clone();
        }
        token
    }
}

/// Result of one pass, as the server needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassResult {
    /// The pass succeeded; `changed` lists output files whose hash changed.
    Ready { changed: Vec<String> },
    /// The pass failed; the previous output is still in place.
    Failed {
        code: &'static str,
        message: String,
        path: Option<PathBuf>,
        stage: Option<String>,
    },
    /// A newer change arrived; the batch is carried into the next pass.
    Cancelled,
    /// No module of the graph was affected.
    Skipped,
}

impl PassResult {
    /// What to push to clients, if anything.
    #[must_use]
    pub fn message(&self) -> Option<HmrMessage> {
        match self {
            Self::Ready { changed } if !changed.is_empty() => Some(HmrMessage::Update {
                chunks: changed.clone(),
            }),
            Self::Failed { code, message, .. } => Some(HmrMessage::Error {
                message: format!("{code}: {message}"),
            }),
            Self::Ready { .. } | Self::Cancelled | Self::Skipped => None,
        }
    }

    fn from_error(err: &BuildError) -> Self {
        Self::Failed {
            code: err.code(),
            message: err.to_string(),
            path: err.path().map(Path::to_path_buf),
            stage: err.stage().map(str::to_string),
        }
    }
}

/// A watch session over one [`Bundler`].
pub struct DevSession {
    bundler: Bundler,
    state: SessionState,
    last_pass: Option<SessionState>,
    last_good: Option<BuildOutcome>,
    file_hashes: BTreeMap<String, String>,
    /// Rebuild everything on the next pass (after a failure).
    needs_full: bool,
    /// Changes of a cancelled pass, merged into the next one.
    carried: BTreeSet<PathBuf>,
    cancel: CancelSlot,
}

impl DevSession {
    #[must_use]
    pub fn new(bundler: Bundler) -> Self {
        Self {
            bundler,
            state: SessionState::Idle,
            last_pass: None,
            last_good: None,
            file_hashes: BTreeMap::new(),
            needs_full: true,
            carried: BTreeSet::new(),
            cancel: CancelSlot::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Ready or Failed for the most recent completed pass.
    #[must_use]
    pub fn last_pass(&self) -> Option<SessionState> {
        self.last_pass
    }

    #[must_use]
    pub fn bundler(&self) -> &Bundler {
        &self.bundler
    }

    /// The last successful build.
    #[must_use]
    pub fn last_good(&self) -> Option<&BuildOutcome> {
        self.last_good.as_ref()
    }

    /// Handle for marking the running pass stale.
    #[must_use]
    pub fn cancel_slot(&self) -> CancelSlot {
        self.cancel.clone()
    }

    /// Full build, used at startup.
    pub fn start(&mut self) -> PassResult {
        self.needs_full = true;
        self.pass(BTreeSet::new())
    }

    /// Rebuild for a batch of changed files.
    pub fn on_change(&mut self, changed: Vec<PathBuf>) -> PassResult {
        let mut batch = std::mem::take(&mut self.carried);
        batch.extend(changed);
        self.pass(batch)
    }

    /// Modules affected by changed files: each changed module plus all of
    /// its transitive importers. `None` means a full rebuild.
    #[must_use]
    pub fn invalidation(&self, changed: &BTreeSet<PathBuf>) -> Option<BTreeSet<ModuleId>> {
        if self.needs_full {
            return None;
        }
        let graph = &self.last_good.as_ref()?.graph;
        let ids: Vec<ModuleId> = changed
            .iter()
            .filter_map(|path| {
                let path = dunce::canonicalize(path).unwrap_or_else(|_| path.clone());
                graph.find_by_path(&path).cloned()
            })
            .collect();
        Some(graph.transitive_dependents(ids.iter()))
    }

    fn pass(&mut self, changed: BTreeSet<PathBuf>) -> PassResult {
        let result = self.run_pass(changed);
        match &result {
            PassResult::Ready { .. } => self.last_pass = Some(SessionState::Ready),
            PassResult::Failed { .. } => self.last_pass = Some(SessionState::Failed),
            PassResult::Cancelled | PassResult::Skipped => {}
        }
        self.state = SessionState::Idle;
        result
    }

    fn run_pass(&mut self, changed: BTreeSet<PathBuf>) -> PassResult {
        let invalidated = self.invalidation(&changed);
        if matches!(&invalidated, Some(ids) if ids.is_empty()) {
            tracing::debug!(files = changed.len(), "change outside the module graph");
            return PassResult::Skipped;
        }

        self.state = SessionState::Building;
        let cancel = self.cancel.fresh();
        let _span = tracing::info_span!("dev_pass", files = changed.len(), full = invalidated.is_none()).entered();

        let result = match (&invalidated, &self.last_good) {
            (Some(ids), Some(previous)) => {
                tracing::debug!(modules = ids.len(), "invalidated");
                self.bundler.rebuild(&previous.graph, ids, &cancel)
            }
            _ => self.bundler.build_cancellable(&cancel),
        };

        match result {
            Ok(outcome) => {
                let hashes = outcome.compilation.file_hashes();
                let changed_files: Vec<String> = hashes
                    .iter()
                    .filter(|(name, hash)| self.file_hashes.get(*name) != Some(*hash))
                    .map(|(name, _)| name.clone())
                    .collect();
                tracing::info!(
                    rebuilt = outcome.report.rebuilt.len(),
                    reused = outcome.report.reused,
                    changed = changed_files.len(),
                    "ready"
                );
                self.file_hashes = hashes;
                self.last_good = Some(outcome);
                self.needs_full = false;
                PassResult::Ready { changed: changed_files }
            }
            Err(BuildError::Cancelled) => {
                self.carried.extend(changed);
                PassResult::Cancelled
            }
            Err(err) => {
                tracing::error!(code = err.code(), error = %err, "rebuild failed, keeping previous output");
                self.needs_full = true;
                PassResult::from_error(&err)
            }
        }
    }
}
