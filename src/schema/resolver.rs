//! Lease-counted schema lifecycle.
//!
//! The resolver keeps the loaded [`SchemaSet`] behind a `watch` channel and
//! runs one background task that is the only writer. The task wakes on
//! [`Notify`] whenever usage crosses zero, the keep-loaded flag changes, a
//! document is added or removed, or shutdown is requested.
//!
//! - keep-loaded on: the set is loaded once and stays loaded.
//! - keep-loaded off: the set is dropped as soon as the last
//!   [`SchemaLease`] is released and loaded again on the next lease.
//!
//! Readers hold `Arc<SchemaSet>` snapshots, so a swap never exposes a
//! partially built set.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use super::parser::{MibModule, parse_module};
use super::set::SchemaSet;
use super::standard::standard_modules;
use super::store::DocumentStore;
use crate::error::Result;
use crate::oid::Oid;
use crate::util;

/// Load state published by the lifecycle task.
#[derive(Debug, Clone, Default)]
pub enum SchemaState {
    #[default]
    Unloaded,
    Loading,
    Loaded(Arc<SchemaSet>),
}

impl SchemaState {
    /// The loaded set, if any.
    pub fn set(&self) -> Option<&Arc<SchemaSet>> {
        match self {
            SchemaState::Loaded(set) => Some(set),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, SchemaState::Loaded(_))
    }
}

#[derive(Debug)]
enum Change {
    Added(String),
    Removed(String),
}

struct Inner {
    store: DocumentStore,
    standard: Vec<Arc<MibModule>>,
    usage: AtomicUsize,
    keep_loaded: AtomicBool,
    wake: Notify,
    state: watch::Sender<SchemaState>,
    pending: std::sync::Mutex<VecDeque<Change>>,
    shutdown: CancellationToken,
}

/// Owner of the schema set and its background lifecycle task.
///
/// Cloning is cheap and shares the same set.
#[derive(Clone)]
pub struct SchemaResolver {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver")
            .field("dir", &self.inner.store.dir())
            .field("usage", &self.inner.usage.load(Ordering::Relaxed))
            .field("keep_loaded", &self.keep_loaded())
            .field("loaded", &self.inner.state.borrow().is_loaded())
            .finish()
    }
}

impl SchemaResolver {
    /// Create a resolver over `store` and spawn its lifecycle task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(store: DocumentStore, keep_loaded: bool) -> Self {
        let (state, _) = watch::channel(SchemaState::Unloaded);
        let inner = Arc::new(Inner {
            store,
            standard: standard_modules(),
            usage: AtomicUsize::new(0),
            keep_loaded: AtomicBool::new(keep_loaded),
            wake: Notify::new(),
            state,
            pending: std::sync::Mutex::new(VecDeque::new()),
            shutdown: CancellationToken::new(),
        });
        tokio::spawn(run(inner.clone()));
        Self { inner }
    }

    /// Register a user of the schema set.
    ///
    /// The set is (re)loaded while at least one lease is alive.
    pub fn lease(&self) -> SchemaLease {
        if self.inner.usage.fetch_add(1, Ordering::AcqRel) == 0 {
            self.inner.wake.notify_one();
        }
        SchemaLease {
            inner: self.inner.clone(),
        }
    }

    /// Number of live leases.
    pub fn usage(&self) -> usize {
        self.inner.usage.load(Ordering::Acquire)
    }

    /// Persist a document and queue it for merging.
    ///
    /// The document is merged into the loaded set by the lifecycle task, or
    /// picked up on the next load. Returns the module name.
    ///
    /// # Errors
    ///
    /// Documents that are empty after leading comments, or whose name is not
    /// a plain file name, are rejected before anything is written.
    pub fn add_document(&self, text: &str) -> Result<String> {
        // Saved under the queue lock so file operations keep submission order
        let mut pending = util::lock(&self.inner.pending);
        let name = self.inner.store.save(text)?;
        pending.push_back(Change::Added(name.clone()));
        drop(pending);
        self.inner.wake.notify_one();
        Ok(name)
    }

    /// Queue a document for unloading and deletion from storage.
    pub fn remove_document(&self, name: &str) {
        self.push(Change::Removed(name.to_string()));
    }

    /// Names of the stored user documents.
    pub fn documents(&self) -> Result<Vec<String>> {
        self.inner.store.list()
    }

    pub fn set_keep_loaded(&self, keep: bool) {
        if self.inner.keep_loaded.swap(keep, Ordering::AcqRel) != keep {
            tracing::debug!(keep_loaded = keep, "schema keep-loaded changed");
            self.inner.wake.notify_one();
        }
    }

    pub fn keep_loaded(&self) -> bool {
        self.inner.keep_loaded.load(Ordering::Acquire)
    }

    /// Current load state.
    pub fn state(&self) -> SchemaState {
        self.inner.state.borrow().clone()
    }

    /// Watch load state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchemaState> {
        self.inner.state.subscribe()
    }

    /// The loaded set, without waiting.
    pub fn current(&self) -> Option<Arc<SchemaSet>> {
        self.inner.state.borrow().set().cloned()
    }

    /// Resolve against the loaded set; dotted form when nothing is loaded.
    pub fn resolve(&self, oid: &Oid) -> String {
        match self.current() {
            Some(set) => set.resolve(oid),
            None => oid.to_string(),
        }
    }

    /// Stop the lifecycle task. The current state is left as is.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    fn push(&self, change: Change) {
        util::lock(&self.inner.pending).push_back(change);
        self.inner.wake.notify_one();
    }
}

/// RAII usage token for the schema set.
///
/// Dropping the last lease lets the set unload when keep-loaded is off.
pub struct SchemaLease {
    inner: Arc<Inner>,
}

impl SchemaLease {
    /// Wait up to `wait` for a loaded set.
    ///
    /// Returns `None` on timeout or if the lifecycle task has stopped.
    pub async fn schema(&self, wait: Duration) -> Option<Arc<SchemaSet>> {
        let mut rx = self.inner.state.subscribe();
        let loaded = tokio::time::timeout(wait, rx.wait_for(SchemaState::is_loaded)).await;
        match loaded {
            Ok(Ok(state)) => state.set().cloned(),
            _ => None,
        }
    }

    /// The loaded set, without waiting.
    pub fn current(&self) -> Option<Arc<SchemaSet>> {
        self.inner.state.borrow().set().cloned()
    }
}

impl Drop for SchemaLease {
    fn drop(&mut self) {
        if self.inner.usage.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.wake.notify_one();
        }
    }
}

impl std::fmt::Debug for SchemaLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaLease").finish_non_exhaustive()
    }
}

async fn run(inner: Arc<Inner>) {
    tracing::debug!(dir = %inner.store.dir().display(), "schema lifecycle started");
    loop {
        step(&inner).await;
        tokio::select! {
            _ = inner.wake.notified() => {}
            _ = inner.shutdown.cancelled() => break,
        }
    }
    tracing::debug!("schema lifecycle stopped");
}

async fn step(inner: &Arc<Inner>) {
    let changes: Vec<Change> = {
        let mut pending = util::lock(&inner.pending);
        let changes: Vec<Change> = pending.drain(..).collect();

        // Files go first so a following load sees the final directory. A
        // removal followed by a re-add of the same name keeps the new file.
        for (i, change) in changes.iter().enumerate() {
            if let Change::Removed(name) = change
                && !superseded(&changes[i + 1..], name)
                && let Err(e) = inner.store.delete(name)
            {
                tracing::warn!(schema.document = %name, error = %e, "failed to delete schema document");
            }
        }
        changes
    };

    let wanted = inner.keep_loaded.load(Ordering::Acquire) || inner.usage.load(Ordering::Acquire) > 0;
    let current = inner.state.borrow().set().cloned();

    match (wanted, current) {
        (true, None) => {
            inner.state.send_replace(SchemaState::Loading);
            let task_inner = inner.clone();
            match tokio::task::spawn_blocking(move || load(&task_inner)).await {
                Ok(set) => {
                    tracing::debug!(symbols = set.len(), "schema set loaded");
                    inner.state.send_replace(SchemaState::Loaded(Arc::new(set)));
                }
                Err(e) => {
                    tracing::error!(error = %e, "schema load task failed");
                    inner.state.send_replace(SchemaState::Unloaded);
                }
            }
        }
        (false, Some(_)) => {
            tracing::debug!("schema set unloaded");
            inner.state.send_replace(SchemaState::Unloaded);
        }
        (true, Some(set)) if !changes.is_empty() => {
            let task_inner = inner.clone();
            match tokio::task::spawn_blocking(move || merge(&task_inner, &set, &changes)).await {
                Ok(merged) => {
                    tracing::debug!(symbols = merged.len(), "schema changes merged");
                    inner.state.send_replace(SchemaState::Loaded(Arc::new(merged)));
                }
                Err(e) => tracing::error!(error = %e, "schema merge task failed"),
            }
        }
        _ => {}
    }

    // Usage or the flag may have moved while loading
    let wanted = inner.keep_loaded.load(Ordering::Acquire) || inner.usage.load(Ordering::Acquire) > 0;
    if wanted != inner.state.borrow().is_loaded() {
        inner.wake.notify_one();
    }
}

/// Standard modules followed by every readable stored document.
fn load(inner: &Inner) -> SchemaSet {
    let mut modules = inner.standard.clone();
    match inner.store.list() {
        Ok(names) => {
            for name in names {
                if let Some(module) = read_module(&inner.store, &name) {
                    modules.push(module);
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to list schema documents"),
    }
    SchemaSet::from_shared(modules)
}

/// Rebuild `set` with `changes` applied.
fn merge(inner: &Inner, set: &SchemaSet, changes: &[Change]) -> SchemaSet {
    let touched: HashSet<&str> = changes
        .iter()
        .map(|c| match c {
            Change::Added(name) | Change::Removed(name) => name.as_str(),
        })
        .collect();

    let mut modules: Vec<Arc<MibModule>> = set
        .modules()
        .iter()
        .filter(|m| {
            inner.standard.iter().any(|s| Arc::ptr_eq(s, m)) || !touched.contains(m.name.as_str())
        })
        .cloned()
        .collect();

    // Only the last change per name counts
    for (i, change) in changes.iter().enumerate() {
        let Change::Added(name) = change else { continue };
        if superseded(&changes[i + 1..], name) {
            continue;
        }
        if let Some(module) = read_module(&inner.store, name) {
            modules.push(module);
        }
    }

    SchemaSet::from_shared(modules)
}

fn superseded(later: &[Change], name: &str) -> bool {
    later.iter().any(|change| match change {
        Change::Added(n) | Change::Removed(n) => n == name,
    })
}

fn read_module(store: &DocumentStore, name: &str) -> Option<Arc<MibModule>> {
    match store.read(name).and_then(|text| parse_module(&text)) {
        Ok(module) => Some(Arc::new(module)),
        Err(e) => {
            tracing::warn!(schema.document = %name, error = %e, "schema document skipped");
            None
        }
    }
}
