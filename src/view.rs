use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{AddInRegistry, PackageCache, PackageFeed};
use crate::error::Diagnostic;
use crate::models::{AddInPackage, GalleryMode, OverlayFlags, RemotePackage};
use crate::reconcile::{reconcile, Reconciliation};

/// Stamped result of one background refresh.
#[derive(Debug)]
struct RefreshUpdate {
    generation: u64,
    outcome: Reconciliation,
}

/// Owns the gallery's presentation state and coordinates refreshes.
///
/// A refresh queries every configured feed off the caller's context and runs
/// the reconciliation there; the stamped result comes back over a channel
/// and is applied by [`AddInGallery::process_updates`] on the owning
/// context. Only that method writes `records`, so readers never observe a
/// half-applied refresh.
pub struct AddInGallery {
    pub mode: GalleryMode,
    pub search_terms: String,
    /// Full reconciled list, one record per surviving identity
    pub records: Vec<AddInPackage>,
    /// `records` narrowed to the current mode
    pub visible: Vec<AddInPackage>,
    pub diagnostics: Vec<Diagnostic>,
    pub status_message: String,
    pub loading: bool,
    /// Incremented on each refresh; stale results are discarded
    generation: u64,
    overlays: HashMap<String, OverlayFlags>,
    feeds: Vec<Arc<dyn PackageFeed>>,
    registry: Arc<dyn AddInRegistry>,
    cache: Arc<dyn PackageCache>,
    update_tx: tokio::sync::mpsc::UnboundedSender<RefreshUpdate>,
    update_rx: tokio::sync::mpsc::UnboundedReceiver<RefreshUpdate>,
}

impl AddInGallery {
    pub fn new(
        feeds: Vec<Arc<dyn PackageFeed>>,
        registry: Arc<dyn AddInRegistry>,
        cache: Arc<dyn PackageCache>,
    ) -> Self {
        let (update_tx, update_rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            mode: GalleryMode::Available,
            search_terms: String::new(),
            records: Vec::new(),
            visible: Vec::new(),
            diagnostics: Vec::new(),
            status_message: "Loading...".to_string(),
            loading: false,
            generation: 0,
            overlays: HashMap::new(),
            feeds,
            registry,
            cache,
            update_tx,
            update_rx,
        }
    }

    pub fn set_search_terms(&mut self, terms: impl Into<String>) {
        self.search_terms = terms.into();
    }

    /// Mode changes re-slice the existing records; no feed round-trip.
    pub fn set_mode(&mut self, mode: GalleryMode) {
        self.mode = mode;
        self.apply_mode_filter();
    }

    /// Marks an install as staged for this identity. Overlays are stamped
    /// onto records on the next refresh; records are never patched in place.
    pub fn stage_install(&mut self, id: &str) {
        self.overlays.entry(id.to_string()).or_default().is_added = true;
    }

    /// Marks a removal as staged for this identity.
    pub fn stage_removal(&mut self, id: &str) {
        self.overlays.entry(id.to_string()).or_default().is_removed = true;
    }

    /// Replaces the whole overlay for an identity (offline add-ins, external
    /// feed links and the like, as tracked by the session).
    pub fn set_overlay(&mut self, id: &str, flags: OverlayFlags) {
        self.overlays.insert(id.to_string(), flags);
    }

    pub fn clear_staged(&mut self, id: &str) {
        self.overlays.remove(id);
    }

    /// Starts a background refresh. Inputs are captured now; a refresh
    /// started later supersedes this one, its result is discarded unseen.
    pub fn refresh(&mut self) {
        self.generation += 1;
        self.loading = true;
        let generation = self.generation;
        let feeds = self.feeds.clone();
        let registry = self.registry.clone();
        let cache = self.cache.clone();
        let overlays = self.overlays.clone();
        let search_terms = self.search_terms.clone();
        let tx = self.update_tx.clone();

        tokio::spawn(async move {
            let outcome = run_refresh(&feeds, &search_terms, registry, cache, &overlays).await;
            let _ = tx.send(RefreshUpdate {
                generation,
                outcome,
            });
        });
    }

    /// Drains finished refreshes. Call from the context that owns the
    /// presentation state.
    pub fn process_updates(&mut self) {
        while let Ok(update) = self.update_rx.try_recv() {
            self.apply_update(update);
        }
    }

    /// Refreshes and applies the result before returning, discarding any
    /// stale update drained along the way.
    pub async fn refresh_and_wait(&mut self) {
        self.refresh();
        let awaited = self.generation;
        // The channel never closes while the gallery holds its own sender
        while let Some(update) = self.update_rx.recv().await {
            let done = update.generation >= awaited;
            self.apply_update(update);
            if done {
                break;
            }
        }
    }

    fn apply_update(&mut self, update: RefreshUpdate) {
        // Discard results from a superseded refresh
        if update.generation < self.generation {
            debug!(
                generation = update.generation,
                current = self.generation,
                "dropping stale refresh result"
            );
            return;
        }
        self.records = update.outcome.records;
        self.diagnostics = update.outcome.diagnostics;
        self.apply_mode_filter();
        self.loading = false;

        let count = self.visible.len();
        self.status_message = format!(
            "{count} add-in{} found",
            if count == 1 { "" } else { "s" }
        );
        if self.diagnostics.iter().any(Diagnostic::is_feed_unavailable) {
            self.status_message.push_str(" (some sources unavailable)");
        }
    }

    fn apply_mode_filter(&mut self) {
        self.visible = match self.mode {
            GalleryMode::Available => self.records.clone(),
            GalleryMode::Installed => self
                .records
                .iter()
                .filter(|r| r.is_installed)
                .cloned()
                .collect(),
            GalleryMode::Updates => self
                .records
                .iter()
                .filter(|r| r.is_update)
                .cloned()
                .collect(),
        };
    }
}

/// Queries every feed in configured order, then reconciles. A failing feed
/// contributes a diagnostic and zero packages; the others still count.
async fn run_refresh(
    feeds: &[Arc<dyn PackageFeed>],
    search_terms: &str,
    registry: Arc<dyn AddInRegistry>,
    cache: Arc<dyn PackageCache>,
    overlays: &HashMap<String, OverlayFlags>,
) -> Reconciliation {
    debug!(feeds = feeds.len(), "refreshing add-in gallery");

    let mut remote: Vec<RemotePackage> = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    for feed in feeds {
        match feed.query().await {
            Ok(packages) => {
                remote.extend(packages.into_iter().map(|mut pkg| {
                    if pkg.source.is_empty() {
                        pkg.source = feed.source().to_string();
                    }
                    pkg
                }));
            }
            Err(err) => {
                warn!(source = feed.source(), error = %err, "feed unavailable");
                diagnostics.push(Diagnostic::FeedUnavailable {
                    feed: feed.source().to_string(),
                    reason: format!("{err:#}"),
                });
            }
        }
    }

    let mut outcome = reconcile(
        &remote,
        search_terms,
        registry.as_ref(),
        cache.as_ref(),
        overlays,
    );
    diagnostics.append(&mut outcome.diagnostics);
    outcome.diagnostics = diagnostics;
    outcome
}
