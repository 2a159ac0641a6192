//! Sync coordinator
//!
//! Owns the authoritative in-memory catalog document and mediates every
//! mutation through a change-tracking layer: local edits mark the document
//! dirty and bump a version counter, a debounced push writes the document
//! to the remote store after a quiet interval, and pulls (bootstrap, focus,
//! manual) replace the document only while no local edit is pending.
//!
//! Races are resolved without locking across I/O:
//! - a pull is skipped entirely while a push is pending or in flight;
//! - a push captures the document version at snapshot time and clears the
//!   dirty flag only if no mutation happened during the in-flight write;
//! - changing the group code bumps an epoch, so completions from a
//!   previous group are discarded instead of clobbering fresh state.

use crate::cache::{keys, LocalCache};
use crate::config::SyncConfig;
use crate::debounce::Debouncer;
use crate::error::{Result, SyncError};
use crate::group;
use crate::status::SyncStatus;
use crate::versioned::Versioned;
use mealbook_store_client::{
    CatalogDocument, CatalogRepository, CookbookEntry, LogEntry, Recipe, RestTransport,
    StoreError, TableTransport,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct Inner {
    document: Versioned<CatalogDocument>,
    /// Local mutations not yet confirmed written remotely
    dirty: bool,
    push_in_flight: bool,
    /// At least one successful pull completed for the current group.
    /// A push must never originate from the pre-bootstrap default document.
    bootstrapped: bool,
    status: SyncStatus,
    group_code: Option<String>,
    group_id: Option<String>,
    last_sync_at: Option<u64>,
    last_save_at: Option<u64>,
    /// Bumped on every group-code change; in-flight completions from a
    /// previous epoch are ignored
    epoch: u64,
}

/// Coordinates the local catalog copy with the remote store
pub struct SyncCoordinator {
    repo: CatalogRepository,
    cache: LocalCache,
    config: SyncConfig,
    inner: Mutex<Inner>,
    debouncer: Debouncer,
}

impl SyncCoordinator {
    /// Create a coordinator over an injected repository and cache.
    ///
    /// The cached document and group code are adopted immediately; call
    /// [`start`](Self::start) to run the initial bootstrap.
    pub fn new(repo: CatalogRepository, cache: LocalCache, config: SyncConfig) -> Arc<Self> {
        let document: CatalogDocument = cache.read(keys::CATALOG_DOCUMENT, CatalogDocument::default());
        let group_code: Option<String> = cache.read(keys::GROUP_CODE, None);

        let debouncer = Debouncer::new(Duration::from_millis(config.debounce_ms));
        Arc::new(Self {
            repo,
            cache,
            config,
            inner: Mutex::new(Inner {
                document: Versioned::new(document),
                dirty: false,
                push_in_flight: false,
                bootstrapped: false,
                status: SyncStatus::waiting(),
                group_code,
                group_id: None,
                last_sync_at: None,
                last_save_at: None,
                epoch: 0,
            }),
            debouncer,
        })
    }

    /// Convenience constructor wiring the HTTP transport from configuration
    pub fn from_config(config: SyncConfig) -> Arc<Self> {
        let transport: Arc<dyn TableTransport> =
            Arc::new(RestTransport::new(config.store_config()));
        let repo = CatalogRepository::new(transport);
        let cache = LocalCache::new(&config.cache_dir);
        Self::new(repo, cache, config)
    }

    /// Run the initial bootstrap if a group code was restored from cache
    pub async fn start(self: &Arc<Self>) {
        let epoch = {
            let mut inner = self.inner.lock().await;
            if inner.group_code.is_none() {
                inner.status = SyncStatus::waiting();
                return;
            }
            inner.status = SyncStatus::connecting();
            inner.epoch
        };
        self.bootstrap(epoch).await;
    }

    // ==================== Group lifecycle ====================

    /// Set or clear the active group code and re-bootstrap.
    ///
    /// Resets the pending-change state to a clean slate; any in-flight
    /// request from the previous code is orphaned via the epoch bump.
    pub async fn set_group_code(self: &Arc<Self>, code: Option<String>) {
        self.debouncer.cancel();
        let epoch = {
            let mut inner = self.inner.lock().await;
            inner.epoch += 1;
            inner.dirty = false;
            inner.push_in_flight = false;
            inner.bootstrapped = false;
            inner.group_id = None;
            inner.group_code = code.clone();
            match &code {
                Some(code) => {
                    self.cache.write(keys::GROUP_CODE, code);
                    inner.status = SyncStatus::connecting();
                }
                None => {
                    self.cache.remove(keys::GROUP_CODE);
                    inner.status = SyncStatus::waiting();
                }
            }
            inner.epoch
        };

        if code.is_some() {
            self.bootstrap(epoch).await;
        }
    }

    /// Create a new shared group with a fresh random code.
    ///
    /// Seeds the remote document with the current in-memory catalog when
    /// `duplicate` is set, otherwise with the empty default, then adopts
    /// the new code and bootstraps against it.
    pub async fn create_new_group(self: &Arc<Self>, name: &str, duplicate: bool) -> Result<String> {
        let code = group::generate_code();
        let created = self.repo.create_group(&code, name).await?;

        let seed = if duplicate {
            self.inner.lock().await.document.get().clone()
        } else {
            CatalogDocument::default()
        };
        self.repo.write_catalog_document(&created.id, &seed).await?;
        info!("Created group {code}");

        self.set_group_code(Some(code.clone())).await;
        Ok(code)
    }

    /// Join an existing group by code or invite URL.
    ///
    /// Returns `false` for blank input. Clears the in-memory document to
    /// the default and defers population to the bootstrap pull; joining
    /// never assumes the joined group shares any local state.
    pub async fn join_group(self: &Arc<Self>, input: &str) -> bool {
        let Some(code) = group::normalize_join_input(input) else {
            return false;
        };
        self.adopt_group(code).await;
        true
    }

    /// Adopt an invite carried by the current location, if it differs from
    /// the active code. Returns the location with the invite parameter
    /// stripped so the host can replace the visible URL and a reload does
    /// not re-trigger the join.
    pub async fn consume_invite_from_location(self: &Arc<Self>, location: &str) -> Option<String> {
        let (code, stripped) = group::consume_invite(location)?;
        let current = self.inner.lock().await.group_code.clone();
        if current.as_deref() != Some(code.as_str()) {
            self.adopt_group(code).await;
        }
        Some(stripped)
    }

    /// Switch to a (normalized) code: drop the local document, then
    /// re-bootstrap against the new group
    async fn adopt_group(self: &Arc<Self>, code: String) {
        {
            let mut inner = self.inner.lock().await;
            inner.document.set(CatalogDocument::default());
            inner.dirty = false;
        }
        self.cache.write(keys::CATALOG_DOCUMENT, &CatalogDocument::default());

        self.set_group_code(Some(code)).await;
    }

    /// Forget the group code, the cached document and all pending state
    pub async fn clear_local_data(self: &Arc<Self>) {
        self.debouncer.cancel();
        let mut inner = self.inner.lock().await;
        inner.epoch += 1;
        inner.document.set(CatalogDocument::default());
        inner.dirty = false;
        inner.push_in_flight = false;
        inner.bootstrapped = false;
        inner.group_code = None;
        inner.group_id = None;
        inner.last_sync_at = None;
        inner.last_save_at = None;
        inner.status = SyncStatus::waiting();
        self.cache.remove(keys::CATALOG_DOCUMENT);
        self.cache.remove(keys::GROUP_CODE);
    }

    /// Hash and store the shared access password
    pub async fn set_access_password(&self, plain: &str) -> Result<()> {
        if plain.trim().is_empty() {
            return Err(SyncError::Validation("password must not be empty".into()));
        }
        let hash = hex::encode(Sha256::digest(plain.as_bytes()));
        self.repo.write_shared_secret_hash(&hash).await?;
        Ok(())
    }

    // ==================== Mutation surface ====================

    pub async fn set_recipes(self: &Arc<Self>, recipes: Vec<Recipe>) {
        self.mutate(|doc| doc.recipes = recipes).await;
    }

    pub async fn update_recipes(self: &Arc<Self>, f: impl FnOnce(&mut Vec<Recipe>)) {
        self.mutate(|doc| f(&mut doc.recipes)).await;
    }

    pub async fn set_cookbooks(self: &Arc<Self>, cookbooks: Vec<CookbookEntry>) {
        self.mutate(|doc| doc.cookbooks = cookbooks).await;
    }

    pub async fn update_cookbooks(self: &Arc<Self>, f: impl FnOnce(&mut Vec<CookbookEntry>)) {
        self.mutate(|doc| f(&mut doc.cookbooks)).await;
    }

    pub async fn set_cuisines(self: &Arc<Self>, cuisines: Vec<String>) {
        self.mutate(|doc| doc.cuisines = cuisines).await;
    }

    pub async fn update_cuisines(self: &Arc<Self>, f: impl FnOnce(&mut Vec<String>)) {
        self.mutate(|doc| f(&mut doc.cuisines)).await;
    }

    pub async fn set_logs(self: &Arc<Self>, logs: Vec<LogEntry>) {
        self.mutate(|doc| doc.logs = logs).await;
    }

    pub async fn update_logs(self: &Arc<Self>, f: impl FnOnce(&mut Vec<LogEntry>)) {
        self.mutate(|doc| f(&mut doc.logs)).await;
    }

    /// Apply a local mutation: bump the version, mark dirty, persist the
    /// new document to the cache, and (re)schedule the debounced push.
    /// No network action happens synchronously.
    async fn mutate(self: &Arc<Self>, f: impl FnOnce(&mut CatalogDocument)) {
        let (schedule, epoch) = {
            let mut inner = self.inner.lock().await;
            inner.document.update(f);
            inner.dirty = true;
            self.cache.write(keys::CATALOG_DOCUMENT, inner.document.get());
            (inner.bootstrapped, inner.epoch)
        };

        if schedule {
            self.schedule_push(epoch);
        }
    }

    fn schedule_push(self: &Arc<Self>, epoch: u64) {
        let this = Arc::clone(self);
        self.debouncer.schedule(async move {
            this.push(epoch).await;
        });
    }

    /// Push any pending change immediately, skipping the quiet interval.
    /// The host calls this on shutdown or page-hide, when waiting out the
    /// debounce would lose the edit.
    pub async fn flush_pending(self: &Arc<Self>) {
        let epoch = {
            let inner = self.inner.lock().await;
            if !inner.dirty || !inner.bootstrapped {
                return;
            }
            inner.epoch
        };
        self.debouncer.cancel();
        self.push(epoch).await;
    }

    // ==================== Push ====================

    /// Write the current document to the remote store.
    ///
    /// Snapshots the version before the write; the dirty flag is cleared
    /// afterwards only if no mutation happened while the write was in
    /// flight, so a slow push never swallows a newer edit's pending state.
    async fn push(self: &Arc<Self>, epoch: u64) {
        let (group_id, snapshot, document) = {
            let mut inner = self.inner.lock().await;
            if inner.epoch != epoch || !inner.dirty || !inner.bootstrapped {
                return;
            }
            if inner.push_in_flight {
                // A save is already running; try again after another quiet period
                drop(inner);
                self.schedule_push(epoch);
                return;
            }
            let Some(group_id) = inner.group_id.clone() else {
                return;
            };
            inner.push_in_flight = true;
            (
                group_id,
                inner.document.version(),
                inner.document.get().clone(),
            )
        };

        let result = self.repo.write_catalog_document(&group_id, &document).await;

        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            // The group changed while the save was in flight; state has
            // moved on and this result no longer means anything
            debug!("Discarding push result from a previous group epoch");
            return;
        }
        inner.push_in_flight = false;

        match result {
            Ok(()) => {
                inner.last_save_at = Some(now_millis());
                if inner.document.is_current(snapshot) {
                    inner.dirty = false;
                } else {
                    // A mutation landed during the in-flight save; its own
                    // debounce cycle will push again
                    debug!("Document changed during save, keeping dirty flag");
                }
                inner.status = SyncStatus::ready();
            }
            Err(e) => {
                warn!("Saving catalog document failed: {e}");
                inner.status = SyncStatus::from_store_error(&e);
            }
        }
    }

    // ==================== Pull ====================

    /// Passive resync trigger: the host calls this when the window regains
    /// focus or the document becomes visible
    pub async fn handle_focus(self: &Arc<Self>) {
        let _ = self.pull().await;
    }

    /// Manual pull requested by the caller
    pub async fn sync_catalog(self: &Arc<Self>) -> Result<()> {
        self.pull().await
    }

    /// Pull the remote document and replace the local copy.
    ///
    /// Skipped entirely while a local change is pending or a push is in
    /// flight, so pulls never race a push for the same document. A result
    /// arriving after a new local edit is discarded as stale.
    async fn pull(self: &Arc<Self>) -> Result<()> {
        let (group_id, epoch, snapshot) = {
            let inner = self.inner.lock().await;
            if inner.dirty || inner.push_in_flight || !inner.bootstrapped {
                return Ok(());
            }
            let Some(group_id) = inner.group_id.clone() else {
                return Ok(());
            };
            (group_id, inner.epoch, inner.document.version())
        };

        match self.repo.fetch_catalog_document(&group_id).await {
            Ok(remote) => {
                let mut inner = self.inner.lock().await;
                if inner.epoch != epoch || !inner.document.is_current(snapshot) {
                    debug!("Discarding stale pull result");
                    return Ok(());
                }
                let document = remote.unwrap_or_default();
                inner.document.set(document.clone());
                inner.last_sync_at = Some(now_millis());
                inner.status = SyncStatus::ready();
                drop(inner);
                self.cache.write(keys::CATALOG_DOCUMENT, &document);
                Ok(())
            }
            Err(e) => {
                self.enter_error(epoch, &e).await;
                Err(e.into())
            }
        }
    }

    // ==================== Bootstrap ====================

    /// From `connecting`: fetch the shared settings and resolve-or-create
    /// the group, then pull the document. Both must succeed to reach
    /// `ready`; either failing lands in `error` with local state untouched.
    async fn bootstrap(self: &Arc<Self>, epoch: u64) {
        let code = {
            let inner = self.inner.lock().await;
            if inner.epoch != epoch {
                return;
            }
            match inner.group_code.clone() {
                Some(code) => code,
                None => return,
            }
        };

        let settings = self.repo.fetch_shared_secret_hash().await;
        let group = self.resolve_or_create_group(&code).await;

        let group = match (settings, group) {
            (Ok(_), Ok(group)) => group,
            (Err(e), _) | (_, Err(e)) => {
                self.enter_error(epoch, &e).await;
                return;
            }
        };

        match self.repo.fetch_catalog_document(&group.id).await {
            Ok(remote) => {
                let mut inner = self.inner.lock().await;
                if inner.epoch != epoch {
                    return;
                }
                let document = remote.unwrap_or_default();
                inner.document.set(document.clone());
                inner.group_id = Some(group.id);
                inner.bootstrapped = true;
                inner.dirty = false;
                inner.last_sync_at = Some(now_millis());
                inner.status = SyncStatus::ready();
                drop(inner);
                self.cache.write(keys::CATALOG_DOCUMENT, &document);
                debug!("Bootstrap complete for {code}");
            }
            Err(e) => self.enter_error(epoch, &e).await,
        }
    }

    /// Resolve a code to its group, creating and seeding it when it does
    /// not exist remotely. A create losing the write-then-read race gets a
    /// duplicate-code error and falls back to fetching the winner's row.
    async fn resolve_or_create_group(
        &self,
        code: &str,
    ) -> std::result::Result<mealbook_store_client::Group, StoreError> {
        if let Some(group) = self.repo.fetch_group_by_code(code).await? {
            return Ok(group);
        }

        match self.repo.create_group(code, code).await {
            Ok(group) => {
                self.repo
                    .write_catalog_document(&group.id, &CatalogDocument::default())
                    .await?;
                info!("Auto-created group {code}");
                Ok(group)
            }
            Err(e) if e.is_duplicate() => match self.repo.fetch_group_by_code(code).await? {
                Some(group) => Ok(group),
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    async fn enter_error(&self, epoch: u64, err: &StoreError) {
        warn!("Sync error: {err}");
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            return;
        }
        // The in-memory document is never rolled back here: an error must
        // not discard newer local edits
        inner.status = SyncStatus::from_store_error(err);
    }

    // ==================== Introspection ====================

    pub async fn document(&self) -> CatalogDocument {
        self.inner.lock().await.document.get().clone()
    }

    pub async fn status(&self) -> SyncStatus {
        self.inner.lock().await.status.clone()
    }

    pub async fn is_saving(&self) -> bool {
        self.inner.lock().await.push_in_flight
    }

    pub async fn pending_changes(&self) -> bool {
        self.inner.lock().await.dirty
    }

    pub async fn last_sync_at(&self) -> Option<u64> {
        self.inner.lock().await.last_sync_at
    }

    pub async fn last_save_at(&self) -> Option<u64> {
        self.inner.lock().await.last_save_at
    }

    pub async fn group_code(&self) -> Option<String> {
        self.inner.lock().await.group_code.clone()
    }

    pub async fn group_id(&self) -> Option<String> {
        self.inner.lock().await.group_id.clone()
    }

    /// Shareable invite URL for the active group, empty when no code is set
    pub async fn invite_url(&self) -> String {
        let code = self.inner.lock().await.group_code.clone();
        group::derive_invite_url(&self.config.invite_base_url, code.as_deref().unwrap_or(""))
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
