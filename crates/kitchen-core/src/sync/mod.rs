//! Synchronization between the remote backend and the shared store.
//!
//! [`SyncController`] is the only component that performs I/O. `start()`
//! fetches the full collection, replaces the store, and opens a change feed;
//! every change event triggers another full fetch. Each `start()` mints a
//! [`DisposalToken`]: once it is disposed, fetch results that are still in
//! flight are dropped without touching the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthSession;
use crate::backend::{ChangeSubscription, ItemPatch, NewItemRow, RemoteBackend};
use crate::config::DEFAULT_STORAGE_BUCKET;
use crate::models::{Item, ItemDraft, ItemId};
use crate::store::SharedStore;
use crate::util::{file_extension, normalize_text_option};
use crate::{Error, Result};

/// Progress of the most recent fetch, for loading and error indicators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
    /// The session ended while subscribed; the change feed was closed.
    SignedOut,
}

/// Liveness flag shared by one `start()` and everything it spawned.
#[derive(Debug, Clone)]
pub struct DisposalToken {
    disposed: Arc<watch::Sender<bool>>,
}

impl Default for DisposalToken {
    fn default() -> Self {
        Self::new()
    }
}

impl DisposalToken {
    #[must_use]
    pub fn new() -> Self {
        let (disposed, _) = watch::channel(false);
        Self {
            disposed: Arc::new(disposed),
        }
    }

    /// Mark the token disposed. Idempotent.
    pub fn dispose(&self) {
        self.disposed.send_if_modified(|disposed| !std::mem::replace(disposed, true));
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        *self.disposed.borrow()
    }

    /// Resolves once the token is disposed.
    pub async fn disposed(&self) {
        let mut receiver = self.disposed.subscribe();
        let _ = receiver.wait_for(|disposed| *disposed).await;
    }

    fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.disposed, &other.disposed)
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    active: Option<DisposalToken>,
    applied_ticket: u64,
}

struct ControllerInner {
    backend: Arc<dyn RemoteBackend>,
    store: SharedStore,
    image_bucket: String,
    state: Mutex<ControllerState>,
    tickets: AtomicU64,
    status: watch::Sender<LoadState>,
}

/// Bridges a [`RemoteBackend`] and a [`SharedStore`]. Cheap to clone.
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncController")
            .field("image_bucket", &self.inner.image_bucket)
            .field("status", &*self.inner.status.borrow())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl SyncController {
    #[must_use]
    pub fn new(backend: Arc<dyn RemoteBackend>, store: SharedStore) -> Self {
        Self::with_image_bucket(backend, store, DEFAULT_STORAGE_BUCKET)
    }

    #[must_use]
    pub fn with_image_bucket(
        backend: Arc<dyn RemoteBackend>,
        store: SharedStore,
        image_bucket: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(LoadState::Idle);
        Self {
            inner: Arc::new(ControllerInner {
                backend,
                store,
                image_bucket: image_bucket.into(),
                state: Mutex::new(ControllerState::default()),
                tickets: AtomicU64::new(0),
                status,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    #[must_use]
    pub fn status(&self) -> watch::Receiver<LoadState> {
        self.inner.status.subscribe()
    }

    /// Whether a `start()` is running or its subscription is live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state()
            .active
            .as_ref()
            .is_some_and(|token| !token.is_disposed())
    }

    /// Load the collection and keep it live until the handle is stopped.
    ///
    /// A previous subscription of this controller is disposed first. If the
    /// controller is stopped while this call is still fetching, the result is
    /// dropped and the returned handle is already inactive.
    pub async fn start(&self) -> Result<SyncHandle> {
        let token = self.activate();
        let handle = |listener| SyncHandle {
            controller: self.clone(),
            token: token.clone(),
            listener,
        };

        if let Err(error) = self.require_session().await {
            self.release(&token);
            return Err(error);
        }
        if token.is_disposed() {
            debug!("Stopped before the session check completed");
            return Ok(handle(None));
        }

        self.set_status(LoadState::Loading);
        match self.fetch_and_apply(&token).await {
            Ok(_) => {}
            Err(error) => {
                self.set_status(LoadState::Failed(error.to_string()));
                self.release(&token);
                return Err(error);
            }
        }
        if token.is_disposed() {
            debug!("Stopped before the initial fetch completed");
            self.set_status(LoadState::Idle);
            return Ok(handle(None));
        }

        let subscription = match self.inner.backend.subscribe_changes().await {
            Ok(subscription) => subscription,
            Err(error) => {
                self.set_status(LoadState::Failed(error.to_string()));
                self.release(&token);
                return Err(error);
            }
        };
        if token.is_disposed() {
            subscription.unsubscribe();
            return Ok(handle(None));
        }

        let listener = tokio::spawn(self.clone().listen(token.clone(), subscription));
        Ok(handle(Some(listener)))
    }

    /// Dispose the active subscription, if any.
    ///
    /// Safe to call while `start()` is still in flight.
    pub fn stop(&self) {
        let mut state = self.state();
        if let Some(token) = state.active.take() {
            token.dispose();
            info!("Sync stopped");
        }
    }

    /// Fetch the collection and replace the store.
    pub async fn refresh(&self) -> Result<()> {
        let token = self
            .state()
            .active
            .clone()
            .unwrap_or_default();
        self.require_session().await?;

        self.set_status(LoadState::Loading);
        match self.fetch_and_apply(&token).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                let settled = if token.is_disposed() {
                    LoadState::Idle
                } else {
                    LoadState::Ready
                };
                self.set_status(settled);
                Ok(())
            }
            Err(error) => {
                self.set_status(LoadState::Failed(error.to_string()));
                Err(error)
            }
        }
    }

    /// Validate and insert a new item, then add the stored row to the store.
    pub async fn create(&self, draft: ItemDraft) -> Result<Item> {
        let row = validate_draft(draft)?;
        let item = self.inner.backend.insert_item(&row).await?;
        self.inner.store.write(|store| store.add_item(item.clone()));
        info!(id = %item.id, "Item created");
        Ok(item)
    }

    /// Validate and save an edited item.
    pub async fn update(&self, item: Item) -> Result<Item> {
        let item = self.validate_edit(item)?;
        let patch = ItemPatch::from_item(&item, Utc::now());
        let stored = self.inner.backend.update_item(&item.id, &patch).await?;

        let replaced = self
            .inner
            .store
            .write(|store| store.update_item(stored.clone()));
        if !replaced {
            debug!(id = %stored.id, "Updated item is no longer in the store");
        }
        info!(id = %stored.id, "Item updated");
        Ok(stored)
    }

    pub async fn remove(&self, id: &ItemId) -> Result<()> {
        self.inner.backend.delete_item(id).await?;
        self.inner.store.write(|store| store.delete_item(id));
        info!(%id, "Item deleted");
        Ok(())
    }

    /// Store image bytes and return their public URL.
    ///
    /// The object name is fresh for every call; only the extension of
    /// `suggested_name` is kept.
    pub async fn upload_image(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<String> {
        self.require_session().await?;
        if bytes.is_empty() {
            return Err(Error::validation("image", "file is empty"));
        }

        let name = object_name(suggested_name);
        let content_type = mime_guess::from_path(suggested_name)
            .first_or_octet_stream()
            .to_string();
        let stored = self
            .inner
            .backend
            .upload_object(&self.inner.image_bucket, &name, bytes, &content_type)
            .await
            .map_err(|error| match error {
                Error::Backend(message) => Error::Upload(message),
                other => other,
            })?;

        info!(bucket = %stored.bucket, name = %stored.name, "Image uploaded");
        Ok(stored.public_url)
    }

    /// Point an existing item at an uploaded image.
    pub async fn attach_image(&self, id: &ItemId, image_url: impl Into<String>) -> Result<Item> {
        let mut item = self
            .inner
            .store
            .read(|store| store.item(id).cloned())
            .ok_or_else(|| Error::validation("id", format!("no item with id {id}")))?;
        item.image_url = Some(image_url.into());
        self.update(item).await
    }

    async fn listen(self, token: DisposalToken, mut subscription: ChangeSubscription) {
        info!("Change subscription opened");
        let mut sessions = self.inner.backend.session_changes();
        let mut sessions_open = true;
        loop {
            if sessions_open && sessions.borrow_and_update().is_none() {
                warn!("Session ended; closing change subscription");
                self.release(&token);
                self.set_status(LoadState::SignedOut);
                break;
            }
            tokio::select! {
                () = token.disposed() => break,
                changed = sessions.changed(), if sessions_open => {
                    if changed.is_err() {
                        debug!("Session feed closed");
                        sessions_open = false;
                    }
                }
                event = subscription.next() => {
                    let Some(event) = event else {
                        warn!("Change feed closed by the backend");
                        break;
                    };
                    debug!(kind = ?event.kind, record = ?event.record_id, "Change received");
                    if let Err(error) = self.fetch_and_apply(&token).await {
                        warn!("Re-fetch after change failed: {}", error);
                        self.set_status(LoadState::Failed(error.to_string()));
                    }
                }
            }
        }
        subscription.unsubscribe();
        info!("Change subscription closed");
    }

    /// Fetch the collection and apply it unless `token` was disposed or a
    /// newer fetch already landed. Returns whether the store was replaced.
    async fn fetch_and_apply(&self, token: &DisposalToken) -> Result<bool> {
        let ticket = self.inner.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let items = tokio::select! {
            () = token.disposed() => {
                debug!(ticket, "Fetch abandoned after disposal");
                return Ok(false);
            }
            items = self.inner.backend.select_items() => items?,
        };

        let mut state = self.state();
        if token.is_disposed() {
            debug!(ticket, "Discarding fetch for a disposed subscription");
            return Ok(false);
        }
        if ticket <= state.applied_ticket {
            debug!(ticket, applied = state.applied_ticket, "Discarding stale fetch");
            return Ok(false);
        }
        state.applied_ticket = ticket;
        let count = items.len();
        self.inner.store.write(|store| store.set_items(items));
        drop(state);

        debug!(ticket, count, "Store replaced from backend");
        self.set_status(LoadState::Ready);
        Ok(true)
    }

    async fn require_session(&self) -> Result<AuthSession> {
        self.inner
            .backend
            .current_session()
            .await?
            .filter(|session| !session.is_expired())
            .ok_or_else(|| Error::Auth("Sign in to continue".to_string()))
    }

    fn validate_edit(&self, mut item: Item) -> Result<Item> {
        if item.id.is_temporary() {
            return Err(Error::validation("id", "item has not been saved yet"));
        }
        item.name = required_text("name", &item.name)?;
        item.category = required_text("category", &item.category)?;
        item.location = normalize_text_option(item.location.take());
        item.description = normalize_text_option(item.description.take());
        item.image_url = normalize_text_option(item.image_url.take());

        if let Some(location) = item.location.as_deref() {
            let known = self
                .inner
                .store
                .read(|store| store.is_known_location(location));
            if !known {
                return Err(Error::validation(
                    "location",
                    format!("'{location}' is not a known location"),
                ));
            }
        }
        Ok(item)
    }

    fn activate(&self) -> DisposalToken {
        let token = DisposalToken::new();
        let mut state = self.state();
        if let Some(previous) = state.active.replace(token.clone()) {
            previous.dispose();
            debug!("Disposed previous subscription");
        }
        token
    }

    fn release(&self, token: &DisposalToken) {
        let mut state = self.state();
        token.dispose();
        if state
            .active
            .as_ref()
            .is_some_and(|active| active.same_as(token))
        {
            state.active = None;
        }
    }

    fn set_status(&self, status: LoadState) {
        self.inner.status.send_replace(status);
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Release half of [`SyncController::start`].
///
/// Dropping the handle disposes the subscription as well.
#[derive(Debug)]
pub struct SyncHandle {
    controller: SyncController,
    token: DisposalToken,
    listener: Option<JoinHandle<()>>,
}

impl SyncHandle {
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_disposed()
    }

    #[must_use]
    pub const fn token(&self) -> &DisposalToken {
        &self.token
    }

    /// Dispose the subscription and wait for the listener to close it.
    pub async fn stop(mut self) {
        self.controller.release(&self.token);
        if let Some(listener) = self.listener.take() {
            if let Err(error) = listener.await {
                warn!("Change listener ended abnormally: {}", error);
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.controller.release(&self.token);
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::validation(field, "is required"))
    } else {
        Ok(value.to_string())
    }
}

fn validate_draft(draft: ItemDraft) -> Result<NewItemRow> {
    let name = required_text("name", &draft.name)?;
    let category = required_text("category", &draft.category)?;
    let location = required_text("location", &draft.location)?;
    if draft.quantity < 0 {
        return Err(Error::validation("quantity", "must not be negative"));
    }
    let quantity = u32::try_from(draft.quantity)
        .map_err(|_| Error::validation("quantity", "is too large"))?;

    let now = Utc::now();
    Ok(NewItemRow {
        name,
        category,
        quantity,
        location: Some(location),
        description: normalize_text_option(draft.description),
        image_url: normalize_text_option(draft.image_url),
        created_at: now,
        updated_at: now,
    })
}

fn object_name(suggested_name: &str) -> String {
    let stem = Uuid::now_v7();
    match file_extension(suggested_name) {
        Some(extension) => format!("{stem}.{extension}"),
        None => stem.to_string(),
    }
}
