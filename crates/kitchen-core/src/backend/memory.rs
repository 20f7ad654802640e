//! In-process backend.
//!
//! Holds the items table and object bucket in memory and fans change events
//! out to every open subscription. Failures can be injected per operation,
//! and fetches or mutations can be held mid-flight to reproduce races
//! between the controller and the change feed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use tokio::sync::{mpsc, watch};

use super::{
    ChangeEvent, ChangeKind, ChangeSubscription, ItemPatch, NewItemRow, RemoteBackend,
    StoredObject,
};
use crate::auth::{AuthSession, AuthUser};
use crate::models::{Item, ItemId};
use crate::{Error, Result};

const SUBSCRIPTION_BUFFER: usize = 64;

/// Backend operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Session,
    Select,
    Insert,
    Update,
    Delete,
    Subscribe,
    Upload,
}

#[derive(Debug, Default)]
struct MemoryState {
    items: Vec<Item>,
    next_id: i64,
    objects: HashMap<(String, String), Vec<u8>>,
    subscribers: Vec<mpsc::Sender<ChangeEvent>>,
    failing: HashSet<Operation>,
    inserts: usize,
}

impl MemoryState {
    fn check(&self, operation: Operation) -> Result<()> {
        if self.failing.contains(&operation) {
            Err(Error::Backend(format!("{operation:?} failed (injected)")))
        } else {
            Ok(())
        }
    }

    fn broadcast(&mut self, event: &ChangeEvent) {
        self.subscribers.retain(|subscriber| !subscriber.is_closed());
        for subscriber in &self.subscribers {
            if subscriber.try_send(event.clone()).is_err() {
                tracing::debug!("Dropped change event for a lagging subscriber");
            }
        }
    }

    fn insert(&mut self, row: &NewItemRow) -> Item {
        let item = Item {
            id: ItemId::from(self.next_id),
            name: row.name.clone(),
            category: row.category.clone(),
            quantity: row.quantity,
            location: row.location.clone(),
            description: row.description.clone(),
            image_url: row.image_url.clone(),
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        };
        self.next_id += 1;
        self.inserts += 1;
        self.items.push(item.clone());
        self.broadcast(&ChangeEvent::new(ChangeKind::Insert, Some(item.id.clone())));
        item
    }

    fn sorted_items(&self) -> Vec<Item> {
        let mut items = self.items.clone();
        items.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        items
    }
}

struct Inner {
    state: Mutex<MemoryState>,
    fetch_gate: watch::Sender<bool>,
    mutation_gate: watch::Sender<bool>,
    fetches: watch::Sender<usize>,
    session: watch::Sender<Option<AuthSession>>,
}

/// Shared handle to one in-memory backend.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        formatter
            .debug_struct("MemoryBackend")
            .field("items", &state.items.len())
            .field("subscribers", &state.subscribers.len())
            .field("signed_in", &self.inner.session.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// Empty table with a signed-in demo session.
    #[must_use]
    pub fn new() -> Self {
        let (fetch_gate, _) = watch::channel(true);
        let (mutation_gate, _) = watch::channel(true);
        let (fetches, _) = watch::channel(0);
        let (session, _) = watch::channel(Some(demo_session()));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MemoryState {
                    next_id: 1,
                    ..MemoryState::default()
                }),
                fetch_gate,
                mutation_gate,
                fetches,
                session,
            }),
        }
    }

    /// Table pre-filled with `items`. New ids continue after the largest numeric id.
    #[must_use]
    pub fn with_items(items: Vec<Item>) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state();
            state.next_id = items
                .iter()
                .filter_map(|item| item.id.as_str().parse::<i64>().ok())
                .max()
                .map_or(1, |max| max + 1);
            state.items = items;
        }
        backend
    }

    /// Table seeded with the sample kitchen.
    #[must_use]
    pub fn demo() -> Self {
        Self::with_items(demo_items())
    }

    pub fn set_signed_in(&self, signed_in: bool) {
        self.inner.session.send_replace(signed_in.then(demo_session));
    }

    /// Make `operation` fail until [`Self::recover`] is called.
    pub fn fail(&self, operation: Operation) {
        self.state().failing.insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.state().failing.remove(&operation);
    }

    /// Park every fetch after it is counted until [`Self::release_fetches`].
    pub fn hold_fetches(&self) {
        self.inner.fetch_gate.send_replace(false);
    }

    pub fn release_fetches(&self) {
        self.inner.fetch_gate.send_replace(true);
    }

    /// Park inserts, updates and deletes after they have been applied and
    /// broadcast, before they return.
    pub fn hold_mutations(&self) {
        self.inner.mutation_gate.send_replace(false);
    }

    pub fn release_mutations(&self) {
        self.inner.mutation_gate.send_replace(true);
    }

    /// Wait until at least `count` fetches have started.
    pub async fn wait_for_fetches(&self, count: usize) {
        let mut fetches = self.inner.fetches.subscribe();
        // The sender lives as long as `self`.
        let _ = fetches.wait_for(|started| *started >= count).await;
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        *self.inner.fetches.borrow()
    }

    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.state().inserts
    }

    /// Subscriptions that have not been released.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state();
        state.subscribers.retain(|subscriber| !subscriber.is_closed());
        state.subscribers.len()
    }

    /// Current table contents in stored order.
    #[must_use]
    pub fn rows(&self) -> Vec<Item> {
        self.state().items.clone()
    }

    #[must_use]
    pub fn object(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        self.state()
            .objects
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
    }

    /// Insert a row as another session would: applied and broadcast at once.
    pub fn external_insert(&self, row: &NewItemRow) -> Item {
        self.state().insert(row)
    }

    /// Delete a row as another session would.
    pub fn external_delete(&self, id: &ItemId) {
        let mut state = self.state();
        let before = state.items.len();
        state.items.retain(|item| &item.id != id);
        if state.items.len() != before {
            state.broadcast(&ChangeEvent::new(ChangeKind::Delete, Some(id.clone())));
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn pass_mutation_gate(&self) {
        let mut gate = self.inner.mutation_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn current_session(&self) -> Result<Option<AuthSession>> {
        self.state().check(Operation::Session)?;
        Ok(self.inner.session.borrow().clone())
    }

    fn session_changes(&self) -> watch::Receiver<Option<AuthSession>> {
        self.inner.session.subscribe()
    }

    async fn select_items(&self) -> Result<Vec<Item>> {
        let snapshot = {
            let state = self.state();
            state.check(Operation::Select)?;
            state.sorted_items()
        };
        self.inner.fetches.send_modify(|started| *started += 1);

        let mut gate = self.inner.fetch_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        Ok(snapshot)
    }

    async fn insert_item(&self, row: &NewItemRow) -> Result<Item> {
        let item = {
            let mut state = self.state();
            state.check(Operation::Insert)?;
            state.insert(row)
        };
        self.pass_mutation_gate().await;
        Ok(item)
    }

    async fn update_item(&self, id: &ItemId, patch: &ItemPatch) -> Result<Item> {
        let item = {
            let mut state = self.state();
            state.check(Operation::Update)?;
            let item = state
                .items
                .iter_mut()
                .find(|item| &item.id == id)
                .ok_or_else(|| Error::Backend(format!("Item {id} not found")))?;
            patch.apply_to(item);
            let item = item.clone();
            state.broadcast(&ChangeEvent::new(ChangeKind::Update, Some(id.clone())));
            item
        };
        self.pass_mutation_gate().await;
        Ok(item)
    }

    async fn delete_item(&self, id: &ItemId) -> Result<()> {
        {
            let mut state = self.state();
            state.check(Operation::Delete)?;
            let before = state.items.len();
            state.items.retain(|item| &item.id != id);
            if state.items.len() != before {
                state.broadcast(&ChangeEvent::new(ChangeKind::Delete, Some(id.clone())));
            }
        }
        self.pass_mutation_gate().await;
        Ok(())
    }

    async fn subscribe_changes(&self) -> Result<ChangeSubscription> {
        let mut state = self.state();
        state.check(Operation::Subscribe)?;
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        state.subscribers.push(sender);
        Ok(ChangeSubscription::from_receiver(receiver))
    }

    async fn upload_object(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<StoredObject> {
        let mut state = self.state();
        state.check(Operation::Upload)?;
        state
            .objects
            .insert((bucket.to_string(), name.to_string()), bytes);
        Ok(StoredObject {
            bucket: bucket.to_string(),
            name: name.to_string(),
            public_url: self.public_url(bucket, name),
        })
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        format!("memory://{bucket}/{name}")
    }
}

fn demo_session() -> AuthSession {
    AuthSession {
        access_token: "demo-access-token".to_string(),
        refresh_token: "demo-refresh-token".to_string(),
        expires_at: i64::MAX / 2,
        user: AuthUser {
            id: "demo-user".to_string(),
            email: Some("demo@kitchen.local".to_string()),
        },
    }
}

/// The six sample items the kitchen starts with, newest first.
#[must_use]
pub fn demo_items() -> Vec<Item> {
    let seeded_at = Utc
        .with_ymd_and_hms(2024, 11, 7, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);

    [
        (
            "Professional Cookware Set",
            "Cookware",
            5,
            "Lower Cabinet",
            "Professional grade stainless steel cookware set",
        ),
        (
            "Ceramic Dinner Set",
            "Dinnerware",
            6,
            "Upper Cabinet",
            "Modern white ceramic dinner set with gold trim",
        ),
        (
            "Kitchen Utensils Set",
            "Utensils",
            12,
            "Drawer",
            "Complete set of essential kitchen utensils",
        ),
        (
            "Basic Ingredients Set",
            "Ingredients",
            3,
            "Upper Cabinet",
            "Essential cooking ingredients including sugar, spices, and salt",
        ),
        (
            "Food Storage Essentials",
            "Storage",
            6,
            "Pantry",
            "Essential food storage items including rice, flour, potatoes, pasta, oil, and bread",
        ),
        (
            "Kitchen Appliances Set",
            "Appliances",
            8,
            "Countertop",
            "Essential kitchen appliances including mixer, food processor, blender, and more",
        ),
    ]
    .into_iter()
    .zip(1_i64..)
    .map(|((name, category, quantity, location, description), id)| {
        let created_at = seeded_at - Duration::minutes(id);
        Item {
            id: ItemId::from(id),
            name: name.to_string(),
            category: category.to_string(),
            quantity,
            location: Some(location.to_string()),
            description: Some(description.to_string()),
            image_url: None,
            created_at: Some(created_at),
            updated_at: Some(created_at),
        }
    })
    .collect()
}
