//! Remote backend contract.
//!
//! The hosted service owns durable storage, object storage, sessions, and
//! change notification. Everything the client needs from it goes through
//! [`RemoteBackend`], so the controller can run against the real service or
//! the in-process [`MemoryBackend`].

mod changes;
mod memory;
mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::auth::AuthSession;
use crate::models::{Item, ItemId};
use crate::Result;

pub use changes::{ChangeEvent, ChangeKind, ChangeSubscription};
pub use memory::{demo_items, MemoryBackend, Operation};
pub use supabase::SupabaseBackend;

/// Row payload for a new item. The backend assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItemRow {
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full replacement of an item's editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ItemPatch {
    /// Patch carrying every editable field of `item`.
    #[must_use]
    pub fn from_item(item: &Item, updated_at: DateTime<Utc>) -> Self {
        Self {
            name: item.name.clone(),
            category: item.category.clone(),
            quantity: item.quantity,
            location: item.location.clone(),
            description: item.description.clone(),
            image_url: item.image_url.clone(),
            updated_at,
        }
    }

    pub(crate) fn apply_to(&self, item: &mut Item) {
        item.name.clone_from(&self.name);
        item.category.clone_from(&self.category);
        item.quantity = self.quantity;
        item.location.clone_from(&self.location);
        item.description.clone_from(&self.description);
        item.image_url.clone_from(&self.image_url);
        item.updated_at = Some(self.updated_at);
    }
}

/// An uploaded object and where it can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub name: String,
    pub public_url: String,
}

/// Operations the client performs against the hosted backend.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// The signed-in session, if any.
    async fn current_session(&self) -> Result<Option<AuthSession>>;

    /// Session-change notifications; `None` while signed out.
    fn session_changes(&self) -> watch::Receiver<Option<AuthSession>>;

    /// Every item, newest `created_at` first.
    async fn select_items(&self) -> Result<Vec<Item>>;

    /// Insert a row and return it as stored, with its assigned id.
    async fn insert_item(&self, row: &NewItemRow) -> Result<Item>;

    /// Apply a patch to one row and return the stored result.
    async fn update_item(&self, id: &ItemId, patch: &ItemPatch) -> Result<Item>;

    async fn delete_item(&self, id: &ItemId) -> Result<()>;

    /// Open a change feed on the items table.
    async fn subscribe_changes(&self) -> Result<ChangeSubscription>;

    async fn upload_object(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject>;

    /// Public locator of an object, whether or not it exists yet.
    fn public_url(&self, bucket: &str, name: &str) -> String;
}
