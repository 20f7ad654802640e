//! kitchen-core - Core library for the Kitchen inventory client
//!
//! This crate contains the item models, the in-memory view-model store, the
//! synchronization controller, the route guard, and the backend
//! implementations shared by every Kitchen front end.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Item, ItemDraft, ItemId};
pub use store::{InventoryStore, SharedStore};
pub use sync::{LoadState, SyncController, SyncHandle};
