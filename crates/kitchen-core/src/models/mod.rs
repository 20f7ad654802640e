//! Data models for Kitchen

mod item;
mod view;

pub use item::{
    category_default_image, Item, ItemDraft, ItemId, ALL_CATEGORIES, CATEGORIES, LOCATIONS,
};
pub use view::{ActiveTab, Theme, ViewMode, ViewState};
