//! Inventory item model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::util::fold_case;

/// Pseudo-category that matches every item in filters.
pub const ALL_CATEGORIES: &str = "All";

/// Known item categories, in display order.
pub const CATEGORIES: [&str; 6] = [
    "Dinnerware",
    "Cookware",
    "Utensils",
    "Appliances",
    "Ingredients",
    "Storage",
];

/// Fixed storage locations that are always valid targets.
pub const LOCATIONS: [&str; 6] = [
    "Upper Cabinet",
    "Lower Cabinet",
    "Drawer",
    "Pantry",
    "Countertop",
    "Spice Rack",
];

const TEMPORARY_ID_PREFIX: &str = "tmp-";

/// Default artwork for items of a known category without their own image.
pub fn category_default_image(category: &str) -> Option<&'static str> {
    let url = match category {
        "Dinnerware" => {
            "https://images.unsplash.com/photo-1603199506016-b9a594b593c0?auto=format&fit=crop&q=80"
        }
        "Cookware" => {
            "https://images.unsplash.com/photo-1584990347449-a8f1d78a1c3f?auto=format&fit=crop&q=80"
        }
        "Utensils" => {
            "https://images.unsplash.com/photo-1593618998160-e34014e67546?auto=format&fit=crop&q=80"
        }
        "Appliances" => {
            "https://images.unsplash.com/photo-1574269909862-7e1d70bb8078?auto=format&fit=crop&q=80"
        }
        "Ingredients" => {
            "https://images.unsplash.com/photo-1620706857370-e1b9770e8bb1?auto=format&fit=crop&q=80"
        }
        "Storage" => {
            "https://images.unsplash.com/photo-1520981825232-ece5fae45120?auto=format&fit=crop&q=80"
        }
        _ => return None,
    };
    Some(url)
}

/// Identifier of an inventory item.
///
/// Assigned by the backend, which may use integer or UUID keys, so the value
/// is kept as an opaque string. Ids minted locally before the backend has
/// confirmed a row carry a `tmp-` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mint a locally unique placeholder id.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_ID_PREFIX}{}", Uuid::now_v7()))
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_ID_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(value) => Self::from(value),
            RawId::Text(value) => Self(value),
        })
    }
}

/// One inventory record: a kitchen object or group of objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Location name, if set to something other than whitespace.
    #[must_use]
    pub fn location_name(&self) -> Option<&str> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|location| !location.is_empty())
    }

    /// Own image, falling back to the category artwork.
    #[must_use]
    pub fn display_image(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| category_default_image(&self.category))
    }

    /// Case-insensitive substring match over every text field.
    ///
    /// `needle` must already be folded with [`fold_case`].
    pub(crate) fn matches_term(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }

        [
            Some(self.id.as_str()),
            Some(self.name.as_str()),
            Some(self.category.as_str()),
            self.location.as_deref(),
            self.description.as_deref(),
            self.image_url.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|value| fold_case(value).contains(needle))
    }

    pub(crate) fn matches_category(&self, category: &str) -> bool {
        category == ALL_CATEGORIES || self.category == category
    }
}

/// Candidate item submitted from a form, before the backend has accepted it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    #[serde(default)]
    pub id: Option<ItemId>,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ItemDraft {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        quantity: i64,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            category: category.into(),
            quantity,
            location: location.into(),
            description: None,
            image_url: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Turn the draft into a local item, minting a temporary id if needed.
    ///
    /// Negative quantities clamp to zero; the controller rejects them before
    /// a draft ever gets here.
    #[must_use]
    pub fn into_local_item(self) -> Item {
        Item {
            id: self.id.unwrap_or_else(ItemId::temporary),
            name: self.name,
            category: self.category,
            quantity: u32::try_from(self.quantity.max(0)).unwrap_or(u32::MAX),
            location: crate::util::normalize_text_option(Some(self.location)),
            description: crate::util::normalize_text_option(self.description),
            image_url: crate::util::normalize_text_option(self.image_url),
            created_at: None,
            updated_at: None,
        }
    }
}

impl From<Item> for ItemDraft {
    fn from(item: Item) -> Self {
        Self {
            id: Some(item.id),
            name: item.name,
            category: item.category,
            quantity: i64::from(item.quantity),
            location: item.location.unwrap_or_default(),
            description: item.description,
            image_url: item.image_url,
        }
    }
}
