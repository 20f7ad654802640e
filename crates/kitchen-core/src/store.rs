//! In-memory view model: the item collection plus view preferences.
//!
//! [`InventoryStore`] is a plain value with total operations. [`SharedStore`]
//! is the handle passed around the app: the sync controller is its only
//! writer for the item collection, presenters read snapshots and subscribe to
//! the version counter to know when to re-render.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;

use crate::models::{ActiveTab, Item, ItemDraft, ItemId, Theme, ViewMode, ViewState, LOCATIONS};
use crate::util::fold_case;

/// Items sharing one storage location, in collection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationGroup {
    pub location: String,
    pub items: Vec<Item>,
}

/// Authoritative in-memory inventory and view state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryStore {
    items: Vec<Item>,
    view: ViewState,
}

impl InventoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn view(&self) -> &ViewState {
        &self.view
    }

    /// Replace the whole collection. Unconfirmed local edits are dropped.
    pub fn set_items(&mut self, items: Vec<Item>) {
        self.items = items;
    }

    /// Append an item, or replace the one already holding its id.
    ///
    /// Drafts without an id get a temporary one. Returns the stored item's id.
    pub fn add_item(&mut self, candidate: impl Into<AddCandidate>) -> ItemId {
        let item = match candidate.into() {
            AddCandidate::Item(item) => item,
            AddCandidate::Draft(draft) => draft.into_local_item(),
        };
        let id = item.id.clone();

        if let Some(existing) = self.items.iter_mut().find(|existing| existing.id == id) {
            *existing = item;
        } else {
            self.items.push(item);
        }
        id
    }

    /// Replace the item with the same id. Returns `false` when no such item exists.
    pub fn update_item(&mut self, item: Item) -> bool {
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                *existing = item;
                true
            }
            None => false,
        }
    }

    /// Remove the item with the given id. Deleting an absent id is a no-op.
    pub fn delete_item(&mut self, id: &ItemId) {
        self.items.retain(|item| &item.id != id);
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.view.theme = theme;
    }

    pub fn toggle_theme(&mut self) {
        self.view.theme = self.view.theme.toggled();
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view.view_mode = view_mode;
    }

    pub fn toggle_view_mode(&mut self) {
        self.view.view_mode = self.view.view_mode.toggled();
    }

    pub fn set_active_tab(&mut self, tab: ActiveTab) {
        self.view.active_tab = tab;
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.view.search_term = term.into();
    }

    pub fn set_selected_category(&mut self, category: impl Into<String>) {
        self.view.selected_category = category.into();
    }

    /// Items matching a search term and category, in collection order.
    #[must_use]
    pub fn filtered_items(&self, term: &str, category: &str) -> Vec<Item> {
        let needle = fold_case(term);
        self.items
            .iter()
            .filter(|item| item.matches_category(category) && item.matches_term(&needle))
            .cloned()
            .collect()
    }

    /// Items matching the current search term and category selection.
    #[must_use]
    pub fn visible_items(&self) -> Vec<Item> {
        self.filtered_items(&self.view.search_term, &self.view.selected_category)
    }

    /// Items grouped by location, groups in order of first appearance.
    ///
    /// Items without a location belong to no group.
    #[must_use]
    pub fn grouped_by_location(&self) -> Vec<LocationGroup> {
        let mut groups: Vec<LocationGroup> = Vec::new();

        for item in &self.items {
            let Some(location) = item.location_name() else {
                continue;
            };
            match groups.iter_mut().find(|group| group.location == location) {
                Some(group) => group.items.push(item.clone()),
                None => groups.push(LocationGroup {
                    location: location.to_string(),
                    items: vec![item.clone()],
                }),
            }
        }

        groups
    }

    #[must_use]
    pub fn items_at_location(&self, location: &str) -> Vec<Item> {
        let location = location.trim();
        self.items
            .iter()
            .filter(|item| item.location_name() == Some(location))
            .cloned()
            .collect()
    }

    /// Locations an item may be moved to: the fixed list, then any in use.
    #[must_use]
    pub fn known_locations(&self) -> Vec<String> {
        let mut locations: Vec<String> = LOCATIONS.iter().map(ToString::to_string).collect();
        for item in &self.items {
            if let Some(location) = item.location_name() {
                if !locations.iter().any(|known| known == location) {
                    locations.push(location.to_string());
                }
            }
        }
        locations
    }

    #[must_use]
    pub fn is_known_location(&self, location: &str) -> bool {
        let location = location.trim();
        LOCATIONS.contains(&location)
            || self
                .items
                .iter()
                .any(|item| item.location_name() == Some(location))
    }
}

/// Anything [`InventoryStore::add_item`] accepts.
#[derive(Debug, Clone)]
pub enum AddCandidate {
    Item(Item),
    Draft(ItemDraft),
}

impl From<Item> for AddCandidate {
    fn from(value: Item) -> Self {
        Self::Item(value)
    }
}

impl From<ItemDraft> for AddCandidate {
    fn from(value: ItemDraft) -> Self {
        Self::Draft(value)
    }
}

/// Cloneable handle to one [`InventoryStore`].
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<RwLock<InventoryStore>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new(InventoryStore::default())
    }
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SharedStore")
            .field("version", &*self.version.borrow())
            .field("items", &self.read(InventoryStore::len))
            .finish()
    }
}

impl SharedStore {
    #[must_use]
    pub fn new(store: InventoryStore) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(store)),
            version: Arc::new(version),
        }
    }

    /// Run a read-only closure against the current state.
    pub fn read<T>(&self, f: impl FnOnce(&InventoryStore) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Owned copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> InventoryStore {
        self.read(Clone::clone)
    }

    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        self.read(|store| store.items().to_vec())
    }

    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<Item> {
        self.read(|store| store.item(id).cloned())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read(InventoryStore::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read(InventoryStore::is_empty)
    }

    /// Receiver that changes every time the store is written.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Apply a view-preference intent. Items cannot be touched from here.
    pub fn update_view(&self, f: impl FnOnce(&mut ViewIntents<'_>)) {
        self.write(|store| f(&mut ViewIntents { store }));
    }

    /// Collection writes are reserved for the sync controller.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&mut InventoryStore) -> T) -> T {
        let result = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        };
        self.version.send_modify(|version| *version += 1);
        result
    }
}

/// Restricted mutable view exposing only preference intents.
pub struct ViewIntents<'a> {
    store: &'a mut InventoryStore,
}

impl ViewIntents<'_> {
    pub fn set_theme(&mut self, theme: Theme) {
        self.store.set_theme(theme);
    }

    pub fn toggle_theme(&mut self) {
        self.store.toggle_theme();
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.store.set_view_mode(view_mode);
    }

    pub fn toggle_view_mode(&mut self) {
        self.store.toggle_view_mode();
    }

    pub fn set_active_tab(&mut self, tab: ActiveTab) {
        self.store.set_active_tab(tab);
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.store.set_search_term(term);
    }

    pub fn set_selected_category(&mut self, category: impl Into<String>) {
        self.store.set_selected_category(category);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::ALL_CATEGORIES;

    fn item(id: i64, name: &str, category: &str, location: Option<&str>) -> Item {
        Item {
            id: ItemId::from(id),
            name: name.to_string(),
            category: category.to_string(),
            quantity: 1,
            location: location.map(ToString::to_string),
            description: None,
            image_url: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn sample() -> Vec<Item> {
        vec![
            item(1, "Pan", "Cookware", Some("Lower Cabinet")),
            item(2, "Ceramic Dinner Set", "Dinnerware", Some("Upper Cabinet")),
            item(3, "Spatula", "Utensils", Some("Drawer")),
            item(4, "Pot", "Cookware", Some("Lower Cabinet")),
            item(5, "Loose Lid", "Cookware", None),
            item(6, "Blank Spot", "Storage", Some("  ")),
        ]
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn filter_scenario_matches_name_case_insensitively() {
        let mut store = InventoryStore::new();
        store.set_items(vec![Item {
            quantity: 2,
            ..item(1, "Pan", "Cookware", Some("Lower Cabinet"))
        }]);

        assert_eq!(ids(&store.filtered_items("pan", ALL_CATEGORIES)), vec!["1"]);
        assert!(store.filtered_items("mug", ALL_CATEGORIES).is_empty());
    }

    #[test]
    fn unfiltered_view_is_identity_and_keeps_order() {
        let mut store = InventoryStore::new();
        store.set_items(sample());
        assert_eq!(store.filtered_items("", ALL_CATEGORIES), sample());
    }

    #[test]
    fn longer_search_terms_never_grow_the_result() {
        let mut store = InventoryStore::new();
        store.set_items(sample());

        let terms = ["", "p", "po", "pot"];
        let counts: Vec<usize> = terms
            .iter()
            .map(|term| store.filtered_items(term, ALL_CATEGORIES).len())
            .collect();
        assert!(counts.windows(2).all(|pair| pair[1] <= pair[0]), "{counts:?}");
    }

    #[test]
    fn search_folds_sigma_the_same_mid_word_and_at_the_end() {
        let mut store = InventoryStore::new();
        store.set_items(vec![item(1, "ΑΣΑ", "Other", None)]);

        let shorter = store.filtered_items("ΑΣ", ALL_CATEGORIES);
        let longer = store.filtered_items("ΑΣΑ", ALL_CATEGORIES);
        assert_eq!(ids(&longer), vec!["1"]);
        assert_eq!(ids(&shorter), vec!["1"]);
        assert_eq!(ids(&store.filtered_items("ασ", ALL_CATEGORIES)), vec!["1"]);
    }

    #[test]
    fn category_filter_is_exact_unless_all() {
        let mut store = InventoryStore::new();
        store.set_items(sample());

        assert_eq!(ids(&store.filtered_items("", "Cookware")), vec!["1", "4", "5"]);
        assert_eq!(ids(&store.filtered_items("pot", "Cookware")), vec!["4"]);
        assert!(store.filtered_items("", "cookware").is_empty());
    }

    #[test]
    fn visible_items_follow_view_state() {
        let mut store = InventoryStore::new();
        store.set_items(sample());
        store.set_search_term("CABINET");
        store.set_selected_category("Dinnerware");

        assert_eq!(ids(&store.visible_items()), vec!["2"]);
    }

    #[test]
    fn grouping_skips_items_without_location() {
        let mut store = InventoryStore::new();
        store.set_items(sample());

        let groups = store.grouped_by_location();
        let names: Vec<&str> = groups.iter().map(|group| group.location.as_str()).collect();
        assert_eq!(names, vec!["Lower Cabinet", "Upper Cabinet", "Drawer"]);
        assert_eq!(ids(&groups[0].items), vec!["1", "4"]);

        let mut grouped: Vec<&str> = groups
            .iter()
            .flat_map(|group| group.items.iter().map(|item| item.id.as_str()))
            .collect();
        grouped.sort_unstable();
        assert_eq!(grouped, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn items_at_location_matches_trimmed_name() {
        let mut store = InventoryStore::new();
        store.set_items(sample());
        assert_eq!(ids(&store.items_at_location(" Lower Cabinet ")), vec!["1", "4"]);
        assert!(store.items_at_location("Garage").is_empty());
    }

    #[test]
    fn add_item_appends_and_assigns_temporary_id() {
        let mut store = InventoryStore::new();
        store.set_items(sample());

        let id = store.add_item(ItemDraft::new("Bowl", "Dinnerware", 4, "Upper Cabinet"));
        assert!(id.is_temporary());
        assert_eq!(store.len(), 7);
        assert_eq!(store.items().last().map(|item| &item.id), Some(&id));
    }

    #[test]
    fn add_item_with_existing_id_replaces_in_place() {
        let mut store = InventoryStore::new();
        store.set_items(sample());

        let mut renamed = item(2, "Stoneware Set", "Dinnerware", Some("Upper Cabinet"));
        renamed.quantity = 8;
        store.add_item(renamed.clone());

        assert_eq!(store.len(), 6);
        assert_eq!(store.items()[1], renamed);
    }

    #[test]
    fn update_item_reports_missing_id() {
        let mut store = InventoryStore::new();
        store.set_items(sample());
        let before = store.clone();

        assert!(!store.update_item(item(99, "Ghost", "Storage", None)));
        assert_eq!(store, before);

        assert!(store.update_item(item(3, "Whisk", "Utensils", Some("Drawer"))));
        assert_eq!(store.item(&ItemId::from(3)).map(|item| item.name.as_str()), Some("Whisk"));
    }

    #[test]
    fn delete_item_is_idempotent() {
        let mut once = InventoryStore::new();
        once.set_items(sample());
        once.delete_item(&ItemId::from(3));

        let mut twice = once.clone();
        twice.delete_item(&ItemId::from(3));

        assert_eq!(once, twice);
        assert_eq!(once.len(), 5);
    }

    #[test]
    fn known_locations_include_catalogue_and_in_use() {
        let mut store = InventoryStore::new();
        store.set_items(vec![item(1, "Kettle", "Appliances", Some("Garage Shelf"))]);

        assert!(store.is_known_location("Pantry"));
        assert!(store.is_known_location("Garage Shelf"));
        assert!(!store.is_known_location("Attic"));

        let known = store.known_locations();
        assert_eq!(known.first().map(String::as_str), Some("Upper Cabinet"));
        assert_eq!(known.last().map(String::as_str), Some("Garage Shelf"));
        assert_eq!(known.len(), LOCATIONS.len() + 1);
    }

    #[test]
    fn view_intents_do_not_touch_items() {
        let shared = SharedStore::default();
        shared.write(|store| store.set_items(sample()));
        let before = shared.version();

        shared.update_view(|view| {
            view.toggle_theme();
            view.set_view_mode(ViewMode::List);
            view.set_active_tab(ActiveTab::Locations);
        });

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.view().theme, Theme::Dark);
        assert_eq!(snapshot.view().view_mode, ViewMode::List);
        assert_eq!(snapshot.view().active_tab, ActiveTab::Locations);
        assert_eq!(snapshot.items(), sample().as_slice());
        assert_eq!(shared.version(), before + 1);
    }
}
