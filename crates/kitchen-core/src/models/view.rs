//! View preferences: theme, layout, tab, and active filters.

use serde::{Deserialize, Serialize};

use super::item::ALL_CATEGORIES;

/// Colour theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Item layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Grid => Self::List,
            Self::List => Self::Grid,
        }
    }
}

/// Top-level inventory tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActiveTab {
    #[default]
    Items,
    Locations,
}

/// Process-wide view state. Never persisted, never synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub theme: Theme,
    pub view_mode: ViewMode,
    pub active_tab: ActiveTab,
    pub search_term: String,
    pub selected_category: String,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            view_mode: ViewMode::default(),
            active_tab: ActiveTab::default(),
            search_term: String::new(),
            selected_category: ALL_CATEGORIES.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_state_defaults() {
        let view = ViewState::default();
        assert_eq!(view.theme, Theme::Light);
        assert_eq!(view.view_mode, ViewMode::Grid);
        assert_eq!(view.active_tab, ActiveTab::Items);
        assert_eq!(view.selected_category, "All");
        assert!(view.search_term.is_empty());
    }

    #[test]
    fn toggles_flip_between_variants() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(ViewMode::Grid.toggled(), ViewMode::List);
        assert_eq!(ViewMode::List.toggled(), ViewMode::Grid);
    }
}
