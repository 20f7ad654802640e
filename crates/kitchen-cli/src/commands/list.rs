use kitchen_core::guard::Route;
use kitchen_core::models::{ViewMode, ALL_CATEGORIES};
use kitchen_core::Item;

use crate::commands::common::{format_item_lines, item_to_list_item, AppContext, ItemListItem};
use crate::error::CliError;

#[derive(Debug, Default)]
pub struct ListOptions {
    pub search: Option<String>,
    pub category: Option<String>,
    pub view: Option<ViewMode>,
}

pub async fn run_list(
    context: &AppContext,
    options: ListOptions,
    as_json: bool,
) -> Result<(), CliError> {
    let items = list_items(context, options).await?;

    if as_json {
        let json_items = items
            .iter()
            .map(item_to_list_item)
            .collect::<Vec<ItemListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No items match.");
        return Ok(());
    }
    let view_mode = context.store().read(|store| store.view().view_mode);
    for line in format_item_lines(&items, view_mode) {
        println!("{line}");
    }
    Ok(())
}

/// Load the inventory and apply the requested filters through the view state.
pub async fn list_items(context: &AppContext, options: ListOptions) -> Result<Vec<Item>, CliError> {
    context.load(&Route::Inventory).await?;

    context.store().update_view(|view| {
        view.set_search_term(options.search.unwrap_or_default());
        view.set_selected_category(
            options
                .category
                .unwrap_or_else(|| ALL_CATEGORIES.to_string()),
        );
        if let Some(view_mode) = options.view {
            view.set_view_mode(view_mode);
        }
    });

    Ok(context.store().read(|store| store.visible_items()))
}
