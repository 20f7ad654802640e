use kitchen_core::guard::Route;
use kitchen_core::models::{ActiveTab, ViewMode};
use kitchen_core::store::LocationGroup;

use crate::commands::common::{
    format_group_lines, format_item_lines, group_to_list_item, item_to_list_item, AppContext,
    ItemListItem, LocationListItem,
};
use crate::error::CliError;

pub async fn run_locations(
    context: &AppContext,
    name: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    if let Some(name) = name {
        let items = location_items(context, name).await?;
        if as_json {
            let json_items = items
                .iter()
                .map(item_to_list_item)
                .collect::<Vec<ItemListItem>>();
            println!("{}", serde_json::to_string_pretty(&json_items)?);
        } else if items.is_empty() {
            println!("Nothing stored at {}.", name.trim());
        } else {
            println!("{} ({})", name.trim(), items.len());
            for line in format_item_lines(&items, ViewMode::List) {
                println!("  {line}");
            }
        }
        return Ok(());
    }

    let groups = location_groups(context).await?;
    if as_json {
        let json_groups = groups
            .iter()
            .map(group_to_list_item)
            .collect::<Vec<LocationListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_groups)?);
    } else if groups.is_empty() {
        println!("No items have a location yet.");
    } else {
        for line in format_group_lines(&groups) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn location_groups(context: &AppContext) -> Result<Vec<LocationGroup>, CliError> {
    context.load(&Route::Organization).await?;
    context
        .store()
        .update_view(|view| view.set_active_tab(ActiveTab::Locations));
    Ok(context.store().read(|store| store.grouped_by_location()))
}

pub async fn location_items(
    context: &AppContext,
    name: &str,
) -> Result<Vec<kitchen_core::Item>, CliError> {
    context
        .load(&Route::Location(name.trim().to_string()))
        .await?;
    Ok(context.store().read(|store| store.items_at_location(name)))
}
