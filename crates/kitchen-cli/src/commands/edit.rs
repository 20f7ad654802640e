use kitchen_core::guard::Route;
use kitchen_core::Item;

use crate::commands::common::{normalize_item_identifier, AppContext};
use crate::error::CliError;

#[derive(Debug, Default)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<u32>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl ItemChanges {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.quantity.is_none()
            && self.location.is_none()
            && self.description.is_none()
    }

    fn apply(self, mut item: Item) -> Item {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(location) = self.location {
            item.location = Some(location);
        }
        if let Some(description) = self.description {
            item.description = Some(description);
        }
        item
    }
}

pub async fn run_edit(context: &AppContext, id: &str, changes: ItemChanges) -> Result<(), CliError> {
    let updated = edit_item(context, id, changes).await?;
    println!("{}", updated.id);
    Ok(())
}

pub async fn edit_item(
    context: &AppContext,
    id: &str,
    changes: ItemChanges,
) -> Result<Item, CliError> {
    let id = normalize_item_identifier(id)?;
    if changes.is_empty() {
        return Err(CliError::NothingToEdit);
    }

    context.load(&Route::Manage).await?;
    let item = context.find_item(&id)?;
    Ok(context.controller.update(changes.apply(item)).await?)
}
