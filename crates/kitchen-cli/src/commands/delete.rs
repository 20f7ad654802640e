use kitchen_core::guard::Route;
use kitchen_core::ItemId;

use crate::commands::common::{normalize_item_identifier, AppContext};
use crate::error::CliError;

pub async fn run_delete(context: &AppContext, id: &str) -> Result<(), CliError> {
    let deleted = delete_item(context, id).await?;
    println!("{deleted}");
    Ok(())
}

pub async fn delete_item(context: &AppContext, id: &str) -> Result<ItemId, CliError> {
    let id = normalize_item_identifier(id)?;
    context.load(&Route::Manage).await?;
    let item = context.find_item(&id)?;

    context.controller.remove(&item.id).await?;
    Ok(item.id)
}
