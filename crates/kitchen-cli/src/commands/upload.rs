use std::path::Path;

use kitchen_core::guard::Route;
use kitchen_core::Item;

use crate::commands::common::{normalize_item_identifier, read_image, AppContext};
use crate::error::CliError;

pub async fn run_upload(context: &AppContext, id: &str, path: &Path) -> Result<(), CliError> {
    let item = upload_item_image(context, id, path).await?;
    if let Some(url) = item.image_url.as_deref() {
        println!("{url}");
    }
    Ok(())
}

/// Upload `path` and point item `id` at it.
pub async fn upload_item_image(
    context: &AppContext,
    id: &str,
    path: &Path,
) -> Result<Item, CliError> {
    let id = normalize_item_identifier(id)?;
    context.load(&Route::Manage).await?;
    let item = context.find_item(&id)?;

    let (bytes, name) = read_image(path)?;
    let url = context.controller.upload_image(bytes, &name).await?;
    Ok(context.controller.attach_image(&item.id, url).await?)
}
