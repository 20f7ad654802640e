use std::path::PathBuf;

use kitchen_core::guard::Route;
use kitchen_core::{Item, ItemDraft};
use tracing::warn;

use crate::commands::common::{read_image, AppContext};
use crate::error::CliError;

#[derive(Debug)]
pub struct AddOptions {
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub location: String,
    pub description: Option<String>,
    pub image: Option<PathBuf>,
}

pub async fn run_add(context: &AppContext, options: AddOptions) -> Result<(), CliError> {
    let item = add_item(context, options).await?;
    println!("{}", item.id);
    Ok(())
}

/// Create the item. An image that fails to upload is reported and skipped.
pub async fn add_item(context: &AppContext, options: AddOptions) -> Result<Item, CliError> {
    context.ensure_allowed(&Route::Manage).await?;

    let mut draft = ItemDraft::new(
        options.name,
        options.category,
        options.quantity,
        options.location,
    );
    if let Some(description) = options.description {
        draft = draft.with_description(description);
    }

    if let Some(path) = options.image {
        match upload(context, &path).await {
            Ok(url) => draft = draft.with_image_url(url),
            Err(error) => {
                warn!("Image upload failed: {}", error);
                eprintln!(
                    "Could not upload {}: {error}. Saving the item without an image.",
                    path.display()
                );
            }
        }
    }

    Ok(context.controller.create(draft).await?)
}

async fn upload(context: &AppContext, path: &std::path::Path) -> Result<String, CliError> {
    let (bytes, name) = read_image(path)?;
    Ok(context.controller.upload_image(bytes, &name).await?)
}
