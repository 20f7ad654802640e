use std::future::Future;

use kitchen_core::guard::Route;
use kitchen_core::models::ViewMode;
use kitchen_core::LoadState;
use tracing::info;

use crate::commands::common::{format_item_lines, login_redirect, AppContext};
use crate::error::CliError;

/// Print the inventory, then reprint it on every store change until Ctrl-C.
pub async fn run_watch(context: &AppContext, view: Option<ViewMode>) -> Result<(), CliError> {
    watch_until(context, view, tokio::signal::ctrl_c()).await
}

/// Watch until `shutdown` resolves or the session ends.
pub async fn watch_until(
    context: &AppContext,
    view: Option<ViewMode>,
    shutdown: impl Future<Output = std::io::Result<()>>,
) -> Result<(), CliError> {
    context.ensure_allowed(&Route::Inventory).await?;
    let store = context.store().clone();
    if let Some(view_mode) = view {
        store.update_view(|intents| intents.set_view_mode(view_mode));
    }

    let mut versions = store.subscribe();
    let mut status = context.controller.status();
    let handle = context
        .controller
        .start()
        .await
        .map_err(|error| login_redirect(error, &Route::Inventory))?;
    info!(profile = %context.profile_name, "Watching inventory");
    versions.mark_unchanged();
    render(context);

    tokio::pin!(shutdown);
    let outcome = loop {
        tokio::select! {
            signal = &mut shutdown => break signal.map_err(CliError::from),
            changed = versions.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                render(context);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = status.borrow_and_update().clone();
                match state {
                    LoadState::Failed(message) => eprintln!("Refresh failed: {message}"),
                    LoadState::SignedOut => {
                        break Err(CliError::LoginRequired {
                            from: Route::Inventory.path(),
                        });
                    }
                    _ => {}
                }
            }
        }
    };

    handle.stop().await;
    println!("Stopped watching.");
    outcome
}

fn render(context: &AppContext) {
    let (items, view_mode) = context
        .store()
        .read(|store| (store.visible_items(), store.view().view_mode));
    println!();
    println!("{} item(s)", items.len());
    for line in format_item_lines(&items, view_mode) {
        println!("{line}");
    }
}
