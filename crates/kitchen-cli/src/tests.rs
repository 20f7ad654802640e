use std::collections::HashMap;

use kitchen_core::backend::{MemoryBackend, Operation};
use kitchen_core::guard::Route;
use kitchen_core::models::ViewMode;
use kitchen_core::{Error, Item};
use pretty_assertions::assert_eq;

use crate::commands::add::{add_item, AddOptions};
use crate::commands::auth_cmd::{login_destination, route_command};
use crate::commands::common::{
    format_group_lines, format_item_lines, format_relative_time, normalize_item_identifier,
    resolve_client_config, truncate, AppContext, BackendKind,
};
use crate::commands::config::{mask_secret, merge_profile, missing_fields, ProfileInput};
use crate::commands::delete::delete_item;
use crate::commands::edit::{edit_item, ItemChanges};
use crate::commands::list::{list_items, ListOptions};
use crate::commands::locations::{location_groups, location_items};
use crate::commands::upload::upload_item_image;
use crate::commands::watch::watch_until;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

fn ids(items: &[Item]) -> Vec<String> {
    items.iter().map(|item| item.id.to_string()).collect()
}

fn signed_out() -> AppContext {
    let backend = MemoryBackend::demo();
    backend.set_signed_in(false);
    AppContext::with_memory_backend(backend)
}

fn memory(context: &AppContext) -> MemoryBackend {
    match &context.backend {
        BackendKind::Demo(backend) => backend.clone(),
        BackendKind::Supabase(_) => panic!("expected demo backend"),
    }
}

fn add_options(name: &str) -> AddOptions {
    AddOptions {
        name: name.to_string(),
        category: "Utensils".to_string(),
        quantity: 2,
        location: "Drawer".to_string(),
        description: None,
        image: None,
    }
}

#[test]
fn format_relative_time_buckets() {
    let now = 1_700_000_000_000;
    assert_eq!(format_relative_time(now - 5_000, now), "just now");
    assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
    assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
    assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
}

#[test]
fn truncate_collapses_whitespace_and_marks_cut() {
    assert_eq!(truncate("  stock   pot ", 20), "stock pot");
    assert_eq!(truncate("Professional Cookware Set", 10), "Profess...");
}

#[test]
fn normalize_item_identifier_trims_and_rejects_empty() {
    assert_eq!(normalize_item_identifier(" 7 ").unwrap().as_str(), "7");
    assert!(matches!(
        normalize_item_identifier("  "),
        Err(CliError::EmptyItemId)
    ));
}

#[test]
fn grid_lines_are_one_per_item_and_list_lines_add_details() {
    let items = kitchen_core::backend::demo_items();
    let grid = format_item_lines(&items[..2], ViewMode::Grid);
    assert_eq!(grid.len(), 2);
    assert!(grid[0].starts_with("1 "));
    assert!(grid[0].contains("Lower Cabinet"));

    let list = format_item_lines(&items[..1], ViewMode::List);
    assert!(list.len() > 2);
    assert!(list[1].contains("Cookware | qty 5 | Lower Cabinet"));
}

#[test]
fn login_destination_falls_back_to_home() {
    assert_eq!(login_destination(None), Route::Home);
    assert_eq!(login_destination(Some("/recipes")), Route::Home);
    assert_eq!(login_destination(Some("/signup")), Route::Home);
    assert_eq!(
        login_destination(Some("/location/Upper%20Cabinet")),
        Route::Location("Upper Cabinet".to_string())
    );
}

#[test]
fn route_command_points_at_matching_subcommand() {
    assert_eq!(route_command(&Route::Inventory), "kitchen list");
    assert_eq!(
        route_command(&Route::Location("Pantry".to_string())),
        "kitchen locations --name \"Pantry\""
    );
}

#[test]
fn merge_profile_prefers_flags_then_env_then_existing() {
    let existing = CliProfile {
        supabase_url: Some("https://old.supabase.co".to_string()),
        supabase_anon_key: Some("old-key".to_string()),
        storage_bucket: Some("old-bucket".to_string()),
        poll_interval_secs: Some(10),
    };
    let env = HashMap::from([
        ("SUPABASE_ANON_KEY", "env-key".to_string()),
        ("KITCHEN_STORAGE_BUCKET", "env-bucket".to_string()),
    ]);
    let input = ProfileInput {
        supabase_url: Some(" https://new.supabase.co ".to_string()),
        ..ProfileInput::default()
    };

    let merged = merge_profile(input, &existing, |key| env.get(key).cloned()).unwrap();

    assert_eq!(
        merged,
        CliProfile {
            supabase_url: Some("https://new.supabase.co".to_string()),
            supabase_anon_key: Some("env-key".to_string()),
            storage_bucket: Some("env-bucket".to_string()),
            poll_interval_secs: Some(10),
        }
    );
}

#[test]
fn merge_profile_reads_web_style_env_names() {
    let env = HashMap::from([
        ("VITE_SUPABASE_URL", "https://web.supabase.co".to_string()),
        ("VITE_SUPABASE_ANON_KEY", "web-key".to_string()),
    ]);
    let merged = merge_profile(ProfileInput::default(), &CliProfile::default(), |key| {
        env.get(key).cloned()
    })
    .unwrap();
    assert!(missing_fields(&merged).is_empty());
}

#[test]
fn merge_profile_rejects_bad_values() {
    let no_env = |_: &str| None;
    let bad_url = ProfileInput {
        supabase_url: Some("project.supabase.co".to_string()),
        ..ProfileInput::default()
    };
    assert!(matches!(
        merge_profile(bad_url, &CliProfile::default(), no_env),
        Err(CliError::Config(_))
    ));

    let zero_interval = ProfileInput {
        poll_interval_secs: Some(0),
        ..ProfileInput::default()
    };
    assert!(matches!(
        merge_profile(zero_interval, &CliProfile::default(), no_env),
        Err(CliError::Config(_))
    ));
}

#[test]
fn mask_secret_hides_the_middle() {
    assert_eq!(mask_secret("short"), "*****");
    assert_eq!(mask_secret("eyJhbGciOiJIUzI1NiJ9.payload"), "eyJh...load");
}

#[test]
fn resolve_client_config_uses_profile_settings() {
    let mut config = CliProfilesConfig::default();
    *config.profile_mut_or_default("home") = CliProfile {
        supabase_url: Some("https://home.supabase.co".to_string()),
        supabase_anon_key: Some("anon".to_string()),
        storage_bucket: Some("pictures".to_string()),
        poll_interval_secs: None,
    };
    let resolved = resolve_client_config(&config, "home").unwrap();
    assert_eq!(resolved.supabase_url, "https://home.supabase.co");
    assert_eq!(resolved.storage_bucket, "pictures");

    config.profile_mut_or_default("broken").supabase_url =
        Some("https://broken.supabase.co".to_string());
    assert!(matches!(
        resolve_client_config(&config, "broken"),
        Err(CliError::Config(_))
    ));
}

#[tokio::test]
async fn list_returns_every_item_newest_first() {
    let context = AppContext::demo();
    let items = list_items(&context, ListOptions::default()).await.unwrap();
    assert_eq!(ids(&items), vec!["1", "2", "3", "4", "5", "6"]);
}

#[tokio::test]
async fn list_search_matches_any_field_case_insensitively() {
    let context = AppContext::demo();
    let options = ListOptions {
        search: Some("CABINET".to_string()),
        ..ListOptions::default()
    };
    let items = list_items(&context, options).await.unwrap();
    assert_eq!(ids(&items), vec!["1", "2", "4"]);
}

#[tokio::test]
async fn list_category_filter_is_exact_and_sets_view_mode() {
    let context = AppContext::demo();
    let options = ListOptions {
        category: Some("Utensils".to_string()),
        view: Some(ViewMode::List),
        ..ListOptions::default()
    };
    let items = list_items(&context, options).await.unwrap();
    assert_eq!(ids(&items), vec!["3"]);
    assert_eq!(
        context.store().read(|store| store.view().view_mode),
        ViewMode::List
    );
}

#[tokio::test]
async fn signed_out_commands_ask_for_login_with_origin() {
    let context = signed_out();

    let error = list_items(&context, ListOptions::default()).await.unwrap_err();
    assert!(matches!(
        error,
        CliError::LoginRequired { ref from } if from == "/inventory"
    ));

    let error = location_items(&context, "Upper Cabinet").await.unwrap_err();
    assert!(matches!(
        error,
        CliError::LoginRequired { ref from } if from == "/location/Upper%20Cabinet"
    ));
    assert_eq!(memory(&context).fetch_count(), 0);
}

#[tokio::test]
async fn locations_group_in_first_appearance_order() {
    let context = AppContext::demo();
    let groups = location_groups(&context).await.unwrap();
    let names = groups
        .iter()
        .map(|group| group.location.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["Lower Cabinet", "Upper Cabinet", "Drawer", "Pantry", "Countertop"]
    );
    assert_eq!(format_group_lines(&groups[1..2])[0], "Upper Cabinet (2)");
}

#[tokio::test]
async fn location_items_lists_only_that_location() {
    let context = AppContext::demo();
    let items = location_items(&context, " Upper Cabinet ").await.unwrap();
    assert_eq!(ids(&items), vec!["2", "4"]);
}

#[tokio::test]
async fn add_creates_one_item_with_next_id() {
    let context = AppContext::demo();
    let mut options = add_options("Whisk");
    options.description = Some("  balloon whisk ".to_string());

    let item = add_item(&context, options).await.unwrap();

    assert_eq!(item.id.as_str(), "7");
    assert_eq!(item.description.as_deref(), Some("balloon whisk"));
    assert_eq!(memory(&context).rows().len(), 7);
    assert_eq!(ids(&context.store().items()), vec!["7"]);
}

#[tokio::test]
async fn add_rejects_negative_quantity_before_the_backend() {
    let context = AppContext::demo();
    let mut options = add_options("Whisk");
    options.quantity = -1;

    let error = add_item(&context, options).await.unwrap_err();

    assert!(matches!(
        error,
        CliError::Core(Error::Validation {
            field: "quantity",
            ..
        })
    ));
    assert_eq!(memory(&context).insert_count(), 0);
}

#[tokio::test]
async fn add_with_image_attaches_uploaded_url() {
    let context = AppContext::demo();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("whisk.PNG");
    std::fs::write(&path, b"png-bytes").unwrap();
    let mut options = add_options("Whisk");
    options.image = Some(path);

    let item = add_item(&context, options).await.unwrap();

    let url = item.image_url.unwrap();
    let name = url.strip_prefix("memory://items/").unwrap();
    assert!(name.ends_with(".png"));
    assert_eq!(
        memory(&context).object("items", name),
        Some(b"png-bytes".to_vec())
    );
}

#[tokio::test]
async fn add_keeps_item_when_image_upload_fails() {
    let context = AppContext::demo();
    memory(&context).fail(Operation::Upload);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("whisk.jpg");
    std::fs::write(&path, b"jpg-bytes").unwrap();
    let mut options = add_options("Whisk");
    options.image = Some(path);

    let item = add_item(&context, options).await.unwrap();

    assert_eq!(item.image_url, None);
    assert_eq!(memory(&context).rows().len(), 7);
}

#[tokio::test]
async fn edit_applies_only_given_fields() {
    let context = AppContext::demo();
    let changes = ItemChanges {
        quantity: Some(0),
        location: Some("Pantry".to_string()),
        ..ItemChanges::default()
    };

    let updated = edit_item(&context, "3", changes).await.unwrap();

    assert_eq!(updated.name, "Kitchen Utensils Set");
    assert_eq!(updated.quantity, 0);
    assert_eq!(updated.location.as_deref(), Some("Pantry"));
    assert_eq!(context.store().item(&updated.id), Some(updated.clone()));
    let stored = memory(&context)
        .rows()
        .into_iter()
        .find(|row| row.id == updated.id)
        .unwrap();
    assert_eq!(stored.quantity, 0);
}

#[tokio::test]
async fn edit_requires_changes_and_an_existing_item() {
    let context = AppContext::demo();
    assert!(matches!(
        edit_item(&context, "3", ItemChanges::default()).await,
        Err(CliError::NothingToEdit)
    ));

    let changes = ItemChanges {
        name: Some("Ladle".to_string()),
        ..ItemChanges::default()
    };
    assert!(matches!(
        edit_item(&context, "99", changes).await,
        Err(CliError::ItemNotFound(ref id)) if id == "99"
    ));
}

#[tokio::test]
async fn edit_rejects_unknown_location() {
    let context = AppContext::demo();
    let changes = ItemChanges {
        location: Some("Garage".to_string()),
        ..ItemChanges::default()
    };
    let error = edit_item(&context, "1", changes).await.unwrap_err();
    assert!(matches!(
        error,
        CliError::Core(Error::Validation {
            field: "location",
            ..
        })
    ));
}

#[tokio::test]
async fn delete_removes_row_and_reports_missing_ids() {
    let context = AppContext::demo();

    let deleted = delete_item(&context, "5").await.unwrap();

    assert_eq!(deleted.as_str(), "5");
    assert_eq!(memory(&context).rows().len(), 5);
    assert_eq!(context.store().item(&deleted), None);
    assert!(matches!(
        delete_item(&context, "5").await,
        Err(CliError::ItemNotFound(_))
    ));
}

#[tokio::test]
async fn upload_attaches_image_to_existing_item() {
    let context = AppContext::demo();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pot.webp");
    std::fs::write(&path, b"webp").unwrap();

    let item = upload_item_image(&context, "1", &path).await.unwrap();

    assert!(item
        .image_url
        .as_deref()
        .is_some_and(|url| url.starts_with("memory://items/") && url.ends_with(".webp")));
    assert_eq!(context.store().item(&item.id), Some(item));
}

#[tokio::test]
async fn upload_of_empty_file_is_rejected() {
    let context = AppContext::demo();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.png");
    std::fs::write(&path, b"").unwrap();

    let error = upload_item_image(&context, "1", &path).await.unwrap_err();

    assert!(matches!(
        error,
        CliError::Core(Error::Validation { field: "image", .. })
    ));
}

#[tokio::test]
async fn watch_ends_with_login_prompt_when_the_session_ends() {
    let context = AppContext::demo();
    let backend = memory(&context);

    let sign_out = async {
        while backend.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        backend.set_signed_in(false);
    };
    let watching = watch_until(&context, None, std::future::pending());

    let (outcome, ()) = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        async { tokio::join!(watching, sign_out) },
    )
    .await
    .unwrap();

    assert!(matches!(
        outcome,
        Err(CliError::LoginRequired { ref from }) if from == "/inventory"
    ));
    assert_eq!(backend.subscriber_count(), 0);
    assert!(!context.controller.is_active());
}
