use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kitchen_core::auth::AuthSession;
use kitchen_core::backend::{MemoryBackend, RemoteBackend, SupabaseBackend};
use kitchen_core::config::ClientConfig;
use kitchen_core::guard::{GuardDecision, Route, RouteGuard};
use kitchen_core::models::ViewMode;
use kitchen_core::store::LocationGroup;
use kitchen_core::{Item, ItemId, SharedStore, SyncController};
use serde::Serialize;

use crate::auth::SessionStore;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

/// Which backend a command talks to.
#[derive(Debug, Clone)]
pub enum BackendKind {
    Demo(MemoryBackend),
    Supabase(SupabaseBackend<SessionStore>),
}

/// Everything a data command needs: the resolved profile, its backend and
/// a controller feeding a fresh store.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub profile_name: String,
    pub backend: BackendKind,
    pub controller: SyncController,
}

impl AppContext {
    pub fn open(profile: Option<&str>, demo: bool) -> Result<Self, CliError> {
        if demo {
            return Ok(Self::demo());
        }

        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(profile);
        let client_config = resolve_client_config(&config, &profile_name)?;
        Self::supabase(profile_name, client_config)
    }

    pub fn demo() -> Self {
        Self::with_memory_backend(MemoryBackend::demo())
    }

    pub fn with_memory_backend(backend: MemoryBackend) -> Self {
        let remote: Arc<dyn RemoteBackend> = Arc::new(backend.clone());
        Self {
            profile_name: "demo".to_string(),
            backend: BackendKind::Demo(backend),
            controller: SyncController::new(remote, SharedStore::default()),
        }
    }

    pub fn supabase(profile_name: String, config: ClientConfig) -> Result<Self, CliError> {
        let bucket = config.storage_bucket.clone();
        let backend = SupabaseBackend::new(config, SessionStore::new(&profile_name))?;
        let remote: Arc<dyn RemoteBackend> = Arc::new(backend.clone());
        let controller = SyncController::with_image_bucket(remote, SharedStore::default(), bucket);
        Ok(Self {
            profile_name,
            backend: BackendKind::Supabase(backend),
            controller,
        })
    }

    pub fn store(&self) -> &SharedStore {
        self.controller.store()
    }

    pub fn supabase_backend(
        &self,
        command: &'static str,
    ) -> Result<&SupabaseBackend<SessionStore>, CliError> {
        match &self.backend {
            BackendKind::Supabase(backend) => Ok(backend),
            BackendKind::Demo(_) => Err(CliError::DemoUnsupported(command)),
        }
    }

    pub async fn session(&self) -> Result<Option<AuthSession>, CliError> {
        let session = match &self.backend {
            BackendKind::Demo(backend) => backend.current_session().await?,
            BackendKind::Supabase(backend) => backend.current_session().await?,
        };
        Ok(session)
    }

    /// Refuse to continue without a session when `route` needs one.
    pub async fn ensure_allowed(&self, route: &Route) -> Result<(), CliError> {
        let session = self.session().await?;
        match RouteGuard::check(session.as_ref(), route) {
            GuardDecision::Allow => Ok(()),
            GuardDecision::Redirect { from, .. } => Err(CliError::LoginRequired {
                from: from.path(),
            }),
        }
    }

    /// Guard `route`, then fill the store with the current remote rows.
    pub async fn load(&self, route: &Route) -> Result<(), CliError> {
        self.ensure_allowed(route).await?;
        self.controller
            .refresh()
            .await
            .map_err(|error| login_redirect(error, route))
    }

    pub fn find_item(&self, id: &ItemId) -> Result<Item, CliError> {
        self.store()
            .item(id)
            .ok_or_else(|| CliError::ItemNotFound(id.to_string()))
    }
}

/// A rejected token sends the user to sign in, remembering `route`.
pub fn login_redirect(error: kitchen_core::Error, route: &Route) -> CliError {
    if error.requires_login() {
        CliError::LoginRequired { from: route.path() }
    } else {
        CliError::Core(error)
    }
}

/// Profile settings win; the environment fills in for an unconfigured profile.
pub fn resolve_client_config(
    config: &CliProfilesConfig,
    profile_name: &str,
) -> Result<ClientConfig, CliError> {
    let from_profile = config
        .profile(profile_name)
        .map(|profile| profile.to_client_config())
        .transpose()
        .map_err(|error| CliError::Config(format!("Profile '{profile_name}': {error}")))?
        .flatten();
    if let Some(client_config) = from_profile {
        return Ok(client_config);
    }

    ClientConfig::from_env()?.ok_or(CliError::NotConfigured)
}

#[derive(Debug, Serialize)]
pub struct ItemListItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub relative_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LocationListItem {
    pub location: String,
    pub count: usize,
    pub items: Vec<ItemListItem>,
}

pub fn item_to_list_item(item: &Item) -> ItemListItem {
    let now_ms = Utc::now().timestamp_millis();
    ItemListItem {
        id: item.id.to_string(),
        name: item.name.clone(),
        category: item.category.clone(),
        quantity: item.quantity,
        location: item.location_name().map(ToString::to_string),
        description: item.description.clone(),
        image: item.display_image().map(ToString::to_string),
        updated_at: item.updated_at,
        relative_time: item
            .updated_at
            .map(|updated_at| format_relative_time(updated_at.timestamp_millis(), now_ms)),
    }
}

pub fn group_to_list_item(group: &LocationGroup) -> LocationListItem {
    LocationListItem {
        location: group.location.clone(),
        count: group.items.len(),
        items: group.items.iter().map(item_to_list_item).collect(),
    }
}

/// One line per item in grid mode; a header plus detail lines in list mode.
pub fn format_item_lines(items: &[Item], view_mode: ViewMode) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    let mut lines = Vec::new();
    for item in items {
        let location = item.location_name().unwrap_or("-");
        match view_mode {
            ViewMode::Grid => lines.push(format!(
                "{:<6}  {:<32}  x{:<4}  {:<12}  {}",
                item.id.as_str(),
                truncate(&item.name, 32),
                item.quantity,
                item.category,
                location
            )),
            ViewMode::List => {
                let updated = item.updated_at.map_or_else(String::new, |updated_at| {
                    format!("  ({})", format_relative_time(updated_at.timestamp_millis(), now_ms))
                });
                lines.push(format!("{}  {}{updated}", item.id, item.name));
                lines.push(format!(
                    "    {} | qty {} | {location}",
                    item.category, item.quantity
                ));
                if let Some(description) = item.description.as_deref() {
                    lines.push(format!("    {}", truncate(description, 72)));
                }
                if let Some(image) = item.display_image() {
                    lines.push(format!("    image: {image}"));
                }
            }
        }
    }
    lines
}

pub fn format_group_lines(groups: &[LocationGroup]) -> Vec<String> {
    let mut lines = Vec::new();
    for group in groups {
        lines.push(format!("{} ({})", group.location, group.items.len()));
        for item in &group.items {
            lines.push(format!(
                "  {:<6}  {}  x{}",
                item.id.as_str(),
                item.name,
                item.quantity
            ));
        }
    }
    lines
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_item_identifier(id: &str) -> Result<ItemId, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyItemId)
    } else {
        Ok(ItemId::new(trimmed))
    }
}

/// File bytes plus the name used to pick the stored extension and type.
pub fn read_image(path: &Path) -> Result<(Vec<u8>, String), CliError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map_or_else(|| "image".to_string(), |name| name.to_string_lossy().into_owned());
    Ok((bytes, name))
}
