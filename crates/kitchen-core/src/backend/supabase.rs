//! Supabase-backed implementation of [`RemoteBackend`].
//!
//! Rows go through PostgREST, images through Supabase Storage, and sessions
//! through the GoTrue client. The change feed polls a cheap fingerprint of
//! the table (`id,updated_at`) and reports any movement as
//! [`ChangeKind::Unknown`]; the controller re-fetches on every event, so the
//! kind does not matter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};

use super::{
    ChangeEvent, ChangeKind, ChangeSubscription, ItemPatch, NewItemRow, RemoteBackend,
    StoredObject,
};
use crate::auth::{parse_api_error, AuthSession, SessionPersistence, SupabaseAuthClient};
use crate::config::ClientConfig;
use crate::models::{Item, ItemId};
use crate::{Error, Result};

const ITEMS_TABLE: &str = "items";
const PROFILES_TABLE: &str = "profiles";
const FEED_BUFFER: usize = 16;

/// Client for one Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseBackend<S: SessionPersistence> {
    config: ClientConfig,
    client: reqwest::Client,
    auth: SupabaseAuthClient<S>,
}

impl<S: SessionPersistence> SupabaseBackend<S> {
    pub fn new(config: ClientConfig, store: S) -> Result<Self> {
        let auth = SupabaseAuthClient::new(&config.supabase_url, &config.supabase_anon_key, store)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| Error::Config(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self {
            config,
            client,
            auth,
        })
    }

    #[must_use]
    pub const fn auth(&self) -> &SupabaseAuthClient<S> {
        &self.auth
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create or refresh the `profiles` row of a freshly signed-up user.
    pub async fn upsert_profile(
        &self,
        session: &AuthSession,
        full_name: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        let payload = serde_json::json!({
            "id": session.user.id,
            "full_name": full_name,
            "email": session.user.email,
            "created_at": now,
            "updated_at": now,
        });
        let request = self
            .rest_request(Method::POST, PROFILES_TABLE, &session.access_token)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&payload);
        send(request, "Profile upsert").await?;
        Ok(())
    }

    async fn access_token(&self) -> Result<String> {
        self.auth
            .current_session()
            .await?
            .map(|session| session.access_token)
            .ok_or_else(|| Error::Auth("Sign in to continue".to_string()))
    }

    fn rest_request(&self, method: Method, table: &str, access_token: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{table}", self.config.rest_url()))
            .header("apikey", &self.config.supabase_anon_key)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
    }

    fn watcher(&self) -> TableWatcher<S> {
        TableWatcher {
            backend: self.clone(),
            interval: self.config.poll_interval(),
        }
    }
}

#[async_trait]
impl<S: SessionPersistence> RemoteBackend for SupabaseBackend<S> {
    async fn current_session(&self) -> Result<Option<AuthSession>> {
        Ok(self.auth.current_session().await?)
    }

    fn session_changes(&self) -> watch::Receiver<Option<AuthSession>> {
        self.auth.subscribe()
    }

    async fn select_items(&self) -> Result<Vec<Item>> {
        let token = self.access_token().await?;
        let request = self
            .rest_request(Method::GET, ITEMS_TABLE, &token)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let response = send(request, "Item fetch").await?;
        parse_json(response, "Item fetch").await
    }

    async fn insert_item(&self, row: &NewItemRow) -> Result<Item> {
        let token = self.access_token().await?;
        let request = self
            .rest_request(Method::POST, ITEMS_TABLE, &token)
            .header("Prefer", "return=representation")
            .json(row);
        let response = send(request, "Item insert").await?;
        single_row(parse_json(response, "Item insert").await?, "Item insert")
    }

    async fn update_item(&self, id: &ItemId, patch: &ItemPatch) -> Result<Item> {
        let token = self.access_token().await?;
        let request = self
            .rest_request(Method::PATCH, ITEMS_TABLE, &token)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(patch);
        let response = send(request, "Item update").await?;
        let rows: Vec<Item> = parse_json(response, "Item update").await?;
        if rows.is_empty() {
            return Err(Error::Backend(format!("Item {id} not found")));
        }
        single_row(rows, "Item update")
    }

    async fn delete_item(&self, id: &ItemId) -> Result<()> {
        let token = self.access_token().await?;
        let request = self
            .rest_request(Method::DELETE, ITEMS_TABLE, &token)
            .query(&[("id", format!("eq.{id}"))]);
        send(request, "Item delete").await?;
        Ok(())
    }

    async fn subscribe_changes(&self) -> Result<ChangeSubscription> {
        let watcher = self.watcher();
        let baseline = watcher.fingerprint().await?;
        let (sender, receiver) = mpsc::channel(FEED_BUFFER);
        let producer = tokio::spawn(watcher.run(baseline, sender));
        Ok(ChangeSubscription::with_producer(receiver, producer))
    }

    async fn upload_object(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/object/{}/{}",
            self.config.storage_url(),
            urlencoding::encode(bucket),
            urlencoding::encode(name)
        );
        let response = self
            .client
            .post(url)
            .header("apikey", &self.config.supabase_anon_key)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|error| Error::Upload(format!("Upload request failed: {error}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upload(parse_api_error(status, &body)));
        }

        Ok(StoredObject {
            bucket: bucket.to_string(),
            name: name.to_string(),
            public_url: self.public_url(bucket, name),
        })
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.config.storage_url(),
            urlencoding::encode(bucket),
            urlencoding::encode(name)
        )
    }
}

/// Polls the items table and reports when its fingerprint moves.
struct TableWatcher<S: SessionPersistence> {
    backend: SupabaseBackend<S>,
    interval: Duration,
}

impl<S: SessionPersistence> TableWatcher<S> {
    async fn fingerprint(&self) -> Result<String> {
        let token = self.backend.access_token().await?;
        let request = self
            .backend
            .rest_request(Method::GET, ITEMS_TABLE, &token)
            .query(&[("select", "id,updated_at"), ("order", "id.asc")]);
        let response = send(request, "Change poll").await?;
        response
            .text()
            .await
            .map_err(|error| Error::Backend(format!("Change poll failed: {error}")))
    }

    async fn run(self, mut last: String, sender: mpsc::Sender<ChangeEvent>) {
        tracing::debug!(interval = ?self.interval, "Polling items table for changes");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if sender.is_closed() {
                break;
            }

            match self.fingerprint().await {
                Ok(current) if current != last => {
                    last = current;
                    let event = ChangeEvent::new(ChangeKind::Unknown, None);
                    if sender.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => tracing::warn!("Change poll failed: {}", error),
            }
        }
    }
}

async fn send(request: RequestBuilder, action: &str) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|error| Error::Backend(format!("{action} request failed: {error}")))?;
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = format!("{action} failed: {}", parse_api_error(status, &body));
    if status == reqwest::StatusCode::UNAUTHORIZED {
        Err(Error::Auth(message))
    } else {
        Err(Error::Backend(message))
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, action: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|error| Error::Backend(format!("{action} returned an unexpected payload: {error}")))
}

fn single_row(rows: Vec<Item>, action: &str) -> Result<Item> {
    rows.into_iter()
        .next()
        .ok_or_else(|| Error::Backend(format!("{action} returned no rows")))
}
