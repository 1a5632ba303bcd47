//! Typed client for the REST API.
//!
//! Reads go through a small query cache keyed by request path. A successful
//! mutation invalidates the paths it affects, so the next read refetches;
//! this is the same contract the web frontend relies on.

use std::collections::HashMap;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::inputs::{NewMemory, NewNote, NotePatch, PreferencePatch};
use crate::db::models::{Memory, Note, User, UserPreference};
use crate::error::ErrorBody;
use crate::routes::dashboard::DashboardSnapshot;

pub const NOTES: &str = "/api/notes";
pub const MEMORIES: &str = "/api/memories";
pub const PREFERENCES: &str = "/api/preferences";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            ClientError::Decode(_) => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

pub struct TogetherClient {
    http: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<String, Value>>,
}

impl TogetherClient {
    /// Client with its own cookie jar. Redirects are not followed so the
    /// session cookie from `/api/login` is observed directly.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::with_http(base_url, http))
    }

    /// Use a preconfigured `reqwest::Client`, e.g. one that sends identity headers.
    pub fn with_http(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // -- Session --

    /// Exchange the forwarded identity for a session cookie.
    pub async fn login(&self) -> ClientResult<()> {
        let res = self.http.get(self.url("/api/login")).send().await?;
        if res.status() == StatusCode::SEE_OTHER {
            return Ok(());
        }
        check(res).await.map(|_| ())
    }

    pub async fn logout(&self) -> ClientResult<()> {
        let res = self.http.post(self.url("/api/logout")).send().await?;
        self.cache.lock().await.clear();
        if res.status() == StatusCode::SEE_OTHER {
            return Ok(());
        }
        check(res).await.map(|_| ())
    }

    /// The signed-in user, or `None` when unauthenticated.
    pub async fn current_user(&self) -> ClientResult<Option<User>> {
        let res = self.http.get(self.url("/api/auth/user")).send().await?;
        if res.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        Ok(Some(check(res).await?.json().await?))
    }

    // -- Notes --

    /// Notes, newest first. Empty when unauthenticated.
    pub async fn notes(&self) -> ClientResult<Vec<Note>> {
        let value = self.query(NOTES).await?;
        Ok(value
            .map(serde_json::from_value::<Vec<Note>>)
            .transpose()?
            .unwrap_or_default())
    }

    pub async fn create_note(&self, note: &NewNote) -> ClientResult<Note> {
        let note = self.send(reqwest::Method::POST, NOTES, note).await?;
        self.invalidate(NOTES).await;
        Ok(note)
    }

    pub async fn update_note(&self, id: i64, patch: &NotePatch) -> ClientResult<Note> {
        let path = format!("{}/{}", NOTES, id);
        let note = self.send(reqwest::Method::PUT, &path, patch).await?;
        self.invalidate(NOTES).await;
        Ok(note)
    }

    pub async fn delete_note(&self, id: i64) -> ClientResult<()> {
        self.remove(&format!("{}/{}", NOTES, id)).await?;
        self.invalidate(NOTES).await;
        Ok(())
    }

    // -- Memories --

    /// Memories, most recent first. Empty when unauthenticated.
    pub async fn memories(&self) -> ClientResult<Vec<Memory>> {
        let value = self.query(MEMORIES).await?;
        Ok(value
            .map(serde_json::from_value::<Vec<Memory>>)
            .transpose()?
            .unwrap_or_default())
    }

    pub async fn create_memory(&self, memory: &NewMemory) -> ClientResult<Memory> {
        let memory = self.send(reqwest::Method::POST, MEMORIES, memory).await?;
        self.invalidate(MEMORIES).await;
        Ok(memory)
    }

    pub async fn delete_memory(&self, id: i64) -> ClientResult<()> {
        self.remove(&format!("{}/{}", MEMORIES, id)).await?;
        self.invalidate(MEMORIES).await;
        Ok(())
    }

    // -- Preferences --

    /// Saved preferences. `None` before the first save or when unauthenticated.
    pub async fn preferences(&self) -> ClientResult<Option<UserPreference>> {
        match self.query(PREFERENCES).await? {
            Some(value) if !is_empty_object(&value) => Ok(Some(serde_json::from_value(value)?)),
            _ => Ok(None),
        }
    }

    pub async fn update_preferences(&self, patch: &PreferencePatch) -> ClientResult<UserPreference> {
        let prefs = self.send(reqwest::Method::PUT, PREFERENCES, patch).await?;
        self.invalidate(PREFERENCES).await;
        Ok(prefs)
    }

    // -- Dashboard --

    /// Uncached: the clocks move every second.
    pub async fn dashboard(&self, tz: Option<&str>) -> ClientResult<DashboardSnapshot> {
        let mut req = self.http.get(self.url("/api/dashboard"));
        if let Some(tz) = tz {
            req = req.query(&[("tz", tz)]);
        }
        Ok(check(req.send().await?).await?.json().await?)
    }

    /// Whether a read for `path` would be served from cache.
    pub async fn is_cached(&self, path: &str) -> bool {
        self.cache.lock().await.contains_key(path)
    }

    pub async fn invalidate(&self, path: &str) {
        self.cache.lock().await.remove(path);
    }

    // -- Plumbing --

    /// Cached GET. `None` on 401, which is not cached.
    async fn query(&self, path: &str) -> ClientResult<Option<Value>> {
        if let Some(value) = self.cache.lock().await.get(path) {
            return Ok(Some(value.clone()));
        }

        let res = self.http.get(self.url(path)).send().await?;
        if res.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        let value: Value = check(res).await?.json().await?;

        self.cache
            .lock()
            .await
            .insert(path.to_string(), value.clone());
        Ok(Some(value))
    }

    async fn send<B, T>(&self, method: reqwest::Method, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let res = self
            .http
            .request(method, self.url(path))
            .json(body)
            .send()
            .await?;
        Ok(check(res).await?.json().await?)
    }

    async fn remove(&self, path: &str) -> ClientResult<()> {
        let res = self.http.delete(self.url(path)).send().await?;
        check(res).await.map(|_| ())
    }
}

async fn check(res: Response) -> ClientResult<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);
    Err(ClientError::Api { status, message })
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|map| map.is_empty())
}
