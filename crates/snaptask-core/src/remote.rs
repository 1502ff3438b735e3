use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use snaptask_shared::{NewTask, Task, TaskDonePatch};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::BackendSettings;
use crate::session::{SessionError, SessionProvider};

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("could not obtain access token: {0}")]
    Session(#[from] SessionError),
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bytes of one object to upload, with the content type the store records.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// The remote collection and object store, as the view-model uses them.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Every task visible to the current identity, in backend order.
    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError>;

    async fn insert_task(&self, task: &NewTask) -> Result<(), RemoteError>;

    async fn update_task_done(&self, id: i64, is_done: bool) -> Result<(), RemoteError>;

    async fn delete_task(&self, id: i64) -> Result<(), RemoteError>;

    async fn upload_object(&self, key: &str, upload: &Upload) -> Result<(), RemoteError>;

    /// Public URL for `key`. Pure derivation, the object need not exist.
    fn public_url(&self, key: &str) -> String;
}

/// Random key for a new object in the bucket.
pub fn new_object_key() -> String {
    Uuid::new_v4().to_string()
}

/// HTTP client for a PostgREST collection plus a storage bucket.
pub struct RemoteClient<S> {
    settings: BackendSettings,
    session: S,
    http: Client,
}

impl<S: SessionProvider> RemoteClient<S> {
    pub fn new(settings: BackendSettings, session: S) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed building HTTP client for backend")?;

        info!(
            base_url = %settings.base_url,
            table = %settings.table,
            bucket = %settings.bucket,
            "remote client ready"
        );

        Ok(Self {
            settings,
            session,
            http,
        })
    }

    fn table_url(&self, query: &str) -> String {
        let mut url = format!("{}/rest/v1/{}", self.settings.base_url, self.settings.table);
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.settings.base_url, self.settings.bucket, key
        )
    }

    /// Attaches a freshly minted token and the project key. Every request
    /// goes through here.
    async fn sign(&self, request: RequestBuilder) -> Result<RequestBuilder, RemoteError> {
        let token = self.session.access_token().await?;
        Ok(request
            .bearer_auth(token)
            .header("apikey", &self.settings.anon_key))
    }

    #[instrument(skip(self, build), fields(method = %method, url = %url))]
    async fn send(
        &self,
        method: Method,
        url: String,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder + Send,
    ) -> Result<Response, RemoteError> {
        let request = build(self.http.request(method.clone(), &url));
        let request = self.sign(request).await?;

        let response = request
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                method: method.clone(),
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "backend request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "backend request rejected");
        Err(RemoteError::Status {
            method,
            url,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl<S: SessionProvider> TaskBackend for RemoteClient<S> {
    #[instrument(skip(self))]
    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        let url = self.table_url("select=*");
        let response = self.send(Method::GET, url.clone(), |req| req).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| RemoteError::Transport {
                method: Method::GET,
                url: url.clone(),
                source,
            })?;

        let tasks: Vec<Task> =
            serde_json::from_slice(&bytes).map_err(|source| RemoteError::Decode { url, source })?;
        debug!(count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    #[instrument(skip(self, task), fields(name_len = task.name.len(), has_image = task.image_url.is_some()))]
    async fn insert_task(&self, task: &NewTask) -> Result<(), RemoteError> {
        let url = self.table_url("");
        self.send(Method::POST, url, |req| {
            req.header("Prefer", "return=minimal").json(task)
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_task_done(&self, id: i64, is_done: bool) -> Result<(), RemoteError> {
        let url = self.table_url(&format!("id=eq.{id}"));
        let patch = TaskDonePatch { is_done };
        self.send(Method::PATCH, url, |req| {
            req.header("Prefer", "return=minimal").json(&patch)
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, id: i64) -> Result<(), RemoteError> {
        let url = self.table_url(&format!("id=eq.{id}"));
        self.send(Method::DELETE, url, |req| req).await?;
        Ok(())
    }

    #[instrument(skip(self, upload), fields(bytes = upload.bytes.len(), content_type = %upload.content_type))]
    async fn upload_object(&self, key: &str, upload: &Upload) -> Result<(), RemoteError> {
        let url = self.object_url(key);
        let body = upload.bytes.clone();
        let content_type = upload.content_type.clone();
        self.send(Method::POST, url, move |req| {
            req.header(CONTENT_TYPE, content_type)
                .header(CACHE_CONTROL, "max-age=3600")
                .header("x-upsert", "false")
                .body(body)
        })
        .await?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.settings.base_url, self.settings.bucket, key
        )
    }
}
