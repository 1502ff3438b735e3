use std::path::{Path, PathBuf};

use snaptask_shared::{NewTask, Task};
use tracing::{debug, error, info, instrument, warn};

use crate::remote::{RemoteError, TaskBackend, Upload, new_object_key};
use crate::session::Identity;

pub const ACCEPTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading,
    Loaded,
}

/// A file picked in the creation form. Bytes are read at upload time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
}

impl SelectedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    pub fn is_image(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ACCEPTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }

    pub fn content_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            _ => "application/octet-stream",
        }
    }

    /// Local URL for showing the file before it is uploaded.
    pub fn preview_url(&self) -> String {
        let absolute = if self.path.is_absolute() {
            self.path.clone()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&self.path))
                .unwrap_or_else(|_| self.path.clone())
        };
        reqwest::Url::from_file_path(&absolute)
            .map(String::from)
            .unwrap_or_else(|()| format!("file://{}", absolute.display()))
    }

    pub async fn read(&self) -> Result<Upload, RemoteError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| RemoteError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(Upload {
            bytes,
            content_type: self.content_type().to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoFile,
    NoIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Skipped(SkipReason),
    Created {
        object_key: String,
        image_url: String,
        /// Set when the image upload failed; the task was inserted anyway.
        upload_error: Option<String>,
    },
}

/// State of the task screen and the actions a user can take on it.
///
/// Every mutation is followed by a full re-fetch; the list is only ever
/// replaced wholesale.
pub struct TaskViewModel<B> {
    backend: B,
    identity: Option<Identity>,
    phase: Phase,
    loading: bool,
    tasks: Vec<Task>,
    name: String,
    file: Option<SelectedFile>,
    preview_url: Option<String>,
    file_type_error: bool,
}

impl<B: TaskBackend> TaskViewModel<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            identity: None,
            phase: Phase::Uninitialized,
            loading: true,
            tasks: vec![],
            name: String::new(),
            file: None,
            preview_url: None,
            file_type_error: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview_url.as_deref()
    }

    pub fn file_type_error(&self) -> bool {
        self.file_type_error
    }

    /// Records the identity and, once there is one, loads the list.
    #[instrument(skip(self, identity), fields(signed_in = identity.is_some()))]
    pub async fn on_identity(&mut self, identity: Option<Identity>) -> Result<(), RemoteError> {
        self.identity = identity;
        if self.identity.is_none() {
            debug!("no identity yet; not loading tasks");
            return Ok(());
        }
        self.load().await
    }

    /// Fetches the list. On failure the previous list is kept.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<(), RemoteError> {
        self.loading = true;
        self.phase = Phase::Loading;

        let result = match self.backend.list_tasks().await {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded tasks");
                self.tasks = tasks;
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to load tasks");
                Err(err)
            }
        };

        self.loading = false;
        self.phase = Phase::Loaded;
        result
    }

    /// Re-fetches after a mutation. Without an identity there is nothing to
    /// fetch.
    pub async fn reload(&mut self) -> Result<(), RemoteError> {
        if self.identity.is_none() {
            debug!("reload skipped; no identity");
            return Ok(());
        }
        self.load().await
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Handles a change of the file picker. Only the first file is used.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub fn select_files(&mut self, files: Vec<SelectedFile>) {
        let Some(first) = files.into_iter().next() else {
            self.file = None;
            self.preview_url = None;
            return;
        };

        if !first.is_image() {
            warn!(path = %first.path.display(), "selected file is not an accepted image type");
            self.file_type_error = true;
            self.file = None;
            self.preview_url = None;
            return;
        }

        self.file_type_error = false;
        self.preview_url = Some(first.preview_url());
        debug!(path = %first.path.display(), "file selected");
        self.file = Some(first);
    }

    /// Uploads the selected image, inserts a task that points at it and
    /// reloads.
    ///
    /// An upload failure does not stop the insert; it is reported in the
    /// outcome.
    #[instrument(skip(self), fields(name_len = self.name.len()))]
    pub async fn create(&mut self) -> Result<CreateOutcome, RemoteError> {
        let Some(file) = self.file.clone() else {
            warn!("no file selected; not creating task");
            return Ok(CreateOutcome::Skipped(SkipReason::NoFile));
        };
        if self.identity.is_none() {
            warn!("user is not signed in; not creating task");
            return Ok(CreateOutcome::Skipped(SkipReason::NoIdentity));
        }

        let object_key = new_object_key();
        let uploaded = match file.read().await {
            Ok(upload) => self.backend.upload_object(&object_key, &upload).await,
            Err(err) => Err(err),
        };
        let upload_error = uploaded.err().map(|err| {
            warn!(key = %object_key, error = %err, "image upload failed; creating task anyway");
            err.to_string()
        });

        let image_url = self.backend.public_url(&object_key);
        let new_task = NewTask {
            name: self.name.clone(),
            image_url: Some(image_url.clone()),
        };
        let inserted = self.backend.insert_task(&new_task).await;
        if let Err(err) = &inserted {
            error!(error = %err, "failed to insert task");
        } else {
            info!(key = %object_key, "task created");
        }

        self.clear_form();
        let reloaded = self.reload().await;
        inserted?;
        reloaded?;

        Ok(CreateOutcome::Created {
            object_key,
            image_url,
            upload_error,
        })
    }

    /// Row actions need a signed-in user, like the rows they act on.
    #[instrument(skip(self))]
    pub async fn toggle_done(&mut self, id: i64, is_done: bool) -> Result<(), RemoteError> {
        if self.identity.is_none() {
            warn!(id, "user is not signed in; not updating task");
            return Ok(());
        }
        let updated = self.backend.update_task_done(id, is_done).await;
        if let Err(err) = &updated {
            error!(id, error = %err, "failed to update task");
        }
        let reloaded = self.reload().await;
        updated?;
        reloaded
    }

    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: i64) -> Result<(), RemoteError> {
        if self.identity.is_none() {
            warn!(id, "user is not signed in; not deleting task");
            return Ok(());
        }
        let deleted = self.backend.delete_task(id).await;
        if let Err(err) = &deleted {
            error!(id, error = %err, "failed to delete task");
        }
        let reloaded = self.reload().await;
        deleted?;
        reloaded
    }

    fn clear_form(&mut self) {
        self.name.clear();
        self.file = None;
        self.preview_url = None;
        self.file_type_error = false;
    }
}

/// Files named on a command line, as a picker would hand them over.
pub fn selection_from_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<SelectedFile> {
    paths
        .iter()
        .map(|path| SelectedFile::new(path.as_ref()))
        .collect()
}
