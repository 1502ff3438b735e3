#![allow(dead_code)]

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use snaptask_core::remote::{RemoteError, TaskBackend, Upload};
use snaptask_core::session::Identity;
use snaptask_shared::{NewTask, Task};

pub const PUBLIC_BASE: &str = "https://demo.example.co/storage/v1/object/public/tasks_image";

#[derive(Debug, Default)]
pub struct FakeState {
    pub rows: Vec<Task>,
    pub next_id: i64,
    pub calls: Vec<String>,
    pub objects: BTreeMap<String, Upload>,
    pub fail_list: bool,
    pub fail_upload: bool,
    pub fail_insert: bool,
    pub fail_update: bool,
    pub fail_delete: bool,
}

/// In-memory stand-in for the hosted collection and bucket.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn with_rows(rows: Vec<Task>) -> Self {
        let next_id = rows.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        Self {
            state: Mutex::new(FakeState {
                rows,
                next_id,
                ..FakeState::default()
            }),
        }
    }

    pub fn rows(&self) -> Vec<Task> {
        self.state.lock().rows.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.state.lock().fail_list = fail;
    }

    pub fn set_fail_upload(&self, fail: bool) {
        self.state.lock().fail_upload = fail;
    }

    pub fn set_fail_insert(&self, fail: bool) {
        self.state.lock().fail_insert = fail;
    }

    pub fn set_fail_update(&self, fail: bool) {
        self.state.lock().fail_update = fail;
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.state.lock().fail_delete = fail;
    }
}

fn rejected(method: Method, what: &str) -> RemoteError {
    RemoteError::Status {
        method,
        url: format!("fake://{what}"),
        status: 500,
        body: "boom".to_string(),
    }
}

#[async_trait]
impl TaskBackend for FakeBackend {
    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push("list".to_string());
        if state.fail_list {
            return Err(rejected(Method::GET, "tasks"));
        }
        Ok(state.rows.clone())
    }

    async fn insert_task(&self, task: &NewTask) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(format!("insert {}", task.name));
        if state.fail_insert {
            return Err(rejected(Method::POST, "tasks"));
        }
        let id = state.next_id.max(1);
        state.next_id = id + 1;
        state.rows.push(Task {
            id,
            name: task.name.clone(),
            is_done: false,
            image_url: task.image_url.clone(),
            extra: BTreeMap::new(),
        });
        Ok(())
    }

    async fn update_task_done(&self, id: i64, is_done: bool) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(format!("update {id} {is_done}"));
        if state.fail_update {
            return Err(rejected(Method::PATCH, "tasks"));
        }
        for row in state.rows.iter_mut().filter(|row| row.id == id) {
            row.is_done = is_done;
        }
        Ok(())
    }

    async fn delete_task(&self, id: i64) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(format!("delete {id}"));
        if state.fail_delete {
            return Err(rejected(Method::DELETE, "tasks"));
        }
        state.rows.retain(|row| row.id != id);
        Ok(())
    }

    async fn upload_object(&self, key: &str, upload: &Upload) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(format!("upload {key}"));
        if state.fail_upload {
            return Err(rejected(Method::POST, key));
        }
        state.objects.insert(key.to_string(), upload.clone());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{PUBLIC_BASE}/{key}")
    }
}

pub fn task(id: i64, name: &str, is_done: bool) -> Task {
    Task {
        id,
        name: name.to_string(),
        is_done,
        image_url: Some(format!("{PUBLIC_BASE}/img-{id}")),
        extra: BTreeMap::new(),
    }
}

pub fn alice() -> Identity {
    Identity {
        user_id: "user_alice".to_string(),
        email: Some("alice@example.com".to_string()),
    }
}
