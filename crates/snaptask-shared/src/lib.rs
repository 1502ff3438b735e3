use std::collections::BTreeMap;

use serde::{
  Deserialize,
  Serialize
};

/// One row of the remote `tasks`
/// collection.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Task {
  pub id:        i64,
  pub name:      String,
  #[serde(default)]
  pub is_done:   bool,
  #[serde(default)]
  pub image_url: Option<String>,
  /// Columns the backend adds on its
  /// own (owner, timestamps).
  #[serde(flatten)]
  pub extra:
    BTreeMap<String, serde_json::Value>
}

impl Task {
  pub fn has_image(&self) -> bool {
    self
      .image_url
      .as_deref()
      .map(|url| !url.trim().is_empty())
      .unwrap_or(false)
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct NewTask {
  pub name:      String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub image_url: Option<String>
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskDonePatch {
  pub is_done: bool
}
