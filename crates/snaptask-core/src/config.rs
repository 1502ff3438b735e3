use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

/// Environment variables that override
/// rc-file keys.
const ENV_OVERRIDES: &[(&str, &str)] = &[
  (
    "SNAPTASK_BACKEND_URL",
    "backend.url"
  ),
  (
    "SNAPTASK_BACKEND_ANON_KEY",
    "backend.anon_key"
  ),
  ("SNAPTASK_USER", "session.user"),
  (
    "SNAPTASK_ACCESS_TOKEN",
    "session.token"
  ),
  (
    "SNAPTASK_TOKEN_COMMAND",
    "session.token_command"
  )
];

const SECRET_KEYS: &[&str] = &[
  "backend.anon_key",
  "session.token",
  "session.token_command"
];

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  pub fn with_defaults() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    for (k, v) in [
      ("backend.table", "tasks"),
      ("backend.bucket", "tasks_image"),
      ("session.template", "supabase"),
      ("http.timeout_secs", "30"),
      ("default.command", "list"),
      ("color", "on")
    ] {
      cfg
        .map
        .insert(k.to_string(), v.to_string());
    }

    cfg
  }

  #[tracing::instrument(skip(
    rcfile_override
  ))]
  pub fn load(
    rcfile_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::with_defaults();

    let rcfile = resolve_rcfile_path(
      rcfile_override
    )?;
    if let Some(path) = rcfile {
      info!(rcfile = %path.display(), "loading rc file");
      cfg.load_file(&path, &mut vec![])?;
    } else {
      warn!(
        "no snaptaskrc found; using \
         defaults and environment"
      );
    }

    Ok(cfg)
  }

  /// Lifts the known `SNAPTASK_*`
  /// variables out of `vars` and onto
  /// their config keys.
  #[tracing::instrument(skip(
    self, vars
  ))]
  pub fn apply_env<I>(
    &mut self,
    vars: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (name, value) in vars {
      let Some((_, key)) = ENV_OVERRIDES
        .iter()
        .find(|(env, _)| *env == name)
      else {
        continue;
      };
      if value.trim().is_empty() {
        continue;
      }
      debug!(env = %name, key, "applying environment override");
      self
        .map
        .insert(key.to_string(), value);
    }
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self
      .map
      .get(key)
      .filter(|v| !v.trim().is_empty())
      .cloned()
  }

  /// Sorted key/value pairs with
  /// secrets masked, for `_show`.
  pub fn masked_entries(
    &self
  ) -> Vec<(String, String)> {
    let mut entries: Vec<_> = self
      .map
      .iter()
      .map(|(k, v)| {
        let shown = if SECRET_KEYS
          .contains(&k.as_str())
        {
          mask(v)
        } else {
          v.clone()
        };
        (k.clone(), shown)
      })
      .collect();
    entries.sort();
    entries
  }

  /// `including` holds the canonical
  /// paths of the files currently being
  /// read, outermost first.
  #[tracing::instrument(skip(
    self, including
  ))]
  fn load_file(
    &mut self,
    path: &Path,
    including: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let canonical = fs::canonicalize(&path)
      .unwrap_or_else(|_| path.clone());
    if including.contains(&canonical) {
      return Err(anyhow!(
        "include cycle at {}",
        path.display()
      ));
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once(" #")
      {
        line = before.trim();
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
          file = %path.display(),
          include = %include_path.display(),
          line = line_num + 1,
          "processing include"
        );

        if include_path.exists() {
          including.push(canonical.clone());
          let loaded = self.load_file(
            &include_path,
            including
          );
          including.pop();
          loaded?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

/// Where the backend lives and what it
/// is called. Built once at startup.
#[derive(Debug, Clone)]
pub struct BackendSettings {
  pub base_url: String,
  pub anon_key: String,
  pub table:    String,
  pub bucket:   String,
  pub timeout:  Duration
}

impl BackendSettings {
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let base_url = cfg
      .get("backend.url")
      .ok_or_else(|| {
        anyhow!(
          "backend.url is not set \
           (rc file or \
           SNAPTASK_BACKEND_URL)"
        )
      })?;
    let anon_key = cfg
      .get("backend.anon_key")
      .ok_or_else(|| {
        anyhow!(
          "backend.anon_key is not set \
           (rc file or \
           SNAPTASK_BACKEND_ANON_KEY)"
        )
      })?;

    if !base_url.starts_with("http://")
      && !base_url.starts_with("https://")
    {
      return Err(anyhow!(
        "backend.url must be an http(s) \
         URL, got: {base_url}"
      ));
    }

    let timeout_secs = cfg
      .get("http.timeout_secs")
      .map(|raw| {
        raw.parse::<u64>().with_context(
          || {
            format!(
              "invalid \
               http.timeout_secs: \
               {raw}"
            )
          }
        )
      })
      .transpose()?
      .unwrap_or(30);

    Ok(Self {
      base_url: base_url
        .trim_end_matches('/')
        .to_string(),
      anon_key,
      table: cfg
        .get("backend.table")
        .unwrap_or_else(|| {
          "tasks".to_string()
        }),
      bucket: cfg
        .get("backend.bucket")
        .unwrap_or_else(|| {
          "tasks_image".to_string()
        }),
      timeout: Duration::from_secs(
        timeout_secs
      )
    })
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rcfile_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("SNAPTASKRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    return Ok(None);
  };
  let candidate =
    home.join(".snaptaskrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn mask(value: &str) -> String {
  let visible: String =
    value.chars().take(4).collect();
  if value.chars().count() <= 4 {
    "****".to_string()
  } else {
    format!("{visible}****")
  }
}
