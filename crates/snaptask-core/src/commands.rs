use std::io::Write;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::remote::TaskBackend;
use crate::render::Renderer;
use crate::session::Identity;
use crate::viewmodel::{CreateOutcome, TaskViewModel, selection_from_paths};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "done",
        "undone",
        "delete",
        "whoami",
        "url",
        "_show",
        "_commands",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Commands that never talk to the backend and so run without one configured.
pub fn is_local_command(command: &str) -> bool {
    matches!(command, "_show" | "_commands" | "help" | "version")
}

#[instrument(skip(cfg, inv, out), fields(command = %inv.command))]
pub fn run_local<W: Write>(cfg: &Config, inv: &Invocation, mut out: W) -> anyhow::Result<()> {
    match inv.command.as_str() {
        "_show" => {
            for (key, value) in cfg.masked_entries() {
                writeln!(out, "{key}={value}")?;
            }
            Ok(())
        }
        "_commands" => {
            for name in known_command_names() {
                writeln!(out, "{name}")?;
            }
            Ok(())
        }
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("not a local command: {other}")),
    }
}

/// Runs one backend command against the view-model and draws the screen it
/// leaves behind.
#[instrument(skip(vm, identity, renderer, inv, out), fields(command = %inv.command))]
pub async fn dispatch<B, W>(
    vm: &mut TaskViewModel<B>,
    identity: Option<Identity>,
    renderer: &Renderer,
    inv: Invocation,
    mut out: W,
) -> anyhow::Result<()>
where
    B: TaskBackend,
    W: Write,
{
    debug!(args = ?inv.command_args, "dispatching command");

    match inv.command.as_str() {
        "whoami" => {
            match identity {
                Some(identity) => writeln!(out, "{identity}")?,
                None => writeln!(out, "Not signed in")?,
            }
            return Ok(());
        }
        "url" => {
            let key = inv
                .command_args
                .first()
                .ok_or_else(|| anyhow!("url requires an object key"))?;
            writeln!(out, "{}", vm.backend().public_url(key))?;
            return Ok(());
        }
        _ => {}
    }

    // Screen mount: the list is fetched as soon as the identity is known.
    // A failed load is logged by the view-model and the screen still renders.
    let _ = vm.on_identity(identity).await;

    match inv.command.as_str() {
        "list" => {}
        "add" => cmd_add(vm, &inv.command_args).await?,
        "done" => cmd_toggle(vm, &inv.command_args, true).await?,
        "undone" => cmd_toggle(vm, &inv.command_args, false).await?,
        "delete" => cmd_delete(vm, &inv.command_args).await?,
        other => return Err(anyhow!("unknown command: {other}")),
    }

    renderer.render_screen(&mut out, vm)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AddArgs {
    name: String,
    images: Vec<String>,
}

fn parse_add_args(args: &[String]) -> anyhow::Result<AddArgs> {
    let mut words = Vec::new();
    let mut images = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--image" || arg == "-i" {
            let path = iter
                .next()
                .ok_or_else(|| anyhow!("{arg} requires a file path"))?;
            images.push(path.clone());
        } else if let Some(path) = arg.strip_prefix("image:") {
            images.push(path.to_string());
        } else {
            words.push(arg.as_str());
        }
    }

    let name = words.join(" ").trim().to_string();
    if name.is_empty() {
        return Err(anyhow!("add requires a task name"));
    }

    Ok(AddArgs { name, images })
}

fn parse_task_id(args: &[String], command: &str) -> anyhow::Result<i64> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("{command} requires a task id"))?;
    raw.parse::<i64>()
        .with_context(|| format!("invalid task id: {raw}"))
}

#[instrument(skip(vm, args))]
async fn cmd_add<B: TaskBackend>(vm: &mut TaskViewModel<B>, args: &[String]) -> anyhow::Result<()> {
    info!("command add");
    let add = parse_add_args(args)?;

    vm.set_name(add.name);
    vm.select_files(selection_from_paths(&add.images));

    match vm.create().await {
        Ok(CreateOutcome::Created {
            object_key,
            upload_error,
            ..
        }) => {
            debug!(key = %object_key, upload_failed = upload_error.is_some(), "create finished");
        }
        Ok(CreateOutcome::Skipped(reason)) => {
            debug!(?reason, "create skipped");
        }
        Err(err) => {
            warn!(error = %err, "create did not complete");
        }
    }
    Ok(())
}

#[instrument(skip(vm, args))]
async fn cmd_toggle<B: TaskBackend>(
    vm: &mut TaskViewModel<B>,
    args: &[String],
    is_done: bool,
) -> anyhow::Result<()> {
    info!(is_done, "command toggle");
    let id = parse_task_id(args, if is_done { "done" } else { "undone" })?;
    if let Err(err) = vm.toggle_done(id, is_done).await {
        warn!(id, error = %err, "toggle did not complete");
    }
    Ok(())
}

#[instrument(skip(vm, args))]
async fn cmd_delete<B: TaskBackend>(vm: &mut TaskViewModel<B>, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");
    let id = parse_task_id(args, "delete")?;
    if let Err(err) = vm.delete(id).await {
        warn!(id, error = %err, "delete did not complete");
    }
    Ok(())
}

fn cmd_help<W: Write>(mut out: W) -> anyhow::Result<()> {
    writeln!(out, "usage: snaptask [options] <command> [args]")?;
    writeln!(out)?;
    writeln!(out, "  list                          show your tasks")?;
    writeln!(out, "  add <name> --image <file>     upload an image and create a task")?;
    writeln!(out, "  done <id>                     mark a task done")?;
    writeln!(out, "  undone <id>                   mark a task not done")?;
    writeln!(out, "  delete <id>                   remove a task")?;
    writeln!(out, "  whoami                        show the signed-in user")?;
    writeln!(out, "  url <key>                     public URL of an uploaded object")?;
    writeln!(out, "  _show                         effective configuration")?;
    writeln!(out)?;
    writeln!(out, "options: -v/-q, --rc key=value, --rcfile <path>, rc.key=value")?;
    Ok(())
}
