pub mod cli;
pub mod commands;
pub mod config;
pub mod remote;
pub mod render;
pub mod session;
pub mod viewmodel;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::remote::RemoteClient;
use crate::session::{
  ConfiguredSession,
  SessionProvider
};
use crate::viewmodel::TaskViewModel;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting snaptask"
  );
  debug!(
    overrides = pre.rc_overrides.len(),
    "preprocessed rc overrides"
  );

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  cfg.apply_env(std::env::vars());
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  if commands::is_local_command(
    &inv.command
  ) {
    return commands::run_local(
      &cfg,
      &inv,
      io::stdout().lock()
    );
  }

  let backend =
    config::BackendSettings::from_config(
      &cfg
    )
    .context(
      "backend is not configured"
    )?;
  let session =
    ConfiguredSession::from_config(&cfg);
  let identity = session.identity();
  let client =
    RemoteClient::new(backend, session)?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let mut vm = TaskViewModel::new(client);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(commands::dispatch(
    &mut vm,
    identity,
    &renderer,
    inv,
    io::stdout().lock()
  ))?;

  info!("done");
  Ok(())
}
