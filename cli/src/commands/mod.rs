//! CLI surface: a thin `clap` wrapper dispatching to the `gbox-server` HTTP
//! API through [`crate::client::Client`].

mod archive;
mod create;
mod exec;
mod ls;
mod reclaim;
mod rm;
mod run;
mod start;
mod stop;

use clap::{Parser, Subcommand};

use crate::client::Client;

#[derive(Debug, Parser)]
#[command(name = "gbox", version, about = "Control plane client for gbox sandboxes")]
pub struct Cli {
    /// Control-plane base URL. Defaults to `$GBOX_HOST` or
    /// `http://127.0.0.1:28080`.
    #[arg(long, global = true)]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new box.
    Create(create::CreateArgs),
    /// List boxes.
    Ls(ls::LsArgs),
    /// Remove one or all boxes.
    Rm(rm::RmArgs),
    /// Start a stopped box.
    Start(start::StartArgs),
    /// Stop a running box.
    Stop(stop::StopArgs),
    /// Attach an interactive exec session to a box.
    Exec(exec::ExecArgs),
    /// Run a command in a box and wait for it to finish.
    Run(run::RunArgs),
    /// Copy files to/from a box as a tar archive.
    #[command(subcommand)]
    Archive(archive::ArchiveCommand),
    /// Trigger an out-of-band reclamation pass.
    Reclaim,
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let client = Client::new(cli.host);

    match cli.command {
        Command::Create(args) => create::run(&client, args).await,
        Command::Ls(args) => ls::run(&client, args).await,
        Command::Rm(args) => rm::run(&client, args).await,
        Command::Start(args) => start::run(&client, args).await,
        Command::Stop(args) => stop::run(&client, args).await,
        Command::Exec(args) => exec::run(&client, args).await,
        Command::Run(args) => run::run(&client, args).await,
        Command::Archive(cmd) => archive::run(&client, cmd).await,
        Command::Reclaim => reclaim::run(&client).await,
    }
}
