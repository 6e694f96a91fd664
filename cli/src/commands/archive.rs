use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::client::Client;

#[derive(Debug, Subcommand)]
pub enum ArchiveCommand {
    /// Download a path from a box as a tar archive.
    Get(GetArgs),
    /// Upload a tar archive into a box at a path.
    Put(PutArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Box id.
    pub id: String,

    /// Path inside the box to archive.
    pub path: String,

    /// Where to write the tar archive.
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct PutArgs {
    /// Box id.
    pub id: String,

    /// Destination path inside the box.
    pub path: String,

    /// Tar archive to upload.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Refuse to overwrite a non-directory with a directory or vice versa.
    #[arg(long)]
    pub no_overwrite_dir_non_dir: bool,

    /// Preserve uid/gid from the archive.
    #[arg(long)]
    pub copy_uid_gid: bool,
}

pub async fn run(client: &Client, cmd: ArchiveCommand) -> anyhow::Result<()> {
    match cmd {
        ArchiveCommand::Get(args) => {
            let stat = client.get_archive(&args.id, &args.path, &args.output).await?;
            println!("wrote {} bytes to {}", stat.size, args.output.display());
            Ok(())
        }
        ArchiveCommand::Put(args) => {
            let bytes = tokio::fs::read(&args.input).await?;
            client
                .put_archive(&args.id, &args.path, bytes, args.no_overwrite_dir_non_dir, args.copy_uid_gid)
                .await?;
            println!("uploaded {} to {}:{}", args.input.display(), args.id, args.path);
            Ok(())
        }
    }
}
