use std::collections::BTreeMap;

use clap::Args;

use crate::client::{Client, RunRequest};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Box id to run the command in.
    pub id: String,

    /// Environment variable in `key=value` form, may be repeated.
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Working directory inside the box.
    #[arg(short = 'w', long)]
    pub working_dir: Option<String>,

    /// Maximum stdout lines to keep (trailing lines win).
    #[arg(long)]
    pub stdout_line_limit: Option<i64>,

    /// Maximum stderr lines to keep (trailing lines win).
    #[arg(long)]
    pub stderr_line_limit: Option<i64>,

    /// Command and arguments to run.
    #[arg(last = true, required = true)]
    pub cmd: Vec<String>,
}

pub async fn run(client: &Client, args: RunArgs) -> anyhow::Result<()> {
    let mut env = BTreeMap::new();
    for pair in &args.env {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected key=value, got {pair:?}"))?;
        env.insert(key.to_string(), value.to_string());
    }

    let req = RunRequest {
        cmd: args.cmd,
        env,
        working_dir: args.working_dir,
        stdout_line_limit: args.stdout_line_limit,
        stderr_line_limit: args.stderr_line_limit,
    };

    let output = client.run(&args.id, &req).await?;
    print!("{}", output.stdout);
    eprint!("{}", output.stderr);
    if output.exit_code != 0 {
        std::process::exit(output.exit_code as i32);
    }
    Ok(())
}
