use std::collections::BTreeMap;

use clap::Args;
use serde_json::json;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Box id to exec into.
    pub id: String,

    /// Disable pseudo-tty allocation (multiplexed stdout/stderr framing).
    #[arg(short = 'T', long)]
    pub no_tty: bool,

    /// Environment variable in `key=value` form, may be repeated.
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Working directory inside the box.
    #[arg(short = 'w', long)]
    pub working_dir: Option<String>,

    /// Command and arguments to run.
    #[arg(last = true, required = true)]
    pub cmd: Vec<String>,
}

pub async fn run(client: &Client, args: ExecArgs) -> anyhow::Result<()> {
    let mut env = BTreeMap::new();
    for pair in &args.env {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected key=value, got {pair:?}"))?;
        env.insert(key.to_string(), value.to_string());
    }

    let tty = !args.no_tty;
    let spec = json!({
        "cmd": args.cmd,
        "env": env,
        "working_dir": args.working_dir,
        "tty": tty,
        "attach_stdout": true,
        "attach_stderr": true,
        "attach_stdin": true,
    });

    client.exec_stream(&args.id, &spec, tty).await?;
    Ok(())
}
