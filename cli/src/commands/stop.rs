use clap::Args;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct StopArgs {
    pub id: String,
}

pub async fn run(client: &Client, args: StopArgs) -> anyhow::Result<()> {
    let result = client.stop_box(&args.id).await?;
    println!("{}", result.message);
    Ok(())
}
