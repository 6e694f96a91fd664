use clap::Args;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct StartArgs {
    pub id: String,
}

pub async fn run(client: &Client, args: StartArgs) -> anyhow::Result<()> {
    let result = client.start_box(&args.id).await?;
    println!("{}", result.message);
    Ok(())
}
