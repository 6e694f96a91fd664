use clap::Args;

use crate::client::Client;

#[derive(Debug, Args)]
pub struct RmArgs {
    /// Box ids to remove.
    pub ids: Vec<String>,

    /// Remove all boxes.
    #[arg(short, long)]
    pub all: bool,

    /// Remove even if the box is running.
    #[arg(short, long)]
    pub force: bool,
}

pub async fn run(client: &Client, args: RmArgs) -> anyhow::Result<()> {
    if args.all {
        let result = client.delete_all_boxes(args.force).await?;
        println!("{}", result.message);
        return Ok(());
    }

    if args.ids.is_empty() {
        anyhow::bail!("specify at least one box id, or pass --all");
    }

    for id in &args.ids {
        client.delete_box(id, args.force).await?;
        println!("{id}");
    }
    Ok(())
}
