use clap::Args;

use crate::client::{Client, ListFilter};
use crate::output::{format_ago, new_table};

#[derive(Debug, Args)]
pub struct LsArgs {
    /// Filter by exact box id.
    #[arg(long)]
    pub id: Option<String>,

    /// Filter by label key.
    #[arg(long)]
    pub label_key: Option<String>,

    /// Filter by label value (use with --label-key).
    #[arg(long)]
    pub label_value: Option<String>,

    /// Filter by source image.
    #[arg(long)]
    pub ancestor: Option<String>,

    /// Print only box ids.
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn run(client: &Client, args: LsArgs) -> anyhow::Result<()> {
    let filter = ListFilter {
        id: args.id,
        label_key: args.label_key,
        label_value: args.label_value,
        ancestor: args.ancestor,
    };
    let boxes = client.list_boxes(&filter).await?;

    if args.quiet {
        for b in &boxes {
            println!("{}", b.id);
        }
        return Ok(());
    }

    let mut table = new_table(&["ID", "IMAGE", "STATUS", "CREATED"]);
    for b in &boxes {
        table.add_row([b.id.as_str(), b.image.as_str(), b.status.as_str(), &format_ago(&b.created_at)]);
    }
    println!("{table}");
    Ok(())
}
