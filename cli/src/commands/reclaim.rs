use crate::client::Client;

pub async fn run(client: &Client) -> anyhow::Result<()> {
    let report = client.reclaim().await?;
    println!("{}", report.message);
    Ok(())
}
