use std::collections::BTreeMap;

use clap::Args;

use crate::client::{Client, CreateBoxRequest, Mount};

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Image to create the box from.
    pub image: String,

    /// Label in `key=value` form, may be repeated.
    #[arg(short, long = "label", value_name = "KEY=VALUE")]
    pub labels: Vec<String>,

    /// Environment variable in `key=value` form, may be repeated.
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Bind mount in `source:target[:ro]` form, may be repeated.
    #[arg(short, long = "mount", value_name = "SRC:DST[:ro]")]
    pub mounts: Vec<String>,

    /// Working directory inside the box.
    #[arg(short = 'w', long)]
    pub working_dir: Option<String>,

    /// Entrypoint override, e.g. `-- /bin/sh -c 'sleep 1'`.
    #[arg(last = true)]
    pub cmd: Vec<String>,
}

pub async fn run(client: &Client, args: CreateArgs) -> anyhow::Result<()> {
    let labels = parse_pairs(&args.labels)?;
    let env = parse_pairs(&args.env)?;
    let mounts = args
        .mounts
        .iter()
        .map(|m| parse_mount(m))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let req = CreateBoxRequest {
        image: args.image,
        labels,
        cmd: if args.cmd.is_empty() { None } else { Some(args.cmd) },
        args: None,
        working_dir: args.working_dir,
        env,
        mounts,
    };

    let created = client.create_box(&req).await?;
    println!("{}", created.id);
    Ok(())
}

fn parse_pairs(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected key=value, got {pair:?}"))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

fn parse_mount(spec: &str) -> anyhow::Result<Mount> {
    let mut parts = spec.split(':');
    let source = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("invalid mount {spec:?}: missing source"))?;
    let target = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("invalid mount {spec:?}: missing target"))?;
    let read_only = matches!(parts.next(), Some("ro"));
    Ok(Mount {
        source: source.to_string(),
        target: target.to_string(),
        read_only: if read_only { Some(true) } else { None },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pairs_splits_on_first_equals() {
        let map = parse_pairs(&["FOO=bar=baz".to_string()]).unwrap();
        assert_eq!(map.get("FOO"), Some(&"bar=baz".to_string()));
    }

    #[test]
    fn parse_pairs_rejects_missing_equals() {
        assert!(parse_pairs(&["nope".to_string()]).is_err());
    }

    #[test]
    fn parse_mount_with_read_only_flag() {
        let mount = parse_mount("/host:/container:ro").unwrap();
        assert_eq!(mount.source, "/host");
        assert_eq!(mount.target, "/container");
        assert_eq!(mount.read_only, Some(true));
    }

    #[test]
    fn parse_mount_without_flag() {
        let mount = parse_mount("/host:/container").unwrap();
        assert_eq!(mount.read_only, None);
    }

    #[test]
    fn parse_mount_rejects_missing_target() {
        assert!(parse_mount("/host").is_err());
    }
}
