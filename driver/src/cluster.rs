//! Cluster-backed driver using the Kubernetes API via `kube`.
//!
//! One `Deployment` (replicas: 1) per box; exec and archive transfer ride
//! the pod-exec subresource. Start/Stop are not implemented in this
//! release (see DESIGN.md) and return [`DriverError::NotImplemented`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::stream::StreamExt;
use gbox_core::labels::ManagedLabels;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams, DeleteParams, ListParams, PostParams};
use kube::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;

use crate::error::{DriverError, Result};
use crate::types::*;
use crate::Driver;

pub struct ClusterDriver {
    client: Client,
    namespace: String,
    label_prefix: String,
    /// Exit codes become known only once kube's attach status channel
    /// resolves, which can be well after `exec` returns; `inspect_exec`
    /// looks its handle up here and awaits it.
    exit_codes: Arc<Mutex<HashMap<String, oneshot::Receiver<i64>>>>,
}

impl ClusterDriver {
    pub async fn connect(kubeconfig_path: Option<&str>, namespace: &str, label_prefix: &str) -> Result<Self> {
        let client = match kubeconfig_path {
            Some(path) => {
                let kubeconfig = kube::config::Kubeconfig::read_from(path)
                    .map_err(|e| DriverError::Internal(e.to_string()))?;
                let config = kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default())
                    .await
                    .map_err(|e| DriverError::Internal(e.to_string()))?;
                Client::try_from(config).map_err(|e| DriverError::Internal(e.to_string()))?
            }
            None => Client::try_default()
                .await
                .map_err(|e| DriverError::Internal(e.to_string()))?,
        };
        Ok(Self {
            client,
            namespace: namespace.to_string(),
            label_prefix: label_prefix.to_string(),
            exit_codes: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn deployment_name(&self, id: &str) -> String {
        format!("{}-{}", self.label_prefix, id)
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn running_pod_for(&self, id: &str) -> Result<Pod> {
        let (key, _) = ManagedLabels::managed_by_filter(&self.label_prefix);
        let selector = format!("{key}={}, {}.id={id}", self.label_prefix, self.label_prefix);
        let pods = self
            .pods()
            .list(&ListParams::default().labels(&selector))
            .await?;
        let pod = pods
            .items
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::NotFound(id.to_string()))?;

        let phase = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown");
        if phase != "Running" {
            return Err(DriverError::NotRunning(id.to_string()));
        }
        Ok(pod)
    }
}

#[async_trait::async_trait]
impl Driver for ClusterDriver {
    async fn list(&self, filters: &[Filter]) -> Result<Vec<Box>> {
        let (key, val) = ManagedLabels::managed_by_filter(&self.label_prefix);
        let mut selector = format!("{key}={val}");
        for f in filters {
            if let FilterField::Label(Some(k), Some(v)) = &f.field {
                selector.push_str(&format!(",{k}={v}"));
            }
        }
        let deployments = self
            .deployments()
            .list(&ListParams::default().labels(&selector))
            .await?;

        Ok(deployments
            .items
            .into_iter()
            .filter_map(|d| deployment_to_box(&d))
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Box> {
        let name = self.deployment_name(id);
        let d = self
            .deployments()
            .get(&name)
            .await
            .map_err(|_| DriverError::NotFound(id.to_string()))?;
        deployment_to_box(&d).ok_or_else(|| DriverError::NotFound(id.to_string()))
    }

    async fn create(&self, req: CreateBoxRequest) -> Result<Box> {
        let id = uuid::Uuid::new_v4().to_string();
        let name = self.deployment_name(&id);
        let labels: std::collections::BTreeMap<String, String> =
            ManagedLabels::new(&self.label_prefix, &id).merged_with(&req.labels);

        let env: Vec<serde_json::Value> = req
            .env
            .iter()
            .map(|(k, v)| serde_json::json!({"name": k, "value": v}))
            .collect();

        let manifest = serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": name, "labels": labels },
            "spec": {
                "replicas": 1,
                "selector": { "matchLabels": { format!("{}.id", self.label_prefix): id } },
                "template": {
                    "metadata": { "labels": labels },
                    "spec": {
                        "containers": [{
                            "name": "box",
                            "image": req.image,
                            "command": req.cmd,
                            "args": req.args,
                            "workingDir": req.working_dir,
                            "env": env,
                        }]
                    }
                }
            }
        });
        let deployment: Deployment = serde_json::from_value(manifest)
            .map_err(|e| DriverError::Internal(e.to_string()))?;
        self.deployments()
            .create(&PostParams::default(), &deployment)
            .await?;

        Ok(Box {
            id,
            image: req.image,
            status: BoxStatus::Creating,
            labels: req.labels,
            cmd: req.cmd,
            args: req.args,
            working_dir: req.working_dir,
            env: Some(req.env),
            mounts: None,
            created_at: Utc::now(),
        })
    }

    async fn start(&self, _id: &str) -> Result<BoxStatus> {
        Err(DriverError::NotImplemented(
            "cluster driver start".to_string(),
        ))
    }

    async fn stop(&self, _id: &str) -> Result<BoxStatus> {
        Err(DriverError::NotImplemented(
            "cluster driver stop".to_string(),
        ))
    }

    async fn delete(&self, id: &str, _force: bool) -> Result<()> {
        let name = self.deployment_name(id);
        self.deployments().delete(&name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn delete_all(&self, force: bool) -> Result<(Vec<String>, usize)> {
        let boxes = self.list(&[]).await?;
        let mut deleted = Vec::new();
        for b in &boxes {
            if self.delete(&b.id, force).await.is_ok() {
                deleted.push(b.id.clone());
            }
        }
        let count = deleted.len();
        Ok((deleted, count))
    }

    async fn exec(&self, id: &str, req: ExecSpec) -> Result<ExecAttach> {
        let pod = self.running_pod_for(id).await?;
        let pod_name = pod.metadata.name.unwrap_or_default();

        let attach_params = AttachParams::default()
            .stdin(req.attach_stdin)
            .stdout(req.attach_stdout)
            .stderr(req.attach_stderr)
            .tty(req.tty);

        let mut attached = self
            .pods()
            .exec(&pod_name, req.cmd.clone(), &attach_params)
            .await?;

        let mut stdin = attached.stdin().map(std::boxed::Box::pin);
        let stdout = attached.stdout().map(std::boxed::Box::pin);
        let stderr = attached.stderr().map(std::boxed::Box::pin);
        let status_future = attached.take_status();

        let exec_id = format!("{pod_name}:{}", uuid::Uuid::new_v4());
        let (status_tx, status_rx) = oneshot::channel();
        tokio::spawn(async move {
            // Keep the attach connection alive until the process exits;
            // the status future depends on it even after stdout/stderr
            // have been fully drained.
            let _attached = attached;
            let code = match status_future {
                Some(fut) => exit_code_from_status(fut.await),
                None => 0,
            };
            let _ = status_tx.send(code);
        });
        self.exit_codes.lock().unwrap().insert(exec_id.clone(), status_rx);

        let (client_read, server_write) = tokio::io::duplex(64 * 1024);
        let (mut server_read, client_write) = tokio::io::duplex(64 * 1024);
        let tty = req.tty;

        // kube hands stdout/stderr back as two independent streams; this
        // crate's frame header is what lets both share one connection, so
        // in multiplexed mode each is tagged before interleaving onto the
        // same duplex half. Raw/tty mode has only stdout to pass through.
        let server_write = std::sync::Arc::new(tokio::sync::Mutex::new(server_write));

        if let Some(mut stdout) = stdout {
            let server_write = server_write.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let mut w = server_write.lock().await;
                            let result = if tty {
                                w.write_all(&buf[..n]).await
                            } else {
                                gbox_core::stream::write_frame(
                                    &mut *w,
                                    gbox_core::stream::KIND_STDOUT,
                                    &buf[..n],
                                )
                                .await
                                .map_err(std::io::Error::other)
                            };
                            if result.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }

        if let Some(mut stderr) = stderr {
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                loop {
                    match stderr.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let mut w = server_write.lock().await;
                            if tty {
                                break;
                            }
                            if gbox_core::stream::write_frame(
                                &mut *w,
                                gbox_core::stream::KIND_STDERR,
                                &buf[..n],
                            )
                            .await
                            .is_err()
                            {
                                break;
                            }
                        }
                    }
                }
            });
        }

        if let Some(mut stdin) = stdin.take() {
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                loop {
                    match server_read.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stdin.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }

        Ok(ExecAttach {
            input: std::boxed::Box::pin(client_write),
            output: std::boxed::Box::pin(client_read),
            handle: ExecHandle { box_id: id.to_string(), exec_id },
        })
    }

    async fn inspect_exec(&self, handle: &ExecHandle) -> Result<i64> {
        let rx = self.exit_codes.lock().unwrap().remove(&handle.exec_id);
        match rx {
            Some(rx) => Ok(rx.await.unwrap_or(0)),
            None => Ok(0),
        }
    }

    async fn get_archive(&self, id: &str, path: &str) -> Result<(ArchiveReader, PathStat)> {
        let stat = self.head_archive(id, path).await?;
        let pod = self.running_pod_for(id).await?;
        let pod_name = pod.metadata.name.unwrap_or_default();

        let attach_params = AttachParams::default().stdout(true).stderr(false);
        let mut attached = self
            .pods()
            .exec(&pod_name, vec!["tar".into(), "cf".into(), "-".into(), "-C".into(), path.into(), "."], &attach_params)
            .await?;
        let stdout = attached
            .stdout()
            .ok_or_else(|| DriverError::Internal("no stdout from tar exec".to_string()))?;
        Ok((std::boxed::Box::pin(stdout), stat))
    }

    async fn head_archive(&self, id: &str, path: &str) -> Result<PathStat> {
        let pod = self.running_pod_for(id).await?;
        let pod_name = pod.metadata.name.unwrap_or_default();

        let attach_params = AttachParams::default().stdout(true).stderr(false);
        let mut attached = self
            .pods()
            .exec(
                &pod_name,
                vec![
                    "stat".into(),
                    "-c".into(),
                    "%n:%s:%Y:%a:%u:%g".into(),
                    path.into(),
                ],
                &attach_params,
            )
            .await?;
        let mut stdout = attached
            .stdout()
            .ok_or_else(|| DriverError::Internal("no stdout from stat exec".to_string()))?;
        let mut out = String::new();
        stdout.read_to_string(&mut out).await?;

        let fields: Vec<&str> = out.trim().splitn(6, ':').collect();
        if fields.len() != 6 {
            return Err(DriverError::PathNotFound(path.to_string()));
        }
        Ok(PathStat {
            name: fields[0].to_string(),
            size: fields[1].parse().unwrap_or(0),
            mtime: fields[2].parse().unwrap_or(0),
            mode: u32::from_str_radix(fields[3], 8).unwrap_or(0),
            uid: fields[4].parse().unwrap_or(0),
            gid: fields[5].parse().unwrap_or(0),
        })
    }

    async fn extract_archive(
        &self,
        id: &str,
        path: &str,
        mut tar: ArchiveReader,
        _opts: ExtractOptions,
    ) -> Result<()> {
        let pod = self.running_pod_for(id).await?;
        let pod_name = pod.metadata.name.unwrap_or_default();

        let attach_params = AttachParams::default().stdin(true).stdout(false).stderr(false);
        let mut attached = self
            .pods()
            .exec(&pod_name, vec!["tar".into(), "xf".into(), "-".into(), "-C".into(), path.into()], &attach_params)
            .await?;
        let mut stdin = attached
            .stdin()
            .ok_or_else(|| DriverError::Internal("no stdin for tar exec".to_string()))?;

        let mut body = Vec::new();
        tar.read_to_end(&mut body).await?;
        stdin.write_all(&body).await?;
        Ok(())
    }

    async fn get_external_port(&self, _id: &str, _internal_port: u16) -> Result<u16> {
        Err(DriverError::NotImplemented(
            "cluster driver has no external port mapping; use a Service instead".to_string(),
        ))
    }
}

/// kube's exec status channel reports success as `status: "Success"` and a
/// non-zero exit as `reason: "NonZeroExitCode"` with the code carried in a
/// `StatusCause{reason: "ExitCode", message: "<code>"}` under `details.causes`.
fn exit_code_from_status(status: Option<Status>) -> i64 {
    let Some(status) = status else { return 0 };
    if status.status.as_deref() == Some("Success") {
        return 0;
    }
    status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| causes.iter().find(|c| c.reason.as_deref() == Some("ExitCode")))
        .and_then(|c| c.message.as_deref())
        .and_then(|m| m.parse::<i64>().ok())
        .unwrap_or(1)
}

fn deployment_to_box(d: &Deployment) -> Option<Box> {
    let meta = &d.metadata;
    let name = meta.name.clone()?;
    let labels: std::collections::BTreeMap<String, String> =
        meta.labels.clone().unwrap_or_default().into_iter().collect();
    let id = labels
        .iter()
        .find(|(k, _)| k.ends_with(".id"))
        .map(|(_, v)| v.clone())
        .unwrap_or(name);

    let spec = d.spec.as_ref()?;
    let container = spec.template.spec.as_ref()?.containers.first()?;
    let status = d
        .status
        .as_ref()
        .and_then(|s| s.available_replicas)
        .map(|n| if n > 0 { BoxStatus::Running } else { BoxStatus::Stopped })
        .unwrap_or(BoxStatus::Unknown);

    Some(Box {
        id,
        image: container.image.clone().unwrap_or_default(),
        status,
        labels,
        cmd: container.command.clone(),
        args: container.args.clone(),
        working_dir: container.working_dir.clone(),
        env: None,
        mounts: None,
        created_at: meta
            .creation_timestamp
            .as_ref()
            .map(|t| t.0)
            .unwrap_or_else(Utc::now),
    })
}
