//! Container-backed driver using the Docker Engine API via `bollard`.

use std::collections::HashMap;

use bollard::container::{
    Config as BollardContainerConfig, CreateContainerOptions, DownloadFromContainerOptions,
    InspectContainerOptions, ListContainersOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions, UploadToContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::HostConfig;
use bollard::Docker;
use chrono::Utc;
use futures::stream::StreamExt;
use gbox_core::labels::ManagedLabels;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{DriverError, Result};
use crate::types::*;
use crate::Driver;

pub struct ContainerDriver {
    docker: Docker,
    label_prefix: String,
}

impl ContainerDriver {
    pub fn connect(host: Option<&str>, label_prefix: &str) -> Result<Self> {
        let docker = match host {
            Some(h) => Docker::connect_with_http(h, 120, bollard::API_DEFAULT_VERSION)?,
            None => Docker::connect_with_local_defaults()?,
        };
        Ok(Self {
            docker,
            label_prefix: label_prefix.to_string(),
        })
    }

    fn container_name(&self, id: &str) -> String {
        format!("{}-{}", self.label_prefix, id)
    }

    /// Pull the image if it isn't present locally, draining the pull
    /// progress stream and surfacing the first reported error.
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        let options = Some(bollard::image::CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            let info = progress?;
            if let Some(err) = info.error {
                return Err(DriverError::Internal(format!("image pull failed: {err}")));
            }
        }
        Ok(())
    }

    async fn inspect_to_box(&self, id: &str, name: &str) -> Result<Box> {
        let inspect = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await?;

        let state = inspect.state.unwrap_or_default();
        let status = match state.status {
            Some(bollard::models::ContainerStateStatusEnum::RUNNING) => BoxStatus::Running,
            Some(bollard::models::ContainerStateStatusEnum::CREATED) => BoxStatus::Creating,
            Some(bollard::models::ContainerStateStatusEnum::EXITED) => BoxStatus::Stopped,
            Some(bollard::models::ContainerStateStatusEnum::DEAD) => BoxStatus::Failed,
            _ => BoxStatus::Unknown,
        };

        let config = inspect.config.unwrap_or_default();
        let labels: std::collections::BTreeMap<String, String> =
            config.labels.unwrap_or_default().into_iter().collect();
        let image = config.image.unwrap_or_default();
        let created_at = inspect
            .created
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Box {
            id: id.to_string(),
            image,
            status,
            labels,
            cmd: config.cmd,
            args: None,
            working_dir: config.working_dir,
            env: None,
            mounts: None,
            created_at,
        })
    }

    fn bollard_filters(&self, filters: &[Filter]) -> HashMap<String, Vec<String>> {
        let (managed_key, managed_val) = ManagedLabels::managed_by_filter(&self.label_prefix);
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        map.insert("label".to_string(), vec![format!("{managed_key}={managed_val}")]);

        for f in filters {
            match &f.field {
                FilterField::Id(id) => {
                    map.entry("id".to_string()).or_default().push(id.clone());
                }
                FilterField::Label(Some(k), Some(v)) => {
                    map.entry("label".to_string())
                        .or_default()
                        .push(format!("{k}={v}"));
                }
                FilterField::Label(Some(k), None) => {
                    map.entry("label".to_string()).or_default().push(k.clone());
                }
                FilterField::Label(None, _) => {}
                FilterField::Ancestor(image) => {
                    map.entry("ancestor".to_string())
                        .or_default()
                        .push(image.clone());
                }
            }
        }
        map
    }
}

#[async_trait::async_trait]
impl Driver for ContainerDriver {
    async fn list(&self, filters: &[Filter]) -> Result<Vec<Box>> {
        let options = Some(ListContainersOptions {
            all: true,
            filters: self.bollard_filters(filters),
            ..Default::default()
        });
        let containers = self.docker.list_containers(options).await?;

        let mut boxes = Vec::with_capacity(containers.len());
        for c in containers {
            let name = c.names.and_then(|n| n.into_iter().next()).unwrap_or_default();
            let id = name.trim_start_matches('/').trim_start_matches(&format!("{}-", self.label_prefix)).to_string();
            boxes.push(self.inspect_to_box(&id, &name).await?);
        }
        Ok(boxes)
    }

    async fn get(&self, id: &str) -> Result<Box> {
        let name = self.container_name(id);
        self.inspect_to_box(id, &name)
            .await
            .map_err(|_| DriverError::NotFound(id.to_string()))
    }

    async fn create(&self, req: CreateBoxRequest) -> Result<Box> {
        let id = uuid::Uuid::new_v4().to_string();
        let name = self.container_name(&id);

        self.ensure_image(&req.image).await?;

        let labels = ManagedLabels::new(&self.label_prefix, &id).merged_with(&req.labels);
        let binds: Vec<String> = req
            .mounts
            .iter()
            .map(|m| {
                let ro = if m.read_only { ":ro" } else { "" };
                format!(
                    "{}:{}:{}{}",
                    m.source,
                    m.target,
                    m.propagation.as_bind_suffix(),
                    ro
                )
            })
            .collect();

        let env: Vec<String> = req.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let host_config = HostConfig {
            binds: if binds.is_empty() { None } else { Some(binds) },
            ..Default::default()
        };

        let container_config = BollardContainerConfig {
            image: Some(req.image.clone()),
            cmd: req.cmd.clone(),
            working_dir: req.working_dir.clone(),
            env: if env.is_empty() { None } else { Some(env) },
            labels: Some(labels.into_iter().collect()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = Some(CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });
        self.docker.create_container(options, container_config).await?;
        self.docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await?;

        self.inspect_to_box(&id, &name).await
    }

    async fn start(&self, id: &str) -> Result<BoxStatus> {
        let name = self.container_name(id);
        let current = self.inspect_to_box(id, &name).await?;
        if current.status == BoxStatus::Running {
            return Err(DriverError::AlreadyRunning(id.to_string()));
        }
        self.docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await?;
        Ok(BoxStatus::Running)
    }

    async fn stop(&self, id: &str) -> Result<BoxStatus> {
        let name = self.container_name(id);
        let current = self.inspect_to_box(id, &name).await?;
        if current.status != BoxStatus::Running {
            return Err(DriverError::AlreadyStopped(id.to_string()));
        }
        match self
            .docker
            .stop_container(&name, Some(StopContainerOptions { t: 10 }))
            .await
        {
            Ok(()) => Ok(BoxStatus::Stopped),
            Err(BollardError::DockerResponseServerError { status_code: 304, .. }) => {
                Ok(BoxStatus::Stopped)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str, force: bool) -> Result<()> {
        let name = self.container_name(id);
        if !force {
            let current = self.inspect_to_box(id, &name).await;
            if let Ok(b) = current {
                if b.status == BoxStatus::Running {
                    let _ = self.stop(id).await;
                }
            }
        }
        let options = Some(RemoveContainerOptions { force, ..Default::default() });
        match self.docker.remove_container(&name, options).await {
            Ok(()) => Ok(()),
            Err(BollardError::DockerResponseServerError { status_code: 404, .. }) => {
                Err(DriverError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
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
        let name = self.container_name(id);
        let current = self.inspect_to_box(id, &name).await?;
        if current.status != BoxStatus::Running {
            return Err(DriverError::NotRunning(id.to_string()));
        }

        let env: Vec<String> = req.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let create_exec = CreateExecOptions {
            cmd: Some(req.cmd.clone()),
            env: Some(env),
            working_dir: req.working_dir.clone(),
            attach_stdin: Some(req.attach_stdin),
            attach_stdout: Some(req.attach_stdout),
            attach_stderr: Some(req.attach_stderr),
            tty: Some(req.tty),
            ..Default::default()
        };
        let created = self.docker.create_exec(&name, create_exec).await?;

        let started = self
            .docker
            .start_exec(
                &created.id,
                Some(StartExecOptions { detach: false, tty: req.tty, output_capacity: None }),
            )
            .await?;

        let tty = req.tty;
        match started {
            StartExecResults::Attached { input, output } => {
                let (client_read, mut server_write) = tokio::io::duplex(64 * 1024);
                let (mut server_read, client_write) = tokio::io::duplex(64 * 1024);

                tokio::spawn(async move {
                    let mut output = output;
                    while let Some(chunk) = output.next().await {
                        let log = match chunk {
                            Ok(l) => l,
                            Err(_) => break,
                        };
                        // Raw mode passes bytes through unchanged; multiplexed
                        // mode re-encodes bollard's own stdout/stderr framing
                        // into this crate's 8-byte frame header.
                        if tty {
                            if server_write.write_all(&log.into_bytes()).await.is_err() {
                                break;
                            }
                        } else {
                            let (kind, message) = match log {
                                bollard::container::LogOutput::StdOut { message } => {
                                    (gbox_core::stream::KIND_STDOUT, message)
                                }
                                bollard::container::LogOutput::StdErr { message } => {
                                    (gbox_core::stream::KIND_STDERR, message)
                                }
                                bollard::container::LogOutput::StdIn { message } => {
                                    (gbox_core::stream::KIND_STDIN, message)
                                }
                                bollard::container::LogOutput::Console { message } => {
                                    (gbox_core::stream::KIND_STDOUT, message)
                                }
                            };
                            if gbox_core::stream::write_frame(&mut server_write, kind, &message)
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                    }
                });

                let mut input = input;
                tokio::spawn(async move {
                    let mut buf = [0u8; 8192];
                    loop {
                        match server_read.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                if input.write_all(&buf[..n]).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                });

                Ok(ExecAttach {
                    input: std::boxed::Box::pin(client_write),
                    output: std::boxed::Box::pin(client_read),
                    handle: ExecHandle { box_id: id.to_string(), exec_id: created.id },
                })
            }
            StartExecResults::Detached => Err(DriverError::Internal(
                "exec unexpectedly detached".to_string(),
            )),
        }
    }

    async fn inspect_exec(&self, handle: &ExecHandle) -> Result<i64> {
        let inspect = self.docker.inspect_exec(&handle.exec_id).await?;
        Ok(inspect.exit_code.unwrap_or(-1))
    }

    async fn get_archive(&self, id: &str, path: &str) -> Result<(ArchiveReader, PathStat)> {
        let name = self.container_name(id);
        let stat = self.head_archive(id, path).await?;
        let options = DownloadFromContainerOptions { path: path.to_string() };
        let stream = self.docker.download_from_container(&name, Some(options));
        let reader = tokio_util::io::StreamReader::new(stream.map(|r| {
            r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
        }));
        Ok((std::boxed::Box::pin(reader), stat))
    }

    async fn head_archive(&self, id: &str, path: &str) -> Result<PathStat> {
        let name = self.container_name(id);
        let options = DownloadFromContainerOptions { path: path.to_string() };
        let mut stream = self.docker.download_from_container(&name, Some(options));
        let mut first_chunk = Vec::new();
        while first_chunk.len() < 512 {
            match stream.next().await {
                Some(Ok(bytes)) => first_chunk.extend_from_slice(&bytes),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }
        if first_chunk.is_empty() {
            return Err(DriverError::PathNotFound(path.to_string()));
        }
        let mut archive = tar::Archive::new(&first_chunk[..]);
        let entry = archive
            .entries()
            .map_err(DriverError::Io)?
            .next()
            .ok_or_else(|| DriverError::PathNotFound(path.to_string()))?
            .map_err(DriverError::Io)?;
        let header = entry.header();
        Ok(PathStat {
            name: path.to_string(),
            size: header.size().unwrap_or(0),
            mtime: header.mtime().unwrap_or(0) as i64,
            mode: header.mode().unwrap_or(0),
            uid: header.uid().unwrap_or(0) as u32,
            gid: header.gid().unwrap_or(0) as u32,
        })
    }

    async fn extract_archive(
        &self,
        id: &str,
        path: &str,
        mut tar: ArchiveReader,
        opts: ExtractOptions,
    ) -> Result<()> {
        let name = self.container_name(id);
        let mut body = Vec::new();
        tar.read_to_end(&mut body).await?;

        let options = UploadToContainerOptions {
            path: path.to_string(),
            no_overwrite_dir_non_dir: opts.no_overwrite_dir_non_dir.to_string(),
            copy_uidgid: opts.copy_uid_gid.to_string(),
        };
        self.docker
            .upload_to_container(&name, Some(options), body.into())
            .await?;
        Ok(())
    }

    async fn get_external_port(&self, id: &str, internal_port: u16) -> Result<u16> {
        let name = self.container_name(id);
        let inspect = self
            .docker
            .inspect_container(&name, None::<InspectContainerOptions>)
            .await?;
        let network_settings = inspect.network_settings.unwrap_or_default();
        let ports = network_settings.ports.unwrap_or_default();
        let key = format!("{internal_port}/tcp");
        let bindings = ports
            .get(&key)
            .and_then(|b| b.clone())
            .ok_or_else(|| DriverError::Internal(format!("port {internal_port} not published")))?;
        let host_port = bindings
            .first()
            .and_then(|b| b.host_port.as_ref())
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(|| DriverError::Internal(format!("port {internal_port} has no host binding")))?;
        Ok(host_port)
    }
}
