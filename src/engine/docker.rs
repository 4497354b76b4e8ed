use super::{
    ContainerEngine, ContainerHandle, EngineError, HealthProbe, ImageHandle, BUILD_FILE_NAME,
    HEALTH_POLL_INTERVAL,
};
use crate::pipeline::RunContext;
use async_trait::async_trait;
use bollard::container::{Config, LogsOptions, RemoveContainerOptions, StartContainerOptions};
use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, RemoveImageOptions};
use bollard::service::{HostConfig, PortBinding};
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

const IMAGE_REPOSITORY: &str = "stackpack-verify";
const LOG_TAIL_LINES: &str = "200";

/// [`ContainerEngine`] backed by the local Docker daemon.
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the daemon named by `DOCKER_HOST` (or the default socket) and ping it.
    pub async fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        docker
            .ping()
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        debug!("Connected to Docker daemon");
        Ok(Self { docker })
    }

    async fn is_running(&self, id: &str) -> Result<bool, EngineError> {
        let inspect = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| classify(e, String::new()))?;
        Ok(inspect.state.and_then(|s| s.running) == Some(true))
    }

    async fn logs(&self, id: &str) -> String {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: LOG_TAIL_LINES.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            if let Ok(chunk) = chunk {
                output.push_str(&chunk.to_string());
            }
        }
        output
    }

    async fn host_port(&self, id: &str, port: u16) -> Result<u16, EngineError> {
        let inspect = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| classify(e, String::new()))?;

        let key = format!("{}/tcp", port);
        inspect
            .network_settings
            .and_then(|ns| ns.ports)
            .and_then(|ports| ports.get(&key).cloned())
            .flatten()
            .and_then(|bindings| bindings.into_iter().next())
            .and_then(|binding| binding.host_port)
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(|| EngineError::Run {
                message: format!("port {} is not published", port),
                log: String::new(),
            })
    }

    async fn remove_container(&self, id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(id, Some(options)).await {
            warn!(container = %id, error = %e, "Failed to remove container");
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    fn name(&self) -> &str {
        "docker"
    }

    async fn build(
        &self,
        ctx: &RunContext,
        context_dir: &Path,
        build_file: &str,
    ) -> Result<ImageHandle, EngineError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        let archive = {
            let dir = context_dir.to_path_buf();
            let text = build_file.to_string();
            tokio::task::spawn_blocking(move || build_context(&dir, &text))
                .await
                .map_err(|e| EngineError::Context {
                    path: context_dir.to_path_buf(),
                    message: e.to_string(),
                })??
        };

        let tag = format!("{}:{}", IMAGE_REPOSITORY, Uuid::new_v4());
        info!(image = %tag, context_bytes = archive.len(), "Building image");

        let options = BuildImageOptions {
            dockerfile: BUILD_FILE_NAME.to_string(),
            t: tag.clone(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };
        let mut stream = self
            .docker
            .build_image(options, None, Some(Bytes::from(archive)));

        let mut log = String::new();
        loop {
            let item = tokio::select! {
                err = ctx.done() => return Err(err.into()),
                item = stream.next() => item,
            };

            match item {
                None => break,
                Some(Ok(step)) => {
                    if let Some(line) = step.stream {
                        trace!(line = %line.trim_end(), "build");
                        log.push_str(&line);
                    }
                    if let Some(error) = step.error {
                        log.push_str(&error);
                        log.push('\n');
                        return Err(EngineError::BuildFailed { log });
                    }
                }
                Some(Err(e)) => return Err(classify(e, log)),
            }
        }

        info!(image = %tag, "Image built");
        Ok(ImageHandle { tag })
    }

    async fn run(
        &self,
        ctx: &RunContext,
        image: &ImageHandle,
        ports: &[u16],
    ) -> Result<ContainerHandle, EngineError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        let keys: Vec<String> = ports.iter().map(|p| format!("{}/tcp", p)).collect();
        let config = Config {
            image: Some(image.tag.clone()),
            exposed_ports: Some(keys.iter().map(|k| (k.clone(), HashMap::new())).collect()),
            host_config: Some(HostConfig {
                port_bindings: Some(
                    keys.iter()
                        .map(|k| {
                            (
                                k.clone(),
                                Some(vec![PortBinding {
                                    host_ip: Some("127.0.0.1".to_string()),
                                    host_port: Some("0".to_string()),
                                }]),
                            )
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container = self
            .docker
            .create_container::<String, String>(None, config)
            .await
            .map_err(|e| classify(e, String::new()))?;

        if let Err(e) = self
            .docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
        {
            let log = self.logs(&container.id).await;
            self.remove_container(&container.id).await;
            return Err(classify(e, log));
        }

        let mut published = Vec::with_capacity(ports.len());
        for &port in ports {
            match self.host_port(&container.id, port).await {
                Ok(host_port) => published.push((port, host_port)),
                Err(e) => {
                    self.remove_container(&container.id).await;
                    return Err(e);
                }
            }
        }

        info!(container = %container.id, ports = ?published, "Container started");
        Ok(ContainerHandle {
            id: container.id,
            ports: published,
        })
    }

    async fn health_check(
        &self,
        ctx: &RunContext,
        container: &ContainerHandle,
        probe: &HealthProbe,
    ) -> Result<(), EngineError> {
        let host_port = container.host_port(probe.port).ok_or_else(|| EngineError::Health {
            message: format!("port {} is not published", probe.port.unwrap_or_default()),
            log: String::new(),
        })?;
        let url = format!("http://127.0.0.1:{}{}", host_port, probe.path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        let deadline = tokio::time::Instant::now() + probe.timeout;
        let mut interval = tokio::time::interval(HEALTH_POLL_INTERVAL);

        loop {
            tokio::select! {
                err = ctx.done() => return Err(err.into()),
                _ = interval.tick() => {}
            }

            match client.get(&url).send().await {
                Ok(response) if probe.accepts(response.status().as_u16()) => {
                    info!(url = %url, status = %response.status(), "Container healthy");
                    return Ok(());
                }
                Ok(response) => debug!(url = %url, status = %response.status(), "Not healthy yet"),
                Err(e) => debug!(url = %url, error = %e, "Health probe failed"),
            }

            if !self.is_running(&container.id).await? {
                return Err(EngineError::Health {
                    message: "container exited before becoming healthy".to_string(),
                    log: self.logs(&container.id).await,
                });
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(EngineError::Health {
                    message: format!(
                        "no healthy answer from {} within {}s",
                        probe.path,
                        probe.timeout.as_secs()
                    ),
                    log: self.logs(&container.id).await,
                });
            }
        }
    }

    async fn cleanup(
        &self,
        image: &ImageHandle,
        container: Option<&ContainerHandle>,
    ) -> Result<(), EngineError> {
        if let Some(container) = container {
            self.remove_container(&container.id).await;
        }

        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self
            .docker
            .remove_image(&image.tag, Some(options), None)
            .await
        {
            warn!(image = %image.tag, error = %e, "Failed to remove image");
        }
        Ok(())
    }
}

/// Errors the daemon reports about the request itself can be fixed by changing the
/// build file. Anything else means the daemon is unreachable.
fn classify(err: BollardError, log: String) -> EngineError {
    match err {
        BollardError::DockerStreamError { error } => EngineError::BuildFailed {
            log: format!("{}{}\n", log, error),
        },
        BollardError::DockerResponseServerError { message, .. } => {
            if log.is_empty() {
                EngineError::Run {
                    message: message.clone(),
                    log: message,
                }
            } else {
                EngineError::BuildFailed {
                    log: format!("{}{}\n", log, message),
                }
            }
        }
        other => EngineError::Connection(other.to_string()),
    }
}

/// Pack `dir` into a tar build context, honouring `.gitignore` and `.dockerignore`, and
/// add the build file under [`BUILD_FILE_NAME`].
pub(crate) fn build_context(dir: &Path, build_file: &str) -> Result<Vec<u8>, EngineError> {
    let context_error = |message: String| EngineError::Context {
        path: dir.to_path_buf(),
        message,
    };

    let mut archive = tar::Builder::new(Vec::new());
    archive.follow_symlinks(false);

    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(false)
        .require_git(false)
        .add_custom_ignore_filename(".dockerignore")
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| context_error(e.to_string()))?;
        let path = entry.path();
        if path == dir {
            continue;
        }

        let relative = path
            .strip_prefix(dir)
            .map_err(|e| context_error(e.to_string()))?;
        if relative == Path::new(BUILD_FILE_NAME) {
            continue;
        }

        let appended = match entry.file_type() {
            Some(ft) if ft.is_dir() => archive.append_dir(relative, path),
            Some(ft) if ft.is_file() || ft.is_symlink() => {
                archive.append_path_with_name(path, relative)
            }
            _ => continue,
        };
        appended.map_err(|e| context_error(format!("{}: {}", relative.display(), e)))?;
    }

    let mut header = tar::Header::new_gnu();
    header.set_size(build_file.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    archive
        .append_data(&mut header, BUILD_FILE_NAME, build_file.as_bytes())
        .map_err(|e| context_error(e.to_string()))?;

    archive
        .into_inner()
        .map_err(|e| context_error(e.to_string()))
}
