//! Container runtime backed by the local Docker daemon.

use std::collections::{BTreeMap, HashMap};
use std::io::Read as _;

use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, InspectContainerOptions,
    ListContainersOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding, PortMap};
use bollard::Docker;
use futures_util::stream::BoxStream;
use futures_util::StreamExt as _;
use tracing::{debug, info};

use crate::prelude::*;

fn map_error(error: DockerError) -> RuntimeError {
    match error {
        DockerError::DockerResponseServerError {
            status_code: 304, ..
        } => RuntimeError::AlreadyStopped,
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(message),
        DockerError::DockerResponseServerError { message, .. } => RuntimeError::Rejected(message),
        x => RuntimeError::io(x),
    }
}

fn tcp_key(port: PrivatePort) -> String {
    format!("{port}/tcp")
}

/// Reads the live TCP bindings out of an inspect port map. IPv4 wildcard
/// bindings win over others when a port is bound more than once.
fn parse_port_map(ports: &PortMap) -> BTreeMap<PrivatePort, HostPort> {
    let mut out = BTreeMap::new();

    for (key, bindings) in ports {
        let Some(private) = key
            .strip_suffix("/tcp")
            .and_then(|x| x.parse::<PrivatePort>().ok())
        else {
            continue;
        };

        let Some(bindings) = bindings else {
            continue;
        };

        let preferred = bindings
            .iter()
            .find(|b| b.host_ip.as_deref() == Some("0.0.0.0"))
            .or_else(|| bindings.first());

        let host = preferred
            .and_then(|b| b.host_port.as_deref())
            .and_then(|x| x.parse::<HostPort>().ok());

        if let Some(host) = host {
            out.insert(private, host);
        }
    }

    out
}

/// Extracts the first regular file from a tar archive, which is how the
/// daemon ships single files out of a container.
fn first_file_in_archive(archive: &[u8]) -> Result<Vec<u8>, RuntimeError> {
    let mut archive = tar::Archive::new(archive);

    for entry in archive.entries().map_err(RuntimeError::io)? {
        let mut entry = entry.map_err(RuntimeError::io)?;

        if entry.header().entry_type().is_file() {
            let mut content = Vec::new();
            entry.read_to_end(&mut content).map_err(RuntimeError::io)?;
            return Ok(content);
        }
    }

    Err(RuntimeError::NotFound(
        "archive does not contain a regular file".into(),
    ))
}

fn create_config(request: RunRequest) -> Config<String> {
    let exposed_ports = request
        .exposed_ports
        .iter()
        .map(|port| (tcp_key(*port), HashMap::new()))
        .collect();

    let port_bindings = (!request.publish_all_ports).then(|| {
        request
            .port_bindings
            .iter()
            .map(|(private, host)| {
                let binding = PortBinding {
                    host_ip: Some("0.0.0.0".into()),
                    host_port: Some(host.to_string()),
                };

                (tcp_key(*private), Some(vec![binding]))
            })
            .collect()
    });

    let host_config = HostConfig {
        publish_all_ports: Some(request.publish_all_ports),
        privileged: Some(request.privileged),
        port_bindings,
        ..Default::default()
    };

    Config {
        image: Some(request.image),
        exposed_ports: Some(exposed_ports),
        env: Some(request.env),
        host_config: Some(host_config),
        ..Default::default()
    }
}

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connects using the platform defaults (unix socket or named pipe,
    /// honoring `DOCKER_HOST`) and verifies the daemon answers.
    pub async fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults().map_err(map_error)?;
        docker.ping().await.map_err(map_error)?;

        info!("connected to docker daemon");

        Ok(Self::new(docker))
    }
}

impl ContainerRuntime for DockerRuntime {
    type LogStream = BoxStream<'static, Result<LogLine, RuntimeError>>;

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(error) => match map_error(error) {
                RuntimeError::NotFound(_) => Ok(false),
                x => Err(x),
            },
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let options = CreateImageOptions {
            from_image: image.to_owned(),
            ..Default::default()
        };

        let mut progress = Box::pin(self.docker.create_image(Some(options), None, None));

        while let Some(info) = progress.next().await {
            let info = info.map_err(map_error)?;

            if let Some(status) = info.status {
                debug!(
                    image,
                    %status,
                    progress = info.progress.as_deref(),
                    "pulling image"
                );
            }
        }

        Ok(())
    }

    async fn run(&self, request: RunRequest) -> Result<ContainerId, RuntimeError> {
        let created = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, create_config(request))
            .await
            .map_err(map_error)?;

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_error)?;

        Ok(created.id)
    }

    async fn list(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(map_error)?
            .into_iter()
            .filter_map(|x| {
                Some(ContainerSummary {
                    id: x.id?,
                    image: x.image.unwrap_or_default(),
                    status: x.status.unwrap_or_default(),
                })
            })
            .collect();

        Ok(summaries)
    }

    async fn inspect(&self, id: &str) -> Result<ContainerDetails, RuntimeError> {
        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(map_error)?;

        let network = response.network_settings.unwrap_or_default();

        Ok(ContainerDetails {
            id: response.id.unwrap_or_else(|| id.to_owned()),
            ip_address: network.ip_address.filter(|x| !x.is_empty()),
            ports: network
                .ports
                .as_ref()
                .map(parse_port_map)
                .unwrap_or_default(),
        })
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(id, None::<StopContainerOptions>)
            .await
            .map_err(map_error)
    }

    async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(map_error)
    }

    async fn get_file(&self, id: &str, path: &str) -> Result<Vec<u8>, RuntimeError> {
        let options = DownloadFromContainerOptions {
            path: path.to_owned(),
        };

        let mut chunks = Box::pin(self.docker.download_from_container(id, Some(options)));
        let mut archive = Vec::new();

        while let Some(chunk) = chunks.next().await {
            archive.extend_from_slice(&chunk.map_err(map_error)?);
        }

        first_file_in_archive(&archive)
    }

    fn logs(&self, id: &str) -> Self::LogStream {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        self.docker
            .logs(id, Some(options))
            .map(|chunk| {
                let line = match chunk.map_err(map_error)? {
                    LogOutput::StdErr { message } => {
                        LogLine::Stderr(String::from_utf8_lossy(&message).into_owned())
                    }
                    LogOutput::StdOut { message }
                    | LogOutput::Console { message }
                    | LogOutput::StdIn { message } => {
                        LogLine::Stdout(String::from_utf8_lossy(&message).into_owned())
                    }
                };

                Ok(line)
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(ip: &str, port: &str) -> PortBinding {
        PortBinding {
            host_ip: Some(ip.into()),
            host_port: Some(port.into()),
        }
    }

    #[test]
    fn port_map_prefers_ipv4_wildcard() {
        let ports: PortMap = HashMap::from([
            (
                "7051/tcp".to_owned(),
                Some(vec![binding("::", "40011"), binding("0.0.0.0", "40001")]),
            ),
            ("7054/tcp".to_owned(), Some(vec![binding("::", "40002")])),
            ("9001/tcp".to_owned(), None),
            ("7051/udp".to_owned(), Some(vec![binding("0.0.0.0", "1")])),
        ]);

        let parsed = parse_port_map(&ports);

        assert_eq!(parsed, BTreeMap::from([(7051, 40001), (7054, 40002)]));
    }

    #[test]
    fn run_config_binds_ports_only_when_not_publishing_all() {
        let request = RunRequest {
            image: "img:12345".into(),
            exposed_ports: vec![22, 7051],
            env: vec!["FABRIC_VERSION=2.2.0".into()],
            publish_all_ports: false,
            port_bindings: BTreeMap::from([(22, 30022), (7051, 7051)]),
            privileged: true,
        };

        let config = create_config(request.clone());
        let host = config.host_config.unwrap();
        let bindings = host.port_bindings.unwrap();

        assert_eq!(host.privileged, Some(true));
        assert_eq!(
            bindings["22/tcp"].as_ref().unwrap()[0].host_port.as_deref(),
            Some("30022")
        );
        assert_eq!(config.exposed_ports.unwrap().len(), 2);

        let config = create_config(RunRequest {
            publish_all_ports: true,
            ..request
        });

        assert!(config.host_config.unwrap().port_bindings.is_none());
    }

    #[test]
    fn extracts_single_file_from_archive() {
        let mut builder = tar::Builder::new(Vec::new());
        let content = b"{\"name\":\"x\"}";

        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();

        builder
            .append_data(&mut header, "connection-org1.json", &content[..])
            .unwrap();

        let archive = builder.into_inner().unwrap();

        assert_eq!(first_file_in_archive(&archive).unwrap(), content);
    }

    #[test]
    fn empty_archive_is_not_found() {
        let archive = tar::Builder::new(Vec::new()).into_inner().unwrap();

        assert!(matches!(
            first_file_in_archive(&archive),
            Err(RuntimeError::NotFound(_))
        ));
    }
}
