use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use fabric_testnet_core::*;

use crate::fixtures;

pub const HEALTHY_STATUS: &str = "Up 5 seconds (healthy)";
pub const STARTING_STATUS: &str = "Up 1 second (health: starting)";
pub const UNHEALTHY_STATUS: &str = "Up 3 minutes (unhealthy)";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RuntimeFault {
    #[default]
    None,
    RunRejected,
    PullFailed,
    ListFailed,
    InspectFailed,
}

#[derive(Clone)]
enum ScriptedLog {
    Line(LogLine),
    Failure(String),
}

struct FakeContainer {
    image: String,
    ports: BTreeMap<PrivatePort, HostPort>,
    running: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    containers: BTreeMap<ContainerId, FakeContainer>,
    local_images: HashSet<String>,
    pulls: Vec<String>,
    runs: Vec<RunRequest>,
    stops: Vec<ContainerId>,
    removals: Vec<ContainerId>,
    list_calls: usize,
    files: HashMap<String, Vec<u8>>,
    status_script: VecDeque<String>,
    status: String,
    random_ports: BTreeMap<PrivatePort, HostPort>,
    logs: Vec<ScriptedLog>,
    log_requests: usize,
    log_reads: usize,
    fault: RuntimeFault,
}

/// In-memory container runtime.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect the other afterwards.
#[derive(Clone)]
pub struct FakeRuntime {
    state: Arc<Mutex<State>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        let state = State {
            status: HEALTHY_STATUS.to_owned(),
            ..Default::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A runtime whose containers carry every file the ledger manager pulls
    /// out of the all-in-one image, for both topology layouts.
    pub fn with_ledger_files() -> Self {
        Self::new()
            .with_file(
                TopologyLayout::Legacy.profile_path(),
                fixtures::LEGACY_PROFILE_JSON,
            )
            .with_file(
                TopologyLayout::Modern.profile_path(),
                fixtures::MODERN_PROFILE_JSON,
            )
            .with_file(
                TopologyLayout::Legacy.orderer_tls_ca_path(),
                fixtures::LEGACY_ORDERER_TLS_CA_PEM,
            )
            .with_file(
                TopologyLayout::Modern.orderer_tls_ca_path(),
                fixtures::MODERN_ORDERER_TLS_CA_PEM,
            )
            .with_file(SSH_PRIVATE_KEY_PATH, fixtures::SSH_PRIVATE_KEY_PEM)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_status(self, status: &str) -> Self {
        self.lock().status = status.to_owned();
        self
    }

    /// Statuses reported by successive list calls. Once exhausted, the plain
    /// status applies again.
    pub fn with_status_script<'a>(self, statuses: impl IntoIterator<Item = &'a str>) -> Self {
        self.lock()
            .status_script
            .extend(statuses.into_iter().map(str::to_owned));
        self
    }

    pub fn with_file(self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.lock()
            .files
            .insert(path.to_owned(), content.as_ref().to_vec());
        self
    }

    pub fn without_file(self, path: &str) -> Self {
        self.lock().files.remove(path);
        self
    }

    /// Host ports handed out when a container publishes all of its ports.
    pub fn with_random_ports(self, ports: impl IntoIterator<Item = (PrivatePort, HostPort)>) -> Self {
        self.lock().random_ports.extend(ports);
        self
    }

    pub fn with_local_image(self, image: &str) -> Self {
        self.lock().local_images.insert(image.to_owned());
        self
    }

    /// Output every log stream replays, in order.
    pub fn with_logs(self, lines: impl IntoIterator<Item = LogLine>) -> Self {
        self.lock().logs.extend(lines.into_iter().map(ScriptedLog::Line));
        self
    }

    /// Appends a stream failure after the lines scripted so far.
    pub fn with_log_failure(self, reason: &str) -> Self {
        self.lock().logs.push(ScriptedLog::Failure(reason.to_owned()));
        self
    }

    pub fn with_fault(self, fault: RuntimeFault) -> Self {
        self.lock().fault = fault;
        self
    }

    pub fn runs(&self) -> Vec<RunRequest> {
        self.lock().runs.clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.lock().pulls.clone()
    }

    pub fn stops(&self) -> Vec<ContainerId> {
        self.lock().stops.clone()
    }

    pub fn removals(&self) -> Vec<ContainerId> {
        self.lock().removals.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Number of log streams handed out.
    pub fn log_requests(&self) -> usize {
        self.lock().log_requests
    }

    /// Items pulled from log streams so far, failures included.
    pub fn log_reads(&self) -> usize {
        self.lock().log_reads
    }

    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.lock()
            .containers
            .get(id)
            .map(|x| x.running)
            .unwrap_or(false)
    }

    /// Simulates the container dying underneath its owner.
    pub fn kill(&self, id: &str) {
        if let Some(container) = self.lock().containers.get_mut(id) {
            container.running = false;
        }
    }
}

pub struct ScriptedLogStream {
    state: Arc<Mutex<State>>,
    cursor: usize,
}

impl futures_core::Stream for ScriptedLogStream {
    type Item = Result<LogLine, RuntimeError>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let cursor = self.cursor;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let Some(next) = state.logs.get(cursor).cloned() else {
            return std::task::Poll::Ready(None);
        };

        state.log_reads += 1;
        drop(state);
        self.cursor += 1;

        let item = match next {
            ScriptedLog::Line(line) => Ok(line),
            ScriptedLog::Failure(reason) => Err(RuntimeError::Io(reason)),
        };

        std::task::Poll::Ready(Some(item))
    }
}

impl ContainerRuntime for FakeRuntime {
    type LogStream = ScriptedLogStream;

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        Ok(self.lock().local_images.contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();

        if state.fault == RuntimeFault::PullFailed {
            return Err(RuntimeError::NotFound(image.to_owned()));
        }

        state.pulls.push(image.to_owned());
        state.local_images.insert(image.to_owned());

        Ok(())
    }

    async fn run(&self, request: RunRequest) -> Result<ContainerId, RuntimeError> {
        let mut state = self.lock();

        if state.fault == RuntimeFault::RunRejected {
            return Err(RuntimeError::Rejected("port is already allocated".into()));
        }

        state.next_id += 1;
        let id = format!("{:064x}", state.next_id);

        let ports = if request.publish_all_ports {
            state
                .random_ports
                .iter()
                .filter(|(private, _)| request.exposed_ports.contains(private))
                .map(|(private, host)| (*private, *host))
                .collect()
        } else {
            request.port_bindings.clone()
        };

        state.containers.insert(
            id.clone(),
            FakeContainer {
                image: request.image.clone(),
                ports,
                running: true,
            },
        );

        state.runs.push(request);

        Ok(id)
    }

    async fn list(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut state = self.lock();
        state.list_calls += 1;

        if state.fault == RuntimeFault::ListFailed {
            return Err(RuntimeError::io("connection reset by peer"));
        }

        let running_status = state
            .status_script
            .pop_front()
            .unwrap_or_else(|| state.status.clone());

        let summaries = state
            .containers
            .iter()
            .map(|(id, container)| ContainerSummary {
                id: id.clone(),
                image: container.image.clone(),
                status: if container.running {
                    running_status.clone()
                } else {
                    "Exited (0) 1 second ago".to_owned()
                },
            })
            .collect();

        Ok(summaries)
    }

    async fn inspect(&self, id: &str) -> Result<ContainerDetails, RuntimeError> {
        let state = self.lock();

        if state.fault == RuntimeFault::InspectFailed {
            return Err(RuntimeError::io("inspect timed out"));
        }

        let container = state
            .containers
            .get(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_owned()))?;

        let (ports, ip_address) = if container.running {
            (container.ports.clone(), Some("172.17.0.2".to_owned()))
        } else {
            (BTreeMap::new(), None)
        };

        Ok(ContainerDetails {
            id: id.to_owned(),
            ip_address,
            ports,
        })
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();

        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_owned()))?;

        if !container.running {
            return Err(RuntimeError::AlreadyStopped);
        }

        container.running = false;
        state.stops.push(id.to_owned());

        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();

        state
            .containers
            .remove(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_owned()))?;

        state.removals.push(id.to_owned());

        Ok(())
    }

    async fn get_file(&self, id: &str, path: &str) -> Result<Vec<u8>, RuntimeError> {
        let state = self.lock();

        if !state.containers.contains_key(id) {
            return Err(RuntimeError::NotFound(id.to_owned()));
        }

        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(path.to_owned()))
    }

    fn logs(&self, _id: &str) -> Self::LogStream {
        self.lock().log_requests += 1;

        ScriptedLogStream {
            state: self.state.clone(),
            cursor: 0,
        }
    }
}
