//! The container runtime seam.
//!
//! Only the handful of operations the ledger manager needs are modeled; the
//! runtime itself is a black box behind them.

use std::collections::BTreeMap;

use futures_core::Stream;
use thiserror::Error;

use crate::ports::{HostPort, PrivatePort};

pub type ContainerId = String;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container or image not found: {0}")]
    NotFound(String),

    #[error("container already stopped")]
    AlreadyStopped,

    #[error("runtime rejected the request: {0}")]
    Rejected(String),

    #[error("runtime io error: {0}")]
    Io(String),
}

impl RuntimeError {
    pub fn io(error: impl std::fmt::Display) -> Self {
        Self::Io(error.to_string())
    }
}

/// Everything needed to create and start the ledger instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub image: String,
    pub exposed_ports: Vec<PrivatePort>,
    /// `KEY=VALUE` entries.
    pub env: Vec<String>,
    pub publish_all_ports: bool,
    /// Explicit bindings; empty when all ports are published.
    pub port_bindings: BTreeMap<PrivatePort, HostPort>,
    pub privileged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub image: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: ContainerId,
    pub ip_address: Option<String>,
    /// Live TCP bindings, private port to host port.
    pub ports: BTreeMap<PrivatePort, HostPort>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Stdout(String),
    Stderr(String),
}

impl LogLine {
    pub fn text(&self) -> &str {
        match self {
            Self::Stdout(x) | Self::Stderr(x) => x,
        }
    }
}

#[trait_variant::make(Send)]
pub trait ContainerRuntime: Send + Sync + 'static {
    type LogStream: Stream<Item = Result<LogLine, RuntimeError>> + Send + Unpin + 'static;

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError>;

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Creates and starts a container, resolving once the runtime reports it
    /// as started.
    async fn run(&self, request: RunRequest) -> Result<ContainerId, RuntimeError>;

    async fn list(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    async fn inspect(&self, id: &str) -> Result<ContainerDetails, RuntimeError>;

    /// Must report [`RuntimeError::AlreadyStopped`] rather than a generic
    /// failure when the container is not running.
    async fn stop(&self, id: &str) -> Result<(), RuntimeError>;

    async fn remove(&self, id: &str) -> Result<(), RuntimeError>;

    /// Reads a single file out of the container filesystem.
    async fn get_file(&self, id: &str, path: &str) -> Result<Vec<u8>, RuntimeError>;

    /// Follows the container output until it stops.
    fn logs(&self, id: &str) -> Self::LogStream;
}
