pub use fabric_testnet_core::*;

use miette::Diagnostic;
use std::{fmt::Display, time::Duration};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentPhase {
    AdminBootstrap,
    Registration,
    UserEnrollment,
}

impl Display for EnrollmentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::AdminBootstrap => "admin bootstrap",
            Self::Registration => "registration",
            Self::UserEnrollment => "user enrollment",
        };

        f.write_str(text)
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(fabric_testnet::config))]
    Config(#[from] ConfigValidationError),

    #[error("failed to start container from image {image}")]
    #[diagnostic(code(fabric_testnet::container_start))]
    ContainerStart {
        image: String,
        #[source]
        source: RuntimeError,
    },

    #[error("container did not report healthy within {timeout:?}, last probe: {last_failure}")]
    #[diagnostic(
        code(fabric_testnet::health_timeout),
        help("the image boots a full ledger network, slow hosts may need a longer health timeout")
    )]
    HealthCheckTimeout {
        timeout: Duration,
        last_failure: String,
    },

    #[error("{operation} requires a started container")]
    #[diagnostic(code(fabric_testnet::not_started), help("call start() first"))]
    ContainerNotStarted { operation: &'static str },

    #[error("private port {port} of container {container} has no host binding")]
    #[diagnostic(code(fabric_testnet::port_not_published))]
    PortNotPublished { container: String, port: PrivatePort },

    #[error("could not retrieve {path} from container {container}")]
    #[diagnostic(code(fabric_testnet::file_retrieval))]
    FileRetrieval {
        container: String,
        path: String,
        #[source]
        source: RuntimeError,
    },

    #[error("{phase} of {principal} failed")]
    #[diagnostic(code(fabric_testnet::enrollment))]
    Enrollment {
        phase: EnrollmentPhase,
        principal: String,
        #[source]
        source: CaError,
    },

    #[error("could not build a client for certificate authority {ca}")]
    #[diagnostic(code(fabric_testnet::ca_client))]
    CaClient {
        ca: String,
        #[source]
        source: CaError,
    },

    #[error("container runtime is not reachable")]
    #[diagnostic(
        code(fabric_testnet::runtime_unavailable),
        help("check that the docker daemon is running and DOCKER_HOST is correct")
    )]
    RuntimeUnavailable(#[source] RuntimeError),

    #[error("no container to {operation}")]
    #[diagnostic(code(fabric_testnet::no_container))]
    NoContainer { operation: &'static str },

    #[error("runtime failed to {operation} container {container}")]
    #[diagnostic(code(fabric_testnet::runtime))]
    Runtime {
        operation: &'static str,
        container: String,
        #[source]
        source: RuntimeError,
    },

    #[error("connection profile error: {0}")]
    #[diagnostic(code(fabric_testnet::profile))]
    Profile(#[from] ProfileError),
}

impl Error {
    pub fn container_start(image: impl Into<String>, source: RuntimeError) -> Error {
        Error::ContainerStart {
            image: image.into(),
            source,
        }
    }

    pub fn runtime(operation: &'static str, container: &ContainerHandle, source: RuntimeError) -> Error {
        Error::Runtime {
            operation,
            container: container.short_id().to_owned(),
            source,
        }
    }

    pub fn enrollment(phase: EnrollmentPhase, principal: &str, source: CaError) -> Error {
        Error::Enrollment {
            phase,
            principal: principal.to_owned(),
            source,
        }
    }

    /// Usage errors point at a bug in the caller; retrying the whole
    /// operation will not help.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::Config(_) | Error::NoContainer { .. })
    }
}
