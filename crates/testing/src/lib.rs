//! Test doubles for the container runtime and certificate authority seams.

pub mod ca;
pub mod fixtures;
pub mod runtime;

pub use ca::StubCa;
pub use runtime::{FakeRuntime, RuntimeFault};
