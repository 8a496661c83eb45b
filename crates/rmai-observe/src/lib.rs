//! Observability setup shared by the `rmai` binary.

pub mod tracing_setup;
