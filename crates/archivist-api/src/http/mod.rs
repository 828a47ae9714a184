//! HTTP handlers, middleware and router wiring.

pub(crate) mod archive;
pub(crate) mod constants;
pub(crate) mod errors;
pub(crate) mod health;
pub(crate) mod index;
pub(crate) mod router;
pub(crate) mod telemetry;
