//! Command handlers grouped by concern.

pub(crate) mod download;
pub(crate) mod library;
pub(crate) mod metadata;
pub(crate) mod queue;
pub(crate) mod remote;
pub(crate) mod server;
