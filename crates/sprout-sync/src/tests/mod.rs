//! Tests for the sync layer, run against scripted remotes on a paused clock
//! unless they need real I/O.

mod context;
mod network;
mod resource_cache;
