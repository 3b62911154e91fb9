//! Replication and transport core of a LAN-local collaborative drawing
//! tool: an idempotent operation-log store, a TCP peer mesh with mDNS
//! discovery, and an advisory space arbiter that keeps peers out of each
//! other's drawing territory. Rendering, toolbars, and export live in the
//! application layer and only consume the stroke list this crate owns.

pub mod config;
pub mod models;
pub mod net;
pub mod session;
pub mod space;
pub mod store;
