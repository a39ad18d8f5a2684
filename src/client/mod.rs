//! Clients for external collaborators of the pipeline.

pub mod provider;

pub use provider::{HttpSnapshotProvider, NoSnapshots, SnapshotProvider};
