//! Background synchronization against the remote system of record.

pub mod client;
pub mod connectivity;
pub mod coordinator;
pub mod photos;

pub use connectivity::ConnectivityMonitor;
pub use coordinator::SyncCoordinator;
