pub mod bus;
pub mod sse;

pub use bus::SnapshotBus;
pub use sse::router;
