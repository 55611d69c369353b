//! Data storage and persistence
//!
//! The persistent block store, the in-memory pending-transaction pool,
//! and the artifact store backing block memory fragments.

pub mod artifacts;
pub mod block_store;
pub mod mempool;

pub use artifacts::{ArtifactStore, ContentAddressedStore};
pub use block_store::BlockStore;
pub use mempool::PendingPool;
