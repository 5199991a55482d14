//! Reconciliation pipeline.
//!
//! Inventory both sides, plan the difference, then copy it with a bounded
//! number of transfers in flight.

pub mod engine;
pub mod exclude;
pub mod executor;
pub mod hash;
pub mod inventory;
pub mod planner;
pub mod resolver;
pub mod scheduler;

pub use engine::{SyncEngine, SyncMode, SyncOptions, SyncPair, SyncReport, SyncState};
pub use exclude::ExcludePatterns;
pub use executor::{LocalToRemote, RemoteToLocal, RemoteToRemote, TransferExecutor, TransferTask};
pub use hash::{hash_bytes, hash_file};
pub use inventory::{build_local, build_remote, Inventory};
pub use planner::{plan, plan_filtered, Plan};
pub use resolver::{resolve, BucketRegistry};
pub use scheduler::{TransferReport, DEFAULT_CONCURRENCY};
