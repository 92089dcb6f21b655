//! Precog Storage Layer
//!
//! Provides persistence for position snapshots and audit events.
//!
//! # Architecture
//!
//! - **Repository traits**: Define the storage interface (ports)
//! - **In-memory store**: Fast implementation for testing and development
//!
//! # Usage
//!
//! ```rust
//! use precog_store::{MemoryStore, Store};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!
//!     let open = store.positions().find_open().await.unwrap();
//!     println!("Open positions: {}", open.len());
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
mod repository;

// Re-exports
pub use error::StoreError;
pub use memory::MemoryStore;
pub use repository::{EventRepository, PositionRepository, Store};
