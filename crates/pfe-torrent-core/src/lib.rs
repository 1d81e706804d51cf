#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Engine-agnostic transfer interfaces and DTOs.
//!
//! Layout: `model/` (identities, hashes, status snapshots, activity records,
//! seeding policy, engine alerts), `service/` (the `TransferEngine` capability
//! trait), `error.rs` (engine and encoding failures).

pub mod error;
pub mod model;
pub mod service;

pub use error::{EncodingError, EngineError, EngineResult};
pub use model::{
    ActivityState, ContentHash, EngineAlert, HASH_LEN, SeedingPolicy, TransferActivity,
    TransferId, TransferStatus,
};
pub use service::TransferEngine;
