//! Remote client surface for the loghub offset reader.
//!
//! This crate holds the narrow capability interface the reader consumes
//! ([`LogStoreClient`]: list shards, get cursor, get cursor time, get
//! histograms) and the process-wide client cache ([`ClientPool`]) that hands
//! out one live handle per `(access_key_id, endpoint)` pair.
//!
//! The actual transport is a collaborator, not part of this workspace: a
//! concrete client implementation is injected into the pool through a
//! factory, and the reader only ever sees `Arc<dyn LogStoreClient>`.
//!
//! [`testing`] provides a scripted mock client used by the reader's tests.

pub mod client;
pub mod pool;
pub mod testing;

pub use client::{Credentials, LogStoreClient};
pub use pool::{ClientFactory, ClientPool};
