//! Resumable mirror/flip/republish pipeline for NFT collections.
//!
//! The pipeline keeps a local on-disk mirror of a collection's metadata and
//! images, applies a horizontal mirror to every image, and republishes the
//! transformed set to content-addressed storage through a pinning service.
//!
//! ```text
//! contract ──▶ inspect ──▶ fetch originals ──▶ flip ──▶ [confirm] ──▶ publish
//!                              │                 │                       │
//!                              ▼                 ▼                       ▼
//!                      out/<contract>/   out/<contract>/           pinning service
//!                         original/         flipped/
//! ```
//!
//! Every stage derives its resume point purely from on-disk state and every
//! artifact write is atomic (temp file + rename), so the process can be
//! killed at any point and restarted without re-fetching or re-processing
//! completed tokens.

pub mod config;
pub mod contract;
pub mod error;
pub mod fetch;
pub mod locator;
pub mod pipeline;
pub mod publish;
pub mod resume;
pub mod transform;
mod write;

pub use config::{Config, PinningConfig, DEFAULT_GATEWAY};
pub use contract::{inspect, Collection, ContractClient, EthContractClient};
pub use error::{Error, Result};
pub use fetch::{FetchOutcome, FetchStage, Fetcher, HttpFetcher, SkippedToken};
pub use locator::Locator;
pub use pipeline::{AutoConfirm, ConfirmGate, Pipeline, RunOutcome};
pub use publish::{
	rewrite_image_field, HttpPinningService, PinEntry, PinResult, PinningService, PublishOutcome,
	PublishStage,
};
pub use resume::{next_id, sync_tree, TreeKind, TreeLayout};
pub use transform::{TransformOutcome, TransformStage};
