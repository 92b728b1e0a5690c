//! Original fetch stage.
//!
//! Walks the token id space from the on-disk resume point to the collection
//! size, exactly once per id, persisting each token's metadata and image
//! into the original tree.

use crate::{
	contract::{Collection, ContractClient},
	error::{Error, Result},
	locator::Locator,
	resume::{self, TreeKind, TreeLayout},
	write::write_atomic,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// Raw HTTP fetch seam, kept behind a trait so the stage can run against a
/// fake network in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
	async fn fetch_json(&self, url: &str) -> Result<Value>;
	async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed [`Fetcher`] used by the real pipeline.
pub struct HttpFetcher {
	client: reqwest::Client,
}

impl HttpFetcher {
	#[must_use]
	pub fn new(client: reqwest::Client) -> Self {
		Self { client }
	}

	async fn get(&self, url: &str) -> Result<reqwest::Response> {
		self.client
			.get(url)
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(Error::from)
	}
}

#[async_trait]
impl Fetcher for HttpFetcher {
	async fn fetch_json(&self, url: &str) -> Result<Value> {
		Ok(self.get(url).await?.json().await?)
	}

	async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
		Ok(self.get(url).await?.bytes().await?.to_vec())
	}
}

/// A token the stage gave up on, with the failure that caused it.
#[derive(Debug)]
pub struct SkippedToken {
	pub id: u64,
	pub reason: Error,
}

/// What one fetch-stage run accomplished.
#[derive(Debug, Default)]
pub struct FetchOutcome {
	/// Highest id with durable files after this run, `None` when nothing has
	/// ever been fetched.
	pub watermark: Option<u64>,
	/// Tokens persisted by this run (resumed runs over a complete tree
	/// report zero).
	pub fetched: u64,
	/// Tokens this run could not fetch; the run continues past them.
	pub skipped: Vec<SkippedToken>,
}

pub struct FetchStage<'a> {
	pub contract: &'a dyn ContractClient,
	pub fetcher: &'a dyn Fetcher,
	pub gateway: &'a str,
	pub layout: &'a TreeLayout,
}

impl FetchStage<'_> {
	/// Walk the id space from the resume point to `collection.size`
	/// (exclusive), strictly increasing, never skipping an id once started.
	///
	/// Locator classification, metadata/image fetches and payload parsing
	/// fail per token: the failure is recorded in the outcome and the walk
	/// continues. Contract calls and storage writes stay fatal — the former
	/// means the id space itself is unreadable, the latter puts resume
	/// correctness in doubt.
	pub async fn run(&self, collection: &Collection) -> Result<FetchOutcome> {
		let watermark = resume::sync_tree(self.layout, TreeKind::Original).await?;
		let mut outcome = FetchOutcome {
			watermark,
			..Default::default()
		};

		let start = resume::next_id(watermark);
		if start >= collection.size {
			info!(?watermark, "original tree already up to date");
			return Ok(outcome);
		}

		info!(start, size = collection.size, "fetching originals");
		for id in start..collection.size {
			match self.fetch_one(id).await {
				Ok(()) => {
					outcome.watermark = Some(id);
					outcome.fetched += 1;
				}
				Err(err @ (Error::Upstream(_) | Error::Storage { .. } | Error::Task(_))) => {
					return Err(err);
				}
				Err(reason) => {
					warn!(id, %reason, "skipping token");
					outcome.skipped.push(SkippedToken { id, reason });
				}
			}
		}

		Ok(outcome)
	}

	async fn fetch_one(&self, id: u64) -> Result<()> {
		let raw = self.contract.token_uri(id).await?;
		let locator = Locator::resolve(&raw)?;
		let metadata = self
			.fetcher
			.fetch_json(&locator.to_fetch_url(self.gateway))
			.await?;

		// The image lands before its metadata so the resume scan never sees
		// a metadata file whose image sibling is missing.
		if let Some(image) = metadata.get("image").and_then(Value::as_str) {
			let image_locator = Locator::resolve(image)?;
			let bytes = self
				.fetcher
				.fetch_bytes(&image_locator.to_fetch_url(self.gateway))
				.await?;
			write_atomic(&self.layout.image_path(TreeKind::Original, id), &bytes).await?;
		}

		let bytes = serde_json::to_vec_pretty(&metadata)?;
		write_atomic(&self.layout.metadata_path(TreeKind::Original, id), &bytes).await?;
		info!(id, "fetched token");
		Ok(())
	}
}
