//! Pipeline orchestration.
//!
//! Threads the immutable [`Collection`] and configuration through the stages
//! in order: inspect, fetch, flip, confirm, publish. No stage mutates state
//! it does not own; everything a stage needs arrives as an argument.

use crate::{
	config::Config,
	contract::{self, Collection, ContractClient},
	error::Result,
	fetch::{FetchOutcome, FetchStage, Fetcher},
	publish::{PinningService, PublishOutcome, PublishStage},
	resume::{self, TreeLayout},
	transform::{TransformOutcome, TransformStage},
};
use async_trait::async_trait;
use tracing::{info, warn};

/// Blocking yes/no confirmation between transform and publish.
#[async_trait]
pub trait ConfirmGate: Send + Sync {
	async fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Gate that always answers yes, for `--yes` runs and tests.
pub struct AutoConfirm;

#[async_trait]
impl ConfirmGate for AutoConfirm {
	async fn confirm(&self, _prompt: &str) -> Result<bool> {
		Ok(true)
	}
}

/// What a full pipeline run accomplished.
#[derive(Debug)]
pub struct RunOutcome {
	pub collection: Collection,
	pub fetch: FetchOutcome,
	pub transform: TransformOutcome,
	/// `None` when publish was skipped: no credential configured, or the
	/// confirmation gate was declined.
	pub publish: Option<PublishOutcome>,
}

pub struct Pipeline<'a> {
	pub config: &'a Config,
	pub contract: &'a dyn ContractClient,
	pub fetcher: &'a dyn Fetcher,
	pub pinning: Option<&'a dyn PinningService>,
	pub gate: &'a dyn ConfirmGate,
}

impl Pipeline<'_> {
	pub async fn run(&self) -> Result<RunOutcome> {
		let collection = contract::inspect(self.contract).await?;
		info!(name = %collection.name, size = collection.size, "starting run");

		let layout = TreeLayout::new(self.config.contract_root());

		let fetch = FetchStage {
			contract: self.contract,
			fetcher: self.fetcher,
			gateway: &self.config.gateway_url,
			layout: &layout,
		}
		.run(&collection)
		.await?;
		if !fetch.skipped.is_empty() {
			let ids: Vec<u64> = fetch.skipped.iter().map(|s| s.id).collect();
			warn!(?ids, "tokens skipped during fetch");
		}

		let transform = TransformStage { layout: &layout }.run(fetch.watermark).await?;

		let publish = match self.pinning {
			None => {
				info!("no pinning credential configured, skipping publish");
				None
			}
			Some(pinning) => {
				let flipped_total = resume::next_id(transform.watermark);
				let prompt = format!(
					"publish {flipped_total} flipped tokens of \"{}\" to the pinning service?",
					collection.name
				);
				if self.gate.confirm(&prompt).await? {
					Some(
						PublishStage {
							layout: &layout,
							pinning,
						}
						.run(&collection.name)
						.await?,
					)
				} else {
					info!("publish declined, stopping before upload");
					None
				}
			}
		};

		Ok(RunOutcome {
			collection,
			fetch,
			transform,
			publish,
		})
	}
}
