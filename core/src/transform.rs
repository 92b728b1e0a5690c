//! Transform stage.
//!
//! Mirrors every fetched token into the flipped tree: metadata copied
//! verbatim, images flipped around their vertical axis. The walk is bounded
//! by the original tree's watermark — not the collection size — so the
//! flipped tree never runs ahead of what is durably fetched.

use crate::{
	error::{Error, Result},
	resume::{self, TreeKind, TreeLayout},
	write::write_atomic,
};
use tokio::{fs, task};
use tracing::{info, warn};

/// What one transform-stage run accomplished.
#[derive(Debug, Default)]
pub struct TransformOutcome {
	/// Highest id with durable flipped files after this run.
	pub watermark: Option<u64>,
	/// Tokens flipped by this run.
	pub flipped: u64,
}

pub struct TransformStage<'a> {
	pub layout: &'a TreeLayout,
}

impl TransformStage<'_> {
	/// Walk from the flipped tree's resume point while the cursor is within
	/// the original watermark; the terminal cursor is exactly one past it.
	pub async fn run(&self, original_watermark: Option<u64>) -> Result<TransformOutcome> {
		let watermark = resume::sync_tree(self.layout, TreeKind::Flipped).await?;
		let mut outcome = TransformOutcome {
			watermark,
			..Default::default()
		};

		let Some(bound) = original_watermark else {
			info!("nothing fetched yet, nothing to flip");
			return Ok(outcome);
		};

		for id in resume::next_id(watermark)..=bound {
			if self.flip_one(id).await? {
				outcome.watermark = Some(id);
				outcome.flipped += 1;
			}
		}

		Ok(outcome)
	}

	/// Returns `false` for ids the original tree has no metadata for (tokens
	/// the fetch stage reported as skipped); the gap is carried over rather
	/// than invented here.
	async fn flip_one(&self, id: u64) -> Result<bool> {
		let src_metadata = self.layout.metadata_path(TreeKind::Original, id);
		if !src_metadata.exists() {
			warn!(id, "original metadata missing, carrying the gap over");
			return Ok(false);
		}
		let metadata = fs::read(&src_metadata)
			.await
			.map_err(|e| Error::storage(&src_metadata, e))?;

		let src_image = self.layout.image_path(TreeKind::Original, id);
		if src_image.exists() {
			let mirrored =
				task::spawn_blocking(move || tf_images::mirror_file(&src_image)).await??;
			write_atomic(&self.layout.image_path(TreeKind::Flipped, id), &mirrored).await?;
		}

		write_atomic(&self.layout.metadata_path(TreeKind::Flipped, id), &metadata).await?;
		info!(id, "flipped token");
		Ok(true)
	}
}
