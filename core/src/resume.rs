//! Directory state tracking.
//!
//! The resume point of every stage is derived purely from on-disk state: the
//! highest id with a metadata file in the stage's tree. Nothing is cached
//! between stage invocations, so a killed process resumes from exactly what
//! is durable.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::trace;

pub const METADATA_EXT: &str = "json";
pub const IMAGE_EXT: &str = "png";
const IMAGES_DIR: &str = "images";

/// The two on-disk trees a collection mirror maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
	Original,
	Flipped,
}

impl TreeKind {
	#[must_use]
	pub const fn dir_name(self) -> &'static str {
		match self {
			Self::Original => "original",
			Self::Flipped => "flipped",
		}
	}
}

/// Path helpers for one contract's output tree.
#[derive(Debug, Clone)]
pub struct TreeLayout {
	root: PathBuf,
}

impl TreeLayout {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	#[must_use]
	pub fn tree_dir(&self, kind: TreeKind) -> PathBuf {
		self.root.join(kind.dir_name())
	}

	#[must_use]
	pub fn images_dir(&self, kind: TreeKind) -> PathBuf {
		self.tree_dir(kind).join(IMAGES_DIR)
	}

	#[must_use]
	pub fn metadata_path(&self, kind: TreeKind, id: u64) -> PathBuf {
		self.tree_dir(kind).join(format!("{id}.{METADATA_EXT}"))
	}

	#[must_use]
	pub fn image_path(&self, kind: TreeKind, id: u64) -> PathBuf {
		self.images_dir(kind).join(format!("{id}.{IMAGE_EXT}"))
	}
}

/// Derive the resume watermark for one tree from on-disk state alone.
///
/// Returns `None` when nothing has been persisted yet (the caller starts at
/// id 0), otherwise the highest id with a metadata file in the tree (the
/// caller starts at that id plus one). Creates the tree's directories on
/// first use. Performs no network i/o and is safe to call repeatedly.
pub async fn sync_tree(layout: &TreeLayout, kind: TreeKind) -> Result<Option<u64>> {
	let images_dir = layout.images_dir(kind);
	if !images_dir.exists() {
		fs::create_dir_all(&images_dir)
			.await
			.map_err(|e| Error::storage(&images_dir, e))?;
		return Ok(None);
	}

	let tree_dir = layout.tree_dir(kind);
	let mut entries = fs::read_dir(&tree_dir)
		.await
		.map_err(|e| Error::storage(&tree_dir, e))?;

	let mut watermark = None;
	while let Some(entry) = entries
		.next_entry()
		.await
		.map_err(|e| Error::storage(&tree_dir, e))?
	{
		if let Some(id) = parse_metadata_id(&entry.path()) {
			watermark = Some(watermark.map_or(id, |w: u64| w.max(id)));
		}
	}

	trace!(tree = kind.dir_name(), ?watermark, "synced tree state");
	Ok(watermark)
}

/// The first id a stage should process given a tree's watermark.
#[must_use]
pub const fn next_id(watermark: Option<u64>) -> u64 {
	match watermark {
		Some(id) => id + 1,
		None => 0,
	}
}

/// Parse `<id>.json` filenames; anything else (subdirectories, temp files,
/// non-numeric names) is skipped silently.
fn parse_metadata_id(path: &Path) -> Option<u64> {
	let name = path.file_name()?.to_str()?;
	let stem = name.strip_suffix(".json")?;
	stem.parse().ok()
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn fresh_directory_is_created_and_has_no_watermark() {
		let tmp = TempDir::new().unwrap();
		let layout = TreeLayout::new(tmp.path());

		let watermark = sync_tree(&layout, TreeKind::Original).await.unwrap();
		assert_eq!(watermark, None);
		assert!(layout.images_dir(TreeKind::Original).is_dir());
		assert_eq!(next_id(watermark), 0);
	}

	#[tokio::test]
	async fn watermark_is_the_highest_metadata_id() {
		let tmp = TempDir::new().unwrap();
		let layout = TreeLayout::new(tmp.path());
		sync_tree(&layout, TreeKind::Original).await.unwrap();

		for id in [0u64, 2, 5] {
			std::fs::write(layout.metadata_path(TreeKind::Original, id), b"{}").unwrap();
		}

		let watermark = sync_tree(&layout, TreeKind::Original).await.unwrap();
		assert_eq!(watermark, Some(5));
		assert_eq!(next_id(watermark), 6);
	}

	#[tokio::test]
	async fn malformed_filenames_are_skipped() {
		let tmp = TempDir::new().unwrap();
		let layout = TreeLayout::new(tmp.path());
		sync_tree(&layout, TreeKind::Flipped).await.unwrap();

		let dir = layout.tree_dir(TreeKind::Flipped);
		std::fs::write(dir.join("3.json"), b"{}").unwrap();
		std::fs::write(dir.join("notes.json"), b"{}").unwrap();
		std::fs::write(dir.join("9.txt"), b"").unwrap();
		std::fs::write(dir.join("7.tmp"), b"partial").unwrap();

		assert_eq!(sync_tree(&layout, TreeKind::Flipped).await.unwrap(), Some(3));
	}

	#[tokio::test]
	async fn sync_is_idempotent() {
		let tmp = TempDir::new().unwrap();
		let layout = TreeLayout::new(tmp.path());

		for _ in 0..3 {
			assert_eq!(sync_tree(&layout, TreeKind::Original).await.unwrap(), None);
		}

		std::fs::write(layout.metadata_path(TreeKind::Original, 1), b"{}").unwrap();
		for _ in 0..3 {
			assert_eq!(
				sync_tree(&layout, TreeKind::Original).await.unwrap(),
				Some(1)
			);
		}
	}
}
