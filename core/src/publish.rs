//! Publish stage.
//!
//! Two-phase upload of the flipped tree to a pinning service. The phases are
//! order-dependent: metadata references the content address minted for the
//! images, so the images must land first.

use crate::{
	error::{Error, Result},
	resume::{TreeKind, TreeLayout, IMAGE_EXT, METADATA_EXT},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::info;

/// Content address minted by one upload phase.
#[derive(Debug, Clone)]
pub struct PinResult {
	pub content_hash: String,
}

/// One file in a directory bundle headed for the pinning service.
#[derive(Debug)]
pub struct PinEntry {
	pub file_name: String,
	pub bytes: Vec<u8>,
}

/// Pinning service seam: a multipart directory upload returning the content
/// address of the pinned directory.
#[async_trait]
pub trait PinningService: Send + Sync {
	async fn pin_directory(&self, dir_name: &str, entries: Vec<PinEntry>) -> Result<PinResult>;
}

/// [`PinningService`] over a Pinata-shaped HTTP API.
pub struct HttpPinningService {
	client: reqwest::Client,
	api_url: String,
	jwt: String,
}

#[derive(Deserialize)]
struct PinResponse {
	#[serde(rename = "IpfsHash")]
	ipfs_hash: String,
}

impl HttpPinningService {
	pub fn new(client: reqwest::Client, api_url: impl Into<String>, jwt: impl Into<String>) -> Self {
		Self {
			client,
			api_url: api_url.into(),
			jwt: jwt.into(),
		}
	}
}

#[async_trait]
impl PinningService for HttpPinningService {
	async fn pin_directory(&self, dir_name: &str, entries: Vec<PinEntry>) -> Result<PinResult> {
		let mut form = reqwest::multipart::Form::new();
		for entry in entries {
			let part = reqwest::multipart::Part::bytes(entry.bytes)
				.file_name(format!("{dir_name}/{}", entry.file_name));
			form = form.part("file", part);
		}

		let response: PinResponse = self
			.client
			.post(format!(
				"{}/pinning/pinFileToIPFS",
				self.api_url.trim_end_matches('/')
			))
			.bearer_auth(&self.jwt)
			.multipart(form)
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(|e| Error::Upstream(format!("pinning upload failed: {e}")))?
			.json()
			.await
			.map_err(|e| Error::Upstream(format!("pinning response was malformed: {e}")))?;

		Ok(PinResult {
			content_hash: response.ipfs_hash,
		})
	}
}

/// Rewrite a metadata document's `image` field to the canonical reference
/// under the pinned images directory.
///
/// Every other field is left untouched, documents without an `image` field
/// are left alone entirely, and re-applying the rewrite with the same hash
/// is a no-op.
pub fn rewrite_image_field(metadata: &mut Value, images_hash: &str, id: &str) {
	if let Some(fields) = metadata.as_object_mut() {
		if fields.contains_key("image") {
			fields.insert(
				"image".to_owned(),
				Value::String(format!("ipfs://{images_hash}/{id}.{IMAGE_EXT}")),
			);
		}
	}
}

/// What the publish stage minted.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
	pub images_hash: String,
	pub metadata_hash: String,
}

pub struct PublishStage<'a> {
	pub layout: &'a TreeLayout,
	pub pinning: &'a dyn PinningService,
}

impl PublishStage<'_> {
	/// Phase A pins the flipped images; phase B rewrites each metadata
	/// document against the minted images hash and pins the result. Phase B
	/// cannot run first — its rewrite needs phase A's hash.
	pub async fn run(&self, collection_name: &str) -> Result<PublishOutcome> {
		let images = bundle_dir(&self.layout.images_dir(TreeKind::Flipped), |_, bytes| {
			Ok(Some(bytes))
		})
		.await?;
		let images_result = self
			.pinning
			.pin_directory(&format!("{collection_name} images"), images)
			.await?;
		info!(hash = %images_result.content_hash, "pinned flipped images");

		let images_hash = images_result.content_hash.clone();
		let metadata = bundle_dir(&self.layout.tree_dir(TreeKind::Flipped), |name, bytes| {
			let Some(id) = name.strip_suffix(&format!(".{METADATA_EXT}")) else {
				return Ok(None);
			};
			let mut document: Value = serde_json::from_slice(&bytes)?;
			rewrite_image_field(&mut document, &images_hash, id);
			Ok(Some(serde_json::to_vec_pretty(&document)?))
		})
		.await?;
		let metadata_result = self
			.pinning
			.pin_directory(&format!("{collection_name} metadata"), metadata)
			.await?;
		info!(hash = %metadata_result.content_hash, "pinned rewritten metadata");

		Ok(PublishOutcome {
			images_hash: images_result.content_hash,
			metadata_hash: metadata_result.content_hash,
		})
	}
}

/// Collect every regular file directly under `dir` into pin entries, running
/// each file through the injected `preprocess` strategy. Returning `None`
/// drops the file from the bundle. Entries are sorted by name so bundles are
/// deterministic.
async fn bundle_dir<F>(dir: &Path, mut preprocess: F) -> Result<Vec<PinEntry>>
where
	F: FnMut(&str, Vec<u8>) -> Result<Option<Vec<u8>>>,
{
	let mut entries = vec![];
	let mut read_dir = fs::read_dir(dir).await.map_err(|e| Error::storage(dir, e))?;
	while let Some(entry) = read_dir
		.next_entry()
		.await
		.map_err(|e| Error::storage(dir, e))?
	{
		let path = entry.path();
		if !path.is_file() {
			continue;
		}
		let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
			continue;
		};
		let bytes = fs::read(&path).await.map_err(|e| Error::storage(&path, e))?;
		if let Some(bytes) = preprocess(file_name, bytes)? {
			entries.push(PinEntry {
				file_name: file_name.to_owned(),
				bytes,
			});
		}
	}
	entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
	Ok(entries)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn rewrite_replaces_image_and_nothing_else() {
		let mut document = json!({
			"image": "ipfs://oldcid/7.png",
			"name": "X",
			"attributes": [{"trait_type": "fur", "value": "golden"}],
		});
		rewrite_image_field(&mut document, "H", "7");

		assert_eq!(
			document,
			json!({
				"image": "ipfs://H/7.png",
				"name": "X",
				"attributes": [{"trait_type": "fur", "value": "golden"}],
			})
		);
	}

	#[test]
	fn rewrite_is_idempotent() {
		let mut document = json!({ "image": "ipfs://oldcid/3.png", "name": "X" });
		rewrite_image_field(&mut document, "H", "3");
		let first = serde_json::to_vec(&document).unwrap();

		rewrite_image_field(&mut document, "H", "3");
		assert_eq!(serde_json::to_vec(&document).unwrap(), first);
	}

	#[test]
	fn rewrite_leaves_imageless_documents_alone() {
		let mut document = json!({ "name": "no art here" });
		let before = document.clone();
		rewrite_image_field(&mut document, "H", "9");
		assert_eq!(document, before);
	}

	#[tokio::test]
	async fn bundles_are_sorted_and_respect_the_strategy() {
		let tmp = tempfile::TempDir::new().unwrap();
		std::fs::write(tmp.path().join("2.json"), b"{}").unwrap();
		std::fs::write(tmp.path().join("0.json"), b"{}").unwrap();
		std::fs::write(tmp.path().join("skip.txt"), b"x").unwrap();
		std::fs::create_dir(tmp.path().join("images")).unwrap();

		let entries = bundle_dir(tmp.path(), |name, bytes| {
			Ok(name.ends_with(".json").then_some(bytes))
		})
		.await
		.unwrap();

		let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
		assert_eq!(names, ["0.json", "2.json"]);
	}
}
