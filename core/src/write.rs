use crate::error::{Error, Result};
use std::path::Path;
use tokio::fs;

/// Write `bytes` to `path` via a temporary sibling and a rename.
///
/// No reader — including the resume scan — ever observes a partially written
/// file; the whole restart strategy depends on this.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
	let tmp_path = path.with_extension("tmp");
	fs::write(&tmp_path, bytes)
		.await
		.map_err(|e| Error::storage(&tmp_path, e))?;
	fs::rename(&tmp_path, path)
		.await
		.map_err(|e| Error::storage(path, e))?;
	Ok(())
}
