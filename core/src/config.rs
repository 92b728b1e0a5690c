use std::path::PathBuf;

/// Public IPFS gateway used when none is configured.
pub const DEFAULT_GATEWAY: &str = "https://ipfs.io/ipfs";

/// Everything the pipeline needs from the environment, resolved once at
/// startup before any stage is constructed.
#[derive(Debug, Clone)]
pub struct Config {
	/// Ethereum JSON-RPC endpoint.
	pub rpc_url: String,
	/// Address of the collection contract to mirror.
	pub contract_address: String,
	/// Gateway base URL content-addressed locators are fetched through.
	pub gateway_url: String,
	/// Root of the on-disk mirror; each contract gets its own subtree.
	pub output_dir: PathBuf,
	/// Publish credentials; the publish stage is skipped when absent.
	pub pinning: Option<PinningConfig>,
}

#[derive(Debug, Clone)]
pub struct PinningConfig {
	pub api_url: String,
	pub jwt: String,
}

impl Config {
	/// Root of the on-disk mirror for the configured contract.
	#[must_use]
	pub fn contract_root(&self) -> PathBuf {
		self.output_dir.join(&self.contract_address)
	}
}
