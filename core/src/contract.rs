//! Read-only view of the collection contract.
//!
//! The pipeline needs exactly three calls: the collection name, the total
//! supply and the locator string for each token. They sit behind
//! [`ContractClient`] so tests can run against a fake chain; the shipped
//! implementation speaks `eth_call` JSON-RPC with hand-rolled selectors.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// The three read-only contract calls the pipeline consumes.
#[async_trait]
pub trait ContractClient: Send + Sync {
	async fn name(&self) -> Result<String>;
	async fn total_supply(&self) -> Result<u64>;
	async fn token_uri(&self, id: u64) -> Result<String>;
}

/// Name and size of the collection under synchronization. Built once at
/// pipeline start, immutable afterwards.
#[derive(Debug, Clone)]
pub struct Collection {
	pub name: String,
	pub size: u64,
}

/// One-shot read of the collection identity.
///
/// No retry and no caching beyond the single run: the run cannot proceed
/// without a collection size, so a failed call is fatal.
pub async fn inspect(client: &dyn ContractClient) -> Result<Collection> {
	let name = client.name().await?;
	let size = client.total_supply().await?;
	debug!(name, size, "inspected collection");
	Ok(Collection { name, size })
}

/// `name()`
const SELECTOR_NAME: &str = "0x06fdde03";
/// `totalSupply()`
const SELECTOR_TOTAL_SUPPLY: &str = "0x18160ddd";
/// `tokenURI(uint256)`
const SELECTOR_TOKEN_URI: &str = "0xc87b56dd";

/// [`ContractClient`] over plain `eth_call` JSON-RPC.
pub struct EthContractClient {
	client: reqwest::Client,
	rpc_url: String,
	contract_address: String,
}

#[derive(Deserialize)]
struct RpcResponse {
	result: Option<String>,
	error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
	code: i64,
	message: String,
}

impl EthContractClient {
	pub fn new(
		client: reqwest::Client,
		rpc_url: impl Into<String>,
		contract_address: impl Into<String>,
	) -> Self {
		Self {
			client,
			rpc_url: rpc_url.into(),
			contract_address: contract_address.into(),
		}
	}

	async fn eth_call(&self, calldata: String) -> Result<Vec<u8>> {
		let response: RpcResponse = self
			.client
			.post(&self.rpc_url)
			.json(&json!({
				"jsonrpc": "2.0",
				"id": 1,
				"method": "eth_call",
				"params": [{ "to": self.contract_address, "data": calldata }, "latest"],
			}))
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(|e| Error::Upstream(format!("eth_call to {}: {e}", self.rpc_url)))?
			.json()
			.await
			.map_err(|e| Error::Upstream(format!("eth_call returned malformed json: {e}")))?;

		if let Some(err) = response.error {
			return Err(Error::Upstream(format!(
				"rpc error {}: {}",
				err.code, err.message
			)));
		}
		let result = response.result.ok_or_else(|| {
			Error::Upstream("rpc response had neither result nor error".to_owned())
		})?;
		hex::decode(result.trim_start_matches("0x"))
			.map_err(|e| Error::Upstream(format!("rpc returned invalid hex: {e}")))
	}
}

#[async_trait]
impl ContractClient for EthContractClient {
	async fn name(&self) -> Result<String> {
		let data = self.eth_call(SELECTOR_NAME.to_owned()).await?;
		decode_string(&data)
	}

	async fn total_supply(&self) -> Result<u64> {
		let data = self.eth_call(SELECTOR_TOTAL_SUPPLY.to_owned()).await?;
		decode_u64(&data)
	}

	async fn token_uri(&self, id: u64) -> Result<String> {
		let data = self
			.eth_call(format!("{SELECTOR_TOKEN_URI}{id:064x}"))
			.await?;
		decode_string(&data)
	}
}

/// Decode a single ABI `uint256` return word into a `u64`.
fn decode_u64(data: &[u8]) -> Result<u64> {
	let word = read_word(data, 0)?;
	if word[..24].iter().any(|&b| b != 0) {
		return Err(Error::Upstream("uint256 does not fit in a u64".to_owned()));
	}
	let mut tail = [0u8; 8];
	tail.copy_from_slice(&word[24..]);
	Ok(u64::from_be_bytes(tail))
}

/// Decode a single ABI dynamic `string` return value (offset word, length
/// word, utf-8 payload).
fn decode_string(data: &[u8]) -> Result<String> {
	let offset = word_as_usize(data, 0)?;
	let len = word_as_usize(data, offset)?;
	let start = offset.checked_add(32);
	let bytes = start
		.and_then(|start| data.get(start..start.checked_add(len)?))
		.ok_or_else(|| Error::Upstream("abi string payload out of bounds".to_owned()))?;
	String::from_utf8(bytes.to_vec())
		.map_err(|e| Error::Upstream(format!("abi string is not utf-8: {e}")))
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8]> {
	at.checked_add(32)
		.and_then(|end| data.get(at..end))
		.ok_or_else(|| Error::Upstream(format!("abi word at offset {at} out of bounds")))
}

fn word_as_usize(data: &[u8], at: usize) -> Result<usize> {
	let word = read_word(data, at)?;
	if word[..24].iter().any(|&b| b != 0) {
		return Err(Error::Upstream(format!(
			"abi word at offset {at} is unreasonably large"
		)));
	}
	let mut tail = [0u8; 8];
	tail.copy_from_slice(&word[24..]);
	usize::try_from(u64::from_be_bytes(tail))
		.map_err(|e| Error::Upstream(format!("abi word does not fit a usize: {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn uint_word(value: u64) -> Vec<u8> {
		let mut word = vec![0u8; 32];
		word[24..].copy_from_slice(&value.to_be_bytes());
		word
	}

	#[test]
	fn decodes_total_supply_word() {
		assert_eq!(decode_u64(&uint_word(10_000)).unwrap(), 10_000);
	}

	#[test]
	fn rejects_oversized_supply() {
		let mut word = uint_word(1);
		word[0] = 0xff;
		assert!(matches!(decode_u64(&word), Err(Error::Upstream(_))));
	}

	#[test]
	fn decodes_dynamic_string() {
		// offset = 32, length = 4, "BAYC" padded to a word
		let mut data = uint_word(32);
		data.extend(uint_word(4));
		let mut payload = b"BAYC".to_vec();
		payload.resize(32, 0);
		data.extend(payload);

		assert_eq!(decode_string(&data).unwrap(), "BAYC");
	}

	#[test]
	fn truncated_string_payload_is_an_upstream_error() {
		let mut data = uint_word(32);
		data.extend(uint_word(64));
		assert!(matches!(decode_string(&data), Err(Error::Upstream(_))));
	}

	#[test]
	fn token_uri_calldata_pads_the_id_to_a_word() {
		let calldata = format!("{SELECTOR_TOKEN_URI}{:064x}", 7u64);
		assert_eq!(calldata.len(), 10 + 64);
		assert!(calldata.ends_with("0000007"));
	}
}
