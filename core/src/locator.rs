use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// CIDv0 content token: `Qm` plus 44 base58 characters, optionally followed
/// by an item path such as `/0` or `/7.png`. Base58 excludes the visually
/// ambiguous `0`, `O`, `I` and `l`.
static CONTENT_TOKEN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"Qm[1-9A-HJ-NP-Za-km-z]{44}(?:/\d+(?:\.[A-Za-z0-9]+)?)?")
		.expect("content token pattern is valid")
});

/// A classified token or image locator.
///
/// Classification is pure and performs no i/o; the fetch stages decide what
/// to do with each variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
	/// Content-addressed identifier, normalized to the bare token (plus any
	/// item path), with scheme prefixes and gateway hosts stripped.
	ContentAddressed(String),
	/// Conventional URL, kept exactly as given.
	LocationAddressed(String),
}

impl Locator {
	/// Classify a raw URI-like string from the contract or from a metadata
	/// `image` field.
	///
	/// Anything that matches neither known scheme is a typed
	/// [`Error::UnsupportedLocator`] — never silently folded into one of the
	/// recognized variants.
	pub fn resolve(raw: &str) -> Result<Self> {
		if let Some(matched) = CONTENT_TOKEN.find(raw) {
			return Ok(Self::ContentAddressed(matched.as_str().to_owned()));
		}
		if raw.contains("https://") {
			return Ok(Self::LocationAddressed(raw.to_owned()));
		}
		Err(Error::UnsupportedLocator(raw.to_owned()))
	}

	/// The concrete URL this locator is fetched through. Content-addressed
	/// tokens go through the configured gateway, location-addressed URLs are
	/// used as given.
	#[must_use]
	pub fn to_fetch_url(&self, gateway: &str) -> String {
		match self {
			Self::ContentAddressed(token) => {
				format!("{}/{token}", gateway.trim_end_matches('/'))
			}
			Self::LocationAddressed(url) => url.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cid() -> String {
		format!("Qm{}", "a".repeat(44))
	}

	#[test]
	fn bare_content_token_resolves() {
		let raw = cid();
		assert_eq!(
			Locator::resolve(&raw).unwrap(),
			Locator::ContentAddressed(raw.clone())
		);
	}

	#[test]
	fn gateway_url_normalizes_to_token_and_item_path() {
		let raw = format!("https://gateway.pinata.cloud/ipfs/{}/12", cid());
		assert_eq!(
			Locator::resolve(&raw).unwrap(),
			Locator::ContentAddressed(format!("{}/12", cid()))
		);
	}

	#[test]
	fn scheme_prefix_is_stripped_and_image_extension_survives() {
		let raw = format!("ipfs://{}/7.png", cid());
		assert_eq!(
			Locator::resolve(&raw).unwrap(),
			Locator::ContentAddressed(format!("{}/7.png", cid()))
		);
	}

	#[test]
	fn https_url_passes_through_unmodified() {
		let raw = "https://example.com/x.json";
		assert_eq!(
			Locator::resolve(raw).unwrap(),
			Locator::LocationAddressed(raw.to_owned())
		);
	}

	#[test]
	fn ambiguous_base58_characters_break_the_match() {
		// 'l' is not a valid base58 character, so this is not a content token
		// and carries no location scheme either.
		let raw = format!("Qml{}", "a".repeat(43));
		assert!(matches!(
			Locator::resolve(&raw),
			Err(Error::UnsupportedLocator(_))
		));
	}

	#[test]
	fn unrecognized_scheme_is_a_typed_error() {
		match Locator::resolve("ftp://x") {
			Err(Error::UnsupportedLocator(raw)) => assert_eq!(raw, "ftp://x"),
			other => panic!("expected UnsupportedLocator, got {other:?}"),
		}
	}

	#[test]
	fn fetch_url_prefixes_gateway_for_content_tokens_only() {
		let token = Locator::ContentAddressed(format!("{}/3", cid()));
		assert_eq!(
			token.to_fetch_url("https://ipfs.io/ipfs/"),
			format!("https://ipfs.io/ipfs/{}/3", cid())
		);

		let url = Locator::LocationAddressed("https://example.com/x.json".to_owned());
		assert_eq!(
			url.to_fetch_url("https://ipfs.io/ipfs"),
			"https://example.com/x.json"
		);
	}
}
