//! HTTP clients for the embedding and rerank providers.

pub mod embedding;
pub mod rerank;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Bearer authorization plus the configured default headers. Non-string header values are
/// rendered as JSON text.
pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
		.map_err(|_| Error::Header { name: AUTHORIZATION.to_string() })?;

	headers.insert(AUTHORIZATION, bearer);

	for (key, value) in default_headers {
		let raw = match value {
			Value::String(text) => text.clone(),
			other => other.to_string(),
		};
		let name = HeaderName::from_bytes(key.as_bytes())
			.map_err(|_| Error::Header { name: key.clone() })?;
		let value = HeaderValue::from_str(&raw).map_err(|_| Error::Header { name: key.clone() })?;

		headers.insert(name, value);
	}

	Ok(headers)
}

struct Endpoint<'a> {
	url: String,
	api_key: &'a str,
	default_headers: &'a Map<String, Value>,
	timeout: Duration,
}
impl Endpoint<'_> {
	async fn post<B, R>(&self, body: &B) -> Result<R>
	where
		B: Serialize + ?Sized,
		R: DeserializeOwned,
	{
		let client = Client::builder().timeout(self.timeout).build()?;
		let res = client
			.post(&self.url)
			.headers(auth_headers(self.api_key, self.default_headers)?)
			.json(body)
			.send()
			.await?
			.error_for_status()?;
		let bytes = res.bytes().await?;

		Ok(serde_json::from_slice(&bytes)?)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn headers_include_bearer_and_defaults() {
		let defaults = json!({ "x-team": "search", "x-retries": 2 });
		let headers = auth_headers("secret", defaults.as_object().expect("Object literal."))
			.expect("Headers must build.");

		assert_eq!(headers[AUTHORIZATION], "Bearer secret");
		assert_eq!(headers["x-team"], "search");
		assert_eq!(headers["x-retries"], "2");
	}

	#[test]
	fn invalid_header_name_is_reported() {
		let defaults = json!({ "bad header": "v" });
		let err = auth_headers("k", defaults.as_object().expect("Object literal."))
			.expect_err("Header names cannot contain spaces.");

		assert!(matches!(err, Error::Header { name } if name == "bad header"));
	}
}
