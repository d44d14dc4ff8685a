use std::time::Duration;

use serde::{Deserialize, Serialize};

use tributary_config::EmbeddingProviderConfig;

use crate::{Endpoint, Error, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
	model: &'a str,
	input: &'a [String],
	dimensions: u32,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
	#[serde(default)]
	index: Option<usize>,
	embedding: Vec<f32>,
}

/// Embeds `texts` and returns one vector per input, in input order.
pub async fn embed(cfg: &EmbeddingProviderConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let endpoint = Endpoint {
		url: format!("{}{}", cfg.api_base, cfg.path),
		api_key: &cfg.api_key,
		default_headers: &cfg.default_headers,
		timeout: Duration::from_millis(cfg.timeout_ms),
	};
	let request = EmbeddingRequest { model: &cfg.model, input: texts, dimensions: cfg.dimensions };
	let response: EmbeddingResponse = endpoint.post(&request).await?;

	into_vectors(response, texts.len(), cfg.dimensions as usize)
}

fn into_vectors(
	response: EmbeddingResponse,
	expected: usize,
	dimensions: usize,
) -> Result<Vec<Vec<f32>>> {
	if response.data.len() != expected {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding provider returned {} vectors for {expected} inputs.",
				response.data.len()
			),
		});
	}

	let mut items: Vec<(usize, Vec<f32>)> = response
		.data
		.into_iter()
		.enumerate()
		.map(|(position, item)| (item.index.unwrap_or(position), item.embedding))
		.collect();

	items.sort_by_key(|(index, _)| *index);

	if let Some((_, vector)) = items.iter().find(|(_, vector)| vector.len() != dimensions) {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding has {} dimensions; expected {dimensions}.",
				vector.len()
			),
		});
	}

	Ok(items.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn response(value: serde_json::Value) -> EmbeddingResponse {
		serde_json::from_value(value).expect("Fixture must deserialize.")
	}

	#[test]
	fn vectors_follow_response_indices() {
		let parsed = into_vectors(
			response(json!({
				"data": [
					{ "index": 1, "embedding": [2.0, 3.0] },
					{ "index": 0, "embedding": [0.5, 1.5] }
				]
			})),
			2,
			2,
		)
		.expect("Vectors must parse.");

		assert_eq!(parsed, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn missing_indices_keep_response_order() {
		let parsed = into_vectors(
			response(json!({ "data": [{ "embedding": [1.0] }, { "embedding": [2.0] }] })),
			2,
			1,
		)
		.expect("Vectors must parse.");

		assert_eq!(parsed, vec![vec![1.0], vec![2.0]]);
	}

	#[test]
	fn count_and_dimension_mismatches_are_rejected() {
		let short = into_vectors(response(json!({ "data": [{ "embedding": [1.0] }] })), 2, 1);
		let narrow = into_vectors(response(json!({ "data": [{ "embedding": [1.0] }] })), 1, 3);

		assert!(matches!(short, Err(Error::InvalidResponse { .. })));
		assert!(matches!(narrow, Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn missing_data_array_fails_to_decode() {
		assert!(serde_json::from_value::<EmbeddingResponse>(json!({ "object": "list" })).is_err());
	}
}
