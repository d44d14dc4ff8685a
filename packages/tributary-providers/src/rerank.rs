use std::time::Duration;

use serde::{Deserialize, Serialize};

use tributary_config::ProviderConfig;

use crate::{Endpoint, Result};

#[derive(Serialize)]
struct RerankRequest<'a> {
	model: &'a str,
	query: &'a str,
	documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
	#[serde(alias = "data")]
	results: Vec<RerankItem>,
}

#[derive(Deserialize)]
struct RerankItem {
	index: usize,
	#[serde(alias = "score")]
	relevance_score: f32,
}

/// Scores every document against `query`. The returned scores line up with `docs`; a document
/// the provider left out scores 0.0.
pub async fn rerank(cfg: &ProviderConfig, query: &str, docs: &[String]) -> Result<Vec<f32>> {
	if docs.is_empty() {
		return Ok(Vec::new());
	}

	let endpoint = Endpoint {
		url: format!("{}{}", cfg.api_base, cfg.path),
		api_key: &cfg.api_key,
		default_headers: &cfg.default_headers,
		timeout: Duration::from_millis(cfg.timeout_ms),
	};
	let request = RerankRequest { model: &cfg.model, query, documents: docs };
	let response: RerankResponse = endpoint.post(&request).await?;

	Ok(align_scores(response, docs.len()))
}

fn align_scores(response: RerankResponse, doc_count: usize) -> Vec<f32> {
	let mut scores = vec![0.0; doc_count];

	for item in response.results {
		if let Some(slot) = scores.get_mut(item.index) {
			*slot = item.relevance_score;
		}
	}

	scores
}
