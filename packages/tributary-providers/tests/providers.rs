use serde_json::Map;

use tributary_config::{EmbeddingProviderConfig, ProviderConfig};
use tributary_providers::{Error, embedding, rerank};

// Port 1 is reserved and refuses connections on any test host.
const UNREACHABLE: &str = "http://127.0.0.1:1";

fn embedding_cfg() -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base: UNREACHABLE.to_string(),
		api_key: "secret".to_string(),
		path: "/v1/embeddings".to_string(),
		model: "test-embedding".to_string(),
		dimensions: 4,
		timeout_ms: 2_000,
		default_headers: Map::new(),
	}
}

fn rerank_cfg() -> ProviderConfig {
	ProviderConfig {
		provider_id: "test".to_string(),
		api_base: UNREACHABLE.to_string(),
		api_key: "secret".to_string(),
		path: "/v1/rerank".to_string(),
		model: "test-rerank".to_string(),
		timeout_ms: 2_000,
		default_headers: Map::new(),
	}
}

#[tokio::test]
async fn empty_inputs_skip_the_request() {
	let vectors = embedding::embed(&embedding_cfg(), &[]).await.expect("No request is made.");
	let scores = rerank::rerank(&rerank_cfg(), "q", &[]).await.expect("No request is made.");

	assert!(vectors.is_empty());
	assert!(scores.is_empty());
}

#[tokio::test]
async fn unreachable_provider_is_an_http_error() {
	let texts = vec!["hello".to_string()];
	let embed_err =
		embedding::embed(&embedding_cfg(), &texts).await.expect_err("Connection must fail.");
	let rerank_err =
		rerank::rerank(&rerank_cfg(), "hello", &texts).await.expect_err("Connection must fail.");

	assert!(matches!(embed_err, Error::Http(_)));
	assert!(matches!(rerank_err, Error::Http(_)));
}
