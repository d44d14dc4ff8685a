use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub context: Context,
	#[serde(default)]
	pub memory: Memory,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub vector: VectorStore,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct VectorStore {
	/// One of "qdrant" or "in_process".
	pub backend: String,
	/// Required when `backend = "qdrant"`.
	pub url: Option<String>,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	/// Optional. Reranking is skipped when absent.
	pub rerank: Option<ProviderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub top_k: u32,
	pub threshold: f32,
	/// Minimum score a knowledge hit needs before it leaves the knowledge adapter.
	pub relevance_floor: f32,
	pub hybrid: bool,
	/// 0.0 is pure vector, 1.0 is pure lexical.
	pub bm25_weight: f32,
	pub rerank: bool,
	pub k_reranker: u32,
	/// One of "merge_all" or "threshold_filtered".
	pub mode: String,
	/// One of "raw" or "min_max".
	pub normalization: String,
	pub timeout_ms: Option<u64>,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			top_k: 5,
			threshold: 0.5,
			relevance_floor: 0.0,
			hybrid: false,
			bm25_weight: 0.5,
			rerank: false,
			k_reranker: 3,
			mode: "merge_all".to_string(),
			normalization: "raw".to_string(),
			timeout_ms: None,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Context {
	pub max_chars: usize,
}
impl Default for Context {
	fn default() -> Self {
		Self { max_chars: 4_000 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Memory {
	/// Similarity at or above which a new memory is treated as a duplicate.
	pub dedup_similarity: f32,
}
impl Default for Memory {
	fn default() -> Self {
		Self { dedup_similarity: 0.85 }
	}
}
