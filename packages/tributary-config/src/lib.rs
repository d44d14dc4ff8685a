mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Context, EmbeddingProviderConfig, Memory, Postgres, ProviderConfig, Providers, Search,
	Service, Storage, VectorStore,
};

use std::{fs, path::Path};

pub const VECTOR_BACKENDS: [&str; 2] = ["qdrant", "in_process"];
pub const AGGREGATION_MODES: [&str; 2] = ["merge_all", "threshold_filtered"];
pub const SCORE_NORMALIZATIONS: [&str; 2] = ["raw", "min_max"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::Parse { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if !VECTOR_BACKENDS.contains(&cfg.storage.vector.backend.as_str()) {
		return Err(Error::Validation {
			message: "storage.vector.backend must be one of qdrant or in_process.".to_string(),
		});
	}
	if cfg.storage.vector.backend == "qdrant" && cfg.storage.vector.url.is_none() {
		return Err(Error::Validation {
			message: "storage.vector.url is required when storage.vector.backend is qdrant."
				.to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.vector.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.vector.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if let Some(rerank) = cfg.providers.rerank.as_ref()
		&& rerank.api_key.trim().is_empty()
	{
		return Err(Error::Validation {
			message: "Provider rerank api_key must be non-empty.".to_string(),
		});
	}

	validate_search(&cfg.search)?;

	if cfg.search.rerank && cfg.providers.rerank.is_none() {
		return Err(Error::Validation {
			message: "search.rerank requires a [providers.rerank] section.".to_string(),
		});
	}
	if cfg.context.max_chars == 0 {
		return Err(Error::Validation {
			message: "context.max_chars must be greater than zero.".to_string(),
		});
	}
	if !cfg.memory.dedup_similarity.is_finite() {
		return Err(Error::Validation {
			message: "memory.dedup_similarity must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.memory.dedup_similarity) {
		return Err(Error::Validation {
			message: "memory.dedup_similarity must be in the range 0.0-1.0.".to_string(),
		});
	}

	Ok(())
}

fn validate_search(search: &Search) -> Result<()> {
	if search.top_k == 0 {
		return Err(Error::Validation {
			message: "search.top_k must be greater than zero.".to_string(),
		});
	}
	if search.k_reranker == 0 {
		return Err(Error::Validation {
			message: "search.k_reranker must be greater than zero.".to_string(),
		});
	}
	if !search.threshold.is_finite() {
		return Err(Error::Validation {
			message: "search.threshold must be a finite number.".to_string(),
		});
	}
	if !search.relevance_floor.is_finite() {
		return Err(Error::Validation {
			message: "search.relevance_floor must be a finite number.".to_string(),
		});
	}
	if !search.bm25_weight.is_finite() {
		return Err(Error::Validation {
			message: "search.bm25_weight must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&search.bm25_weight) {
		return Err(Error::Validation {
			message: "search.bm25_weight must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !AGGREGATION_MODES.contains(&search.mode.as_str()) {
		return Err(Error::Validation {
			message: "search.mode must be one of merge_all or threshold_filtered.".to_string(),
		});
	}
	if !SCORE_NORMALIZATIONS.contains(&search.normalization.as_str()) {
		return Err(Error::Validation {
			message: "search.normalization must be one of raw or min_max.".to_string(),
		});
	}
	if search.timeout_ms == Some(0) {
		return Err(Error::Validation {
			message: "search.timeout_ms must be greater than zero when set.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.vector.url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false) {
		cfg.storage.vector.url = None;
	}

	cfg.search.mode = cfg.search.mode.trim().to_ascii_lowercase();
	cfg.search.normalization = cfg.search.normalization.trim().to_ascii_lowercase();
	cfg.storage.vector.backend = cfg.storage.vector.backend.trim().to_ascii_lowercase();
}
