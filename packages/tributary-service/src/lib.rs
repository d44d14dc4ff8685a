pub mod aggregate;
pub mod context;
pub mod knowledge;
pub mod memory;
pub mod notes;
pub mod prompts;
pub mod result;

mod error;
mod lexical;

pub use aggregate::{AggregationMode, ScoreNormalization, SearchRequest, merge_ranked};
pub use context::assemble_context;
pub use error::{Error, Result};
pub use knowledge::CollectionRef;
pub use memory::SaveMemoryOutcome;
pub use result::{AggregatedResult, SearchResult};

use std::{future::Future, pin::Pin, sync::Arc};

use tributary_config::{Config, EmbeddingProviderConfig, ProviderConfig};
use tributary_providers::{embedding, rerank};
use tributary_storage::{
	db::Db,
	models::{KnowledgeBase, Memory, Note, Permission, Prompt},
	queries,
	vector::VectorIndex,
};

use crate::memory::MemoryLocks;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

/// Relational lookups the search path depends on.
///
/// Implementations return only the items the user may read; no permission check happens after
/// this boundary.
pub trait Catalog
where
	Self: Send + Sync,
{
	fn list_readable_collections<'a>(
		&'a self,
		user_id: &'a str,
		permission: Permission,
	) -> BoxFuture<'a, Result<Vec<KnowledgeBase>>>;

	fn list_readable_notes<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<Vec<Note>>>;

	fn list_readable_prompts<'a>(&'a self, user_id: &'a str)
	-> BoxFuture<'a, Result<Vec<Prompt>>>;

	fn has_memories<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<bool>>;

	fn insert_memory<'a>(&'a self, memory: &'a Memory) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}

pub struct SearchService {
	pub cfg: Config,
	pub catalog: Arc<dyn Catalog>,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	memory_locks: MemoryLocks,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(rerank::rerank(cfg, query, docs).await?) })
	}
}

impl Catalog for Db {
	fn list_readable_collections<'a>(
		&'a self,
		user_id: &'a str,
		permission: Permission,
	) -> BoxFuture<'a, Result<Vec<KnowledgeBase>>> {
		Box::pin(async move {
			Ok(queries::list_readable_collections(self, user_id, permission).await?)
		})
	}

	fn list_readable_notes<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<Vec<Note>>> {
		Box::pin(async move {
			Ok(queries::list_readable_notes(self, user_id, Permission::Read).await?)
		})
	}

	fn list_readable_prompts<'a>(
		&'a self,
		user_id: &'a str,
	) -> BoxFuture<'a, Result<Vec<Prompt>>> {
		Box::pin(async move {
			Ok(queries::list_readable_prompts(self, user_id, Permission::Read).await?)
		})
	}

	fn has_memories<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(queries::count_memories(self, user_id).await? > 0) })
	}

	fn insert_memory<'a>(&'a self, memory: &'a Memory) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(queries::insert_memory(self, memory).await?) })
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, rerank: Arc<dyn RerankProvider>) -> Self {
		Self { embedding, rerank }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider }
	}
}

impl SearchService {
	pub fn new(cfg: Config, catalog: Arc<dyn Catalog>, index: Arc<dyn VectorIndex>) -> Self {
		Self::with_providers(cfg, catalog, index, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		catalog: Arc<dyn Catalog>,
		index: Arc<dyn VectorIndex>,
		providers: Providers,
	) -> Self {
		Self { cfg, catalog, index, providers, memory_locks: MemoryLocks::default() }
	}

	pub(crate) async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let texts = vec![text.to_string()];
		let mut vectors =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;

		if vectors.len() != 1 {
			return Err(Error::Provider {
				message: format!("Embedding provider returned {} vectors for 1 input.", vectors.len()),
			});
		}

		Ok(vectors.swap_remove(0))
	}
}
