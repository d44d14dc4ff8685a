//! Per-user semantic memory: vector search on the read path, deduplicated saves on the write
//! path.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use serde_json::{Map, Value};
use time::OffsetDateTime;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use tributary_storage::{
	models::Memory,
	vector::{VectorIndex, VectorItem},
};

use crate::{Catalog, Error, Result, SearchResult, SearchService};

pub const MEMORY_SOURCE_NAME: &str = "Memories";

#[derive(Debug, Clone, PartialEq)]
pub enum SaveMemoryOutcome {
	Saved { memory_id: Uuid },
	/// An existing memory was at least `memory.dedup_similarity` similar; nothing was written.
	Duplicate { similarity: f32 },
}

/// Per-user write locks. An entry lives only while some save for that user holds or awaits it.
#[derive(Debug, Default)]
pub(crate) struct MemoryLocks {
	locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}
impl MemoryLocks {
	pub(crate) async fn acquire(&self, user_id: &str) -> MemoryLease<'_> {
		let lock = {
			let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());

			locks.entry(user_id.to_string()).or_default().clone()
		};
		let guard = lock.lock_owned().await;

		MemoryLease { owner: self, user_id: user_id.to_string(), guard: Some(guard) }
	}

	#[cfg(test)]
	fn len(&self) -> usize {
		self.locks.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	fn release(&self, user_id: &str) {
		let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());

		// The map holds one reference; any other is a save holding or awaiting the lock.
		if locks.get(user_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
			locks.remove(user_id);
		}
	}
}

/// Exclusive right to write one user's memories. Dropping it unlocks and prunes the entry.
pub(crate) struct MemoryLease<'a> {
	owner: &'a MemoryLocks,
	user_id: String,
	guard: Option<OwnedMutexGuard<()>>,
}
impl Drop for MemoryLease<'_> {
	fn drop(&mut self) {
		drop(self.guard.take());

		self.owner.release(&self.user_id);
	}
}

pub fn memory_collection(user_id: &str) -> String {
	format!("user-memory-{user_id}")
}

/// Converts a cosine distance into a similarity in `[0, 1]`.
///
/// Only valid for backends that report `1 - cosine_similarity`. A backend with another metric
/// needs its own conversion.
pub fn distance_to_similarity(distance: f32) -> f32 {
	(1.0 - distance).clamp(0.0, 1.0)
}

pub async fn search_memories(
	catalog: &dyn Catalog,
	index: &dyn VectorIndex,
	user_id: &str,
	query_vector: &[f32],
	k: usize,
) -> Vec<SearchResult> {
	match try_search_memories(catalog, index, user_id, query_vector, k).await {
		Ok(results) => {
			let max_score = results.iter().map(|result| result.score).reduce(f32::max);

			tracing::debug!(user_id, count = results.len(), ?max_score, "Memory search finished.");

			results
		},
		Err(err) => {
			tracing::error!(error = %err, user_id, "Memory search failed.");

			Vec::new()
		},
	}
}

async fn try_search_memories(
	catalog: &dyn Catalog,
	index: &dyn VectorIndex,
	user_id: &str,
	query_vector: &[f32],
	k: usize,
) -> Result<Vec<SearchResult>> {
	if !catalog.has_memories(user_id).await? {
		return Ok(Vec::new());
	}

	let collection = memory_collection(user_id);
	let vectors = vec![query_vector.to_vec()];
	let result = index.search(&collection, &vectors, k).await?;

	Ok(result
		.hits(0)
		.into_iter()
		.map(|hit| SearchResult {
			content: hit.document,
			metadata: hit.metadata,
			score: distance_to_similarity(hit.distance),
			source: collection.clone(),
			source_name: MEMORY_SOURCE_NAME.to_string(),
		})
		.collect())
}

impl SearchService {
	/// Stores `content` as a memory unless a near-identical one already exists.
	///
	/// Saves for the same user run one at a time so two concurrent saves cannot both pass the
	/// duplicate check.
	pub async fn save_memory(&self, user_id: &str, content: &str) -> Result<SaveMemoryOutcome> {
		let content = content.trim();

		if user_id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "user_id must be non-empty.".to_string() });
		}
		if content.is_empty() {
			return Err(Error::InvalidRequest {
				message: "Memory content must be non-empty.".to_string(),
			});
		}

		let _lease = self.memory_locks.acquire(user_id).await;
		let vector = self.embed_one(content).await?;

		match self.nearest_memory_similarity(user_id, &vector).await {
			Ok(Some(similarity)) if similarity >= self.cfg.memory.dedup_similarity => {
				tracing::info!(user_id, similarity, "Skipped duplicate memory.");

				return Ok(SaveMemoryOutcome::Duplicate { similarity });
			},
			Ok(_) => {},
			Err(err) => {
				tracing::warn!(
					error = %err,
					user_id,
					"Memory similarity check failed. Saving without deduplication."
				);
			},
		}

		let memory = Memory {
			memory_id: Uuid::new_v4(),
			user_id: user_id.to_string(),
			content: content.to_string(),
			created_at: OffsetDateTime::now_utc(),
		};

		self.catalog.insert_memory(&memory).await?;

		let mut metadata = Map::new();

		metadata.insert("memory_id".to_string(), Value::String(memory.memory_id.to_string()));
		metadata.insert("created_at".to_string(), Value::from(memory.created_at.unix_timestamp()));

		let item = VectorItem {
			id: memory.memory_id.to_string(),
			text: memory.content.clone(),
			vector,
			metadata,
		};

		self.index.upsert(&memory_collection(user_id), std::slice::from_ref(&item)).await?;

		tracing::info!(user_id, memory_id = %memory.memory_id, "Saved memory.");

		Ok(SaveMemoryOutcome::Saved { memory_id: memory.memory_id })
	}

	async fn nearest_memory_similarity(
		&self,
		user_id: &str,
		vector: &[f32],
	) -> Result<Option<f32>> {
		if !self.catalog.has_memories(user_id).await? {
			return Ok(None);
		}

		let vectors = vec![vector.to_vec()];
		let result = self.index.search(&memory_collection(user_id), &vectors, 1).await?;

		Ok(result.hits(0).first().map(|hit| distance_to_similarity(hit.distance)))
	}
}
