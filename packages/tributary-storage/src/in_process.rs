//! Brute-force in-memory backend for development setups and tests.

use std::{cmp::Ordering, collections::HashMap, sync::RwLock};

use crate::{
	BoxFuture, Error, Result,
	vector::{LexicalHit, VectorHit, VectorIndex, VectorItem, VectorSearchResult},
};

pub struct InProcessIndex {
	vector_dim: u32,
	collections: RwLock<HashMap<String, Vec<VectorItem>>>,
}
impl InProcessIndex {
	pub fn new(vector_dim: u32) -> Self {
		Self { vector_dim, collections: RwLock::new(HashMap::new()) }
	}

	fn search_sync(
		&self,
		collection: &str,
		vectors: &[Vec<f32>],
		limit: usize,
	) -> Result<VectorSearchResult> {
		let collections = self.collections.read().unwrap_or_else(|err| err.into_inner());
		let items = collections
			.get(collection)
			.ok_or_else(|| Error::MissingCollection(collection.to_string()))?;
		let mut out = VectorSearchResult::default();

		for vector in vectors {
			let mut hits: Vec<VectorHit> = items
				.iter()
				.map(|item| VectorHit {
					id: item.id.clone(),
					document: item.text.clone(),
					metadata: item.metadata.clone(),
					distance: cosine_distance(vector, &item.vector),
				})
				.collect();

			hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
			hits.truncate(limit);
			out.push_query(hits);
		}

		Ok(out)
	}

	fn lexical_search_sync(
		&self,
		collection: &str,
		query: &str,
		limit: usize,
	) -> Result<Vec<LexicalHit>> {
		let collections = self.collections.read().unwrap_or_else(|err| err.into_inner());
		let items = collections
			.get(collection)
			.ok_or_else(|| Error::MissingCollection(collection.to_string()))?;
		let terms: Vec<String> = query.split_whitespace().map(|term| term.to_lowercase()).collect();
		let mut hits: Vec<LexicalHit> = items
			.iter()
			.filter_map(|item| {
				let score = term_frequency_score(&terms, &item.text);

				(score > 0.0).then(|| LexicalHit {
					id: item.id.clone(),
					document: item.text.clone(),
					metadata: item.metadata.clone(),
					score,
				})
			})
			.collect();

		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
		hits.truncate(limit);

		Ok(hits)
	}

	fn upsert_sync(&self, collection: &str, items: &[VectorItem]) -> Result<()> {
		for item in items {
			if item.vector.len() != self.vector_dim as usize {
				return Err(Error::InvalidArgument(format!(
					"Vector for {} has dimension {}, expected {}.",
					item.id,
					item.vector.len(),
					self.vector_dim
				)));
			}
		}

		let mut collections = self.collections.write().unwrap_or_else(|err| err.into_inner());
		let stored = collections.entry(collection.to_string()).or_default();

		for item in items {
			match stored.iter_mut().find(|existing| existing.id == item.id) {
				Some(existing) => *existing = item.clone(),
				None => stored.push(item.clone()),
			}
		}

		Ok(())
	}
}
impl VectorIndex for InProcessIndex {
	fn search<'a>(
		&'a self,
		collection: &'a str,
		vectors: &'a [Vec<f32>],
		limit: usize,
	) -> BoxFuture<'a, Result<VectorSearchResult>> {
		Box::pin(async move { self.search_sync(collection, vectors, limit) })
	}

	fn lexical_search<'a>(
		&'a self,
		collection: &'a str,
		query: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<LexicalHit>>> {
		Box::pin(async move { self.lexical_search_sync(collection, query, limit) })
	}

	fn upsert<'a>(
		&'a self,
		collection: &'a str,
		items: &'a [VectorItem],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.upsert_sync(collection, items) })
	}

	fn has_collection<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let collections = self.collections.read().unwrap_or_else(|err| err.into_inner());

			Ok(collections.contains_key(collection))
		})
	}
}

/// `1 - cosine_similarity`, so 0.0 is identical direction and 2.0 is opposite.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let mut dot = 0.0f32;
	let mut norm_a = 0.0f32;
	let mut norm_b = 0.0f32;

	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 1.0;
	}

	1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn term_frequency_score(terms: &[String], text: &str) -> f32 {
	let text = text.to_lowercase();
	let tokens: Vec<&str> = text.split(|c: char| !c.is_alphanumeric()).collect();

	terms
		.iter()
		.map(|term| tokens.iter().filter(|token| **token == term.as_str()).count() as f32)
		.sum()
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;

	fn item(id: &str, text: &str, vector: Vec<f32>) -> VectorItem {
		VectorItem { id: id.to_string(), text: text.to_string(), vector, metadata: Map::new() }
	}

	#[test]
	fn cosine_distance_spans_zero_to_two() {
		assert!((cosine_distance(&[1.0, 0.0], &[1.0, 0.0])).abs() < 1e-6);
		assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
		assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
		assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
	}

	#[tokio::test]
	async fn search_orders_by_distance_and_limits() {
		let index = InProcessIndex::new(2);

		index
			.upsert(
				"kb",
				&[
					item("far", "far away", vec![0.0, 1.0]),
					item("near", "close by", vec![1.0, 0.1]),
					item("exact", "same", vec![1.0, 0.0]),
				],
			)
			.await
			.expect("upsert failed");

		let result = index.search("kb", &[vec![1.0, 0.0]], 2).await.expect("search failed");
		let hits = result.hits(0);

		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].id, "exact");
		assert_eq!(hits[1].id, "near");
	}

	#[tokio::test]
	async fn upsert_replaces_existing_ids() {
		let index = InProcessIndex::new(2);

		index.upsert("kb", &[item("a", "old", vec![1.0, 0.0])]).await.expect("upsert failed");
		index.upsert("kb", &[item("a", "new", vec![1.0, 0.0])]).await.expect("upsert failed");

		let result = index.search("kb", &[vec![1.0, 0.0]], 10).await.expect("search failed");

		assert_eq!(result.documents[0], vec!["new".to_string()]);
	}

	#[tokio::test]
	async fn rejects_wrong_dimension() {
		let index = InProcessIndex::new(3);
		let err = index
			.upsert("kb", &[item("a", "text", vec![1.0, 0.0])])
			.await
			.expect_err("dimension mismatch must fail");

		assert!(matches!(err, Error::InvalidArgument(_)));
	}

	#[tokio::test]
	async fn missing_collection_is_reported() {
		let index = InProcessIndex::new(2);

		assert!(!index.has_collection("missing").await.expect("lookup failed"));
		assert!(matches!(
			index.search("missing", &[vec![1.0, 0.0]], 3).await,
			Err(Error::MissingCollection(_))
		));
	}

	#[tokio::test]
	async fn lexical_search_counts_term_hits() {
		let index = InProcessIndex::new(2);

		index
			.upsert(
				"kb",
				&[
					item("one", "rust borrow checker", vec![1.0, 0.0]),
					item("two", "rust rust async", vec![1.0, 0.0]),
					item("three", "python typing", vec![1.0, 0.0]),
				],
			)
			.await
			.expect("upsert failed");

		let hits = index.lexical_search("kb", "Rust", 10).await.expect("search failed");

		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].id, "two");
		assert_eq!(hits[0].score, 2.0);
	}
}
