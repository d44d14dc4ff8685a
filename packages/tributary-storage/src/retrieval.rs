//! Multi-collection retrieval over a [`VectorIndex`].
//!
//! Dense results come back as tuple-like JSON arrays `[collection, score, {id, text, metadata}]`;
//! hybrid results come back as mapping-like JSON objects `{source, score, text, metadata}`.
//! Callers normalize both shapes.

use std::{cmp::Ordering, collections::HashMap};

use serde_json::{Map, Value, json};

use crate::{Error, Result, vector::VectorIndex};

const COLLECTION_NAME_KEY: &str = "collection_name";
const MIN_MAX_EPSILON: f32 = 1e-9;

struct Scored {
	collection: String,
	id: String,
	text: String,
	metadata: Map<String, Value>,
	score: f32,
}

/// Dense search across `names`. Scores are `clamp(1 - distance, 0, 1)`; `r` and `k` apply to the
/// combined list.
pub async fn query_collections(
	index: &dyn VectorIndex,
	names: &[String],
	query_vector: &[f32],
	k: usize,
	r: f32,
) -> Result<Vec<Value>> {
	let vectors = vec![query_vector.to_vec()];
	let mut scored = Vec::new();
	let mut failures = 0;

	for name in names {
		let result = match index.search(name, &vectors, k).await {
			Ok(result) => result,
			Err(err) => {
				tracing::warn!(error = %err, collection = %name, "Dense collection query failed.");

				failures += 1;

				continue;
			},
		};

		for hit in result.hits(0) {
			scored.push(Scored {
				collection: name.clone(),
				id: hit.id,
				text: hit.document,
				metadata: hit.metadata,
				score: (1.0 - hit.distance).clamp(0.0, 1.0),
			});
		}
	}

	ensure_any_succeeded(names, failures)?;

	Ok(rank(scored, k, r)
		.into_iter()
		.map(|item| {
			let metadata = with_collection_name(item.metadata, &item.collection);

			json!([item.collection, item.score, { "id": item.id, "text": item.text, "metadata": metadata }])
		})
		.collect())
}

/// Dense plus lexical search across `names`. Lexical scores are min-max normalized per
/// collection, then blended as `(1 - bm25_weight) * dense + bm25_weight * lexical`. A side that
/// did not return a document contributes zero.
pub async fn query_collections_hybrid(
	index: &dyn VectorIndex,
	names: &[String],
	query: &str,
	query_vector: &[f32],
	k: usize,
	r: f32,
	bm25_weight: f32,
) -> Result<Vec<Value>> {
	if !(0.0..=1.0).contains(&bm25_weight) {
		return Err(Error::InvalidArgument(format!(
			"bm25_weight must be in the range 0.0-1.0, got {bm25_weight}."
		)));
	}

	let vectors = vec![query_vector.to_vec()];
	let mut scored = Vec::new();
	let mut failures = 0;

	for name in names {
		let dense = match index.search(name, &vectors, k).await {
			Ok(result) => result.hits(0),
			Err(err) => {
				tracing::warn!(error = %err, collection = %name, "Dense collection query failed.");

				failures += 1;

				continue;
			},
		};
		let lexical = match index.lexical_search(name, query, k).await {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(
					error = %err,
					collection = %name,
					"Lexical collection query failed. Using dense scores only."
				);

				Vec::new()
			},
		};
		let lexical_scores =
			min_max_normalize(&lexical.iter().map(|hit| hit.score).collect::<Vec<_>>());
		// Insertion order keeps the blend deterministic for equal scores.
		let mut blended: Vec<(Scored, f32, f32)> = Vec::new();
		let mut positions: HashMap<String, usize> = HashMap::new();

		for hit in dense {
			let similarity = (1.0 - hit.distance).clamp(0.0, 1.0);

			positions.insert(hit.id.clone(), blended.len());
			blended.push((
				Scored {
					collection: name.clone(),
					id: hit.id,
					text: hit.document,
					metadata: hit.metadata,
					score: 0.0,
				},
				similarity,
				0.0,
			));
		}
		for (hit, lexical_score) in lexical.into_iter().zip(lexical_scores) {
			match positions.get(&hit.id) {
				Some(position) => blended[*position].2 = lexical_score,
				None => {
					positions.insert(hit.id.clone(), blended.len());
					blended.push((
						Scored {
							collection: name.clone(),
							id: hit.id,
							text: hit.document,
							metadata: hit.metadata,
							score: 0.0,
						},
						0.0,
						lexical_score,
					));
				},
			}
		}

		scored.extend(blended.into_iter().map(|(mut item, dense_score, lexical_score)| {
			item.score = (1.0 - bm25_weight) * dense_score + bm25_weight * lexical_score;

			item
		}));
	}

	ensure_any_succeeded(names, failures)?;

	Ok(rank(scored, k, r)
		.into_iter()
		.map(|item| {
			let metadata = with_collection_name(item.metadata, &item.collection);

			json!({
				"source": item.collection,
				"score": item.score,
				"text": item.text,
				"metadata": metadata,
			})
		})
		.collect())
}

/// Rescales `values` into `[0, 1]`. A flat input (range below 1e-9) maps every value to 1.0.
pub fn min_max_normalize(values: &[f32]) -> Vec<f32> {
	let Some(min) = values.iter().copied().reduce(f32::min) else {
		return Vec::new();
	};
	let max = values.iter().copied().fold(min, f32::max);
	let range = max - min;

	if range < MIN_MAX_EPSILON {
		return vec![1.0; values.len()];
	}

	values.iter().map(|value| (value - min) / range).collect()
}

fn rank(mut scored: Vec<Scored>, k: usize, r: f32) -> Vec<Scored> {
	scored.retain(|item| item.score >= r);
	scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
	scored.truncate(k);

	scored
}

fn with_collection_name(mut metadata: Map<String, Value>, collection: &str) -> Map<String, Value> {
	metadata
		.entry(COLLECTION_NAME_KEY)
		.or_insert_with(|| Value::String(collection.to_string()));

	metadata
}

fn ensure_any_succeeded(names: &[String], failures: usize) -> Result<()> {
	if !names.is_empty() && failures == names.len() {
		return Err(Error::AllCollectionsFailed { failures });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{in_process::InProcessIndex, vector::VectorItem};

	fn item(id: &str, text: &str, vector: Vec<f32>) -> VectorItem {
		VectorItem { id: id.to_string(), text: text.to_string(), vector, metadata: Map::new() }
	}

	async fn seeded() -> InProcessIndex {
		let index = InProcessIndex::new(2);

		index
			.upsert(
				"kb-a",
				&[
					item("a1", "ownership and borrowing", vec![1.0, 0.0]),
					item("a2", "async runtimes", vec![0.0, 1.0]),
				],
			)
			.await
			.expect("upsert failed");
		index
			.upsert("kb-b", &[item("b1", "borrowing rules", vec![0.9, 0.1])])
			.await
			.expect("upsert failed");

		index
	}

	fn names(values: &[&str]) -> Vec<String> {
		values.iter().map(|value| value.to_string()).collect()
	}

	#[test]
	fn min_max_handles_flat_and_empty_input() {
		assert!(min_max_normalize(&[]).is_empty());
		assert_eq!(min_max_normalize(&[3.0, 3.0]), vec![1.0, 1.0]);
		assert_eq!(min_max_normalize(&[1.0, 3.0, 2.0]), vec![0.0, 1.0, 0.5]);
	}

	#[tokio::test]
	async fn dense_query_ranks_across_collections_and_applies_floor() {
		let index = seeded().await;
		let records = query_collections(&index, &names(&["kb-a", "kb-b"]), &[1.0, 0.0], 5, 0.5)
			.await
			.expect("query failed");

		assert_eq!(records.len(), 2);
		assert_eq!(records[0][0], "kb-a");
		assert_eq!(records[0][2]["id"], "a1");
		assert_eq!(records[1][0], "kb-b");
		assert_eq!(records[1][2]["metadata"]["collection_name"], "kb-b");
	}

	#[tokio::test]
	async fn dense_query_skips_failing_collections() {
		let index = seeded().await;
		let records = query_collections(&index, &names(&["missing", "kb-b"]), &[1.0, 0.0], 5, 0.0)
			.await
			.expect("one healthy collection must be enough");

		assert_eq!(records.len(), 1);
	}

	#[tokio::test]
	async fn dense_query_fails_when_every_collection_fails() {
		let index = seeded().await;

		assert!(query_collections(&index, &names(&["missing"]), &[1.0, 0.0], 5, 0.0).await.is_err());
	}

	#[tokio::test]
	async fn hybrid_query_blends_lexical_scores() {
		let index = seeded().await;
		let records = query_collections_hybrid(
			&index,
			&names(&["kb-a"]),
			"async",
			&[1.0, 0.0],
			5,
			0.0,
			1.0,
		)
		.await
		.expect("query failed");

		assert_eq!(records[0]["source"], "kb-a");
		assert_eq!(records[0]["metadata"]["collection_name"], "kb-a");
		assert_eq!(records[0]["text"], "async runtimes");
		assert_eq!(records[0]["score"], 1.0);
	}

	#[tokio::test]
	async fn hybrid_query_rejects_out_of_range_weight() {
		let index = seeded().await;
		let err = query_collections_hybrid(&index, &names(&["kb-a"]), "x", &[1.0, 0.0], 5, 0.0, 1.5)
			.await
			.expect_err("weight above one must fail");

		assert!(matches!(err, Error::InvalidArgument(_)));
	}
}
