//! Dense and hybrid search over knowledge collections.
//!
//! The retrieval layer hands back loosely shaped records: tuple-like arrays
//! `[collection, score, {text, metadata}]` from dense search and mapping-like objects
//! `{source, score, text|content, metadata}` from hybrid search. [`normalize_records`] folds both
//! into [`SearchResult`]s.

use std::collections::HashMap;

use serde_json::{Map, Value};

use tributary_storage::{models::KnowledgeBase, retrieval, vector::VectorIndex};

use crate::SearchResult;

pub const UNKNOWN_SOURCE_NAME: &str = "Unknown";

const COLLECTION_NAME_KEY: &str = "collection_name";

/// A searchable collection and the label shown for its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
	pub id: String,
	pub name: String,
}
impl From<KnowledgeBase> for CollectionRef {
	fn from(base: KnowledgeBase) -> Self {
		Self { id: base.knowledge_base_id, name: base.name }
	}
}

pub struct KnowledgeSearchArgs<'a> {
	pub collections: &'a [CollectionRef],
	pub query: &'a str,
	pub query_vector: &'a [f32],
	pub k: usize,
	pub relevance_floor: f32,
	/// `Some(weight)` selects hybrid search with that lexical weight.
	pub bm25_weight: Option<f32>,
}

/// Single files are indexed into their own `file-{id}` collection.
pub fn collections_for_files(file_ids: &[String]) -> Vec<CollectionRef> {
	file_ids
		.iter()
		.map(|file_id| CollectionRef { id: format!("file-{file_id}"), name: file_id.clone() })
		.collect()
}

pub async fn search_knowledge(
	index: &dyn VectorIndex,
	args: KnowledgeSearchArgs<'_>,
) -> Vec<SearchResult> {
	let ids: Vec<String> =
		args.collections.iter().map(|collection| collection.id.clone()).collect();
	let names: HashMap<String, String> = args
		.collections
		.iter()
		.map(|collection| (collection.id.clone(), collection.name.clone()))
		.collect();
	let records = match args.bm25_weight {
		Some(weight) =>
			search_collections_hybrid(
				index,
				&ids,
				args.query,
				args.query_vector,
				args.k,
				args.relevance_floor,
				weight,
			)
			.await,
		None =>
			search_collections(index, &ids, args.query_vector, args.k, args.relevance_floor).await,
	};

	normalize_records(&records, &names)
}

/// Dense search across `collection_ids`. Failures are logged and yield no records.
pub async fn search_collections(
	index: &dyn VectorIndex,
	collection_ids: &[String],
	query_vector: &[f32],
	k: usize,
	r: f32,
) -> Vec<Value> {
	if collection_ids.is_empty() {
		tracing::warn!("No collections provided for search.");

		return Vec::new();
	}

	match retrieval::query_collections(index, collection_ids, query_vector, k, r).await {
		Ok(records) => {
			tracing::debug!(
				collections = collection_ids.len(),
				count = records.len(),
				"Dense knowledge search finished."
			);

			records
		},
		Err(err) => {
			tracing::error!(error = %err, "Dense knowledge search failed.");

			Vec::new()
		},
	}
}

/// Hybrid search across `collection_ids`. Failures are logged and yield no records.
pub async fn search_collections_hybrid(
	index: &dyn VectorIndex,
	collection_ids: &[String],
	query: &str,
	query_vector: &[f32],
	k: usize,
	r: f32,
	bm25_weight: f32,
) -> Vec<Value> {
	if collection_ids.is_empty() {
		tracing::warn!("No collections provided for hybrid search.");

		return Vec::new();
	}

	match retrieval::query_collections_hybrid(
		index,
		collection_ids,
		query,
		query_vector,
		k,
		r,
		bm25_weight,
	)
	.await
	{
		Ok(records) => {
			tracing::debug!(
				collections = collection_ids.len(),
				count = records.len(),
				bm25_weight,
				"Hybrid knowledge search finished."
			);

			records
		},
		Err(err) => {
			tracing::error!(error = %err, "Hybrid knowledge search failed.");

			Vec::new()
		},
	}
}

/// Maps raw records to results. Records that are neither arrays of at least three elements nor
/// objects are dropped.
pub fn normalize_records(records: &[Value], names: &HashMap<String, String>) -> Vec<SearchResult> {
	records.iter().filter_map(|record| normalize_record(record, names)).collect()
}

fn normalize_record(record: &Value, names: &HashMap<String, String>) -> Option<SearchResult> {
	let (source_id, score, content, metadata) = match record {
		Value::Array(items) if items.len() >= 3 => {
			let document = items[2].as_object();

			(
				id_text(&items[0]),
				score_of(&items[1]),
				first_text(document, ["text", "content"]),
				metadata_of(document),
			)
		},
		Value::Object(map) => (
			map.get("source").map(id_text).unwrap_or_default(),
			map.get("score").map(score_of).unwrap_or(0.0),
			first_text(Some(map), ["content", "text"]),
			metadata_of(Some(map)),
		),
		_ => return None,
	};
	let source = metadata
		.get(COLLECTION_NAME_KEY)
		.and_then(Value::as_str)
		.map(str::to_string)
		.unwrap_or(source_id);
	let source_name =
		names.get(&source).cloned().unwrap_or_else(|| UNKNOWN_SOURCE_NAME.to_string());

	Some(SearchResult { content, metadata, score, source, source_name })
}

fn id_text(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

fn score_of(value: &Value) -> f32 {
	value.as_f64().map(|score| score as f32).unwrap_or(0.0)
}

fn first_text<const N: usize>(document: Option<&Map<String, Value>>, keys: [&str; N]) -> String {
	let Some(document) = document else {
		return String::new();
	};

	keys.iter()
		.filter_map(|key| document.get(*key).and_then(Value::as_str))
		.find(|text| !text.is_empty())
		.unwrap_or_default()
		.to_string()
}

fn metadata_of(document: Option<&Map<String, Value>>) -> Map<String, Value> {
	match document.and_then(|document| document.get("metadata")) {
		Some(Value::Object(metadata)) => metadata.clone(),
		_ => Map::new(),
	}
}
