//! Backend-neutral vector index contract.
//!
//! Every backend answers nearest-neighbour queries with parallel arrays, one outer element per
//! query vector, and reports distances (lower is closer). Callers convert distances to
//! similarities themselves.

use serde_json::{Map, Value};

use crate::{BoxFuture, Result, in_process::InProcessIndex, qdrant::QdrantIndex};

/// One document written into a collection.
#[derive(Debug, Clone)]
pub struct VectorItem {
	pub id: String,
	pub text: String,
	pub vector: Vec<f32>,
	pub metadata: Map<String, Value>,
}

/// Nearest-neighbour answer. Outer index = query vector, inner index = rank.
#[derive(Debug, Clone, Default)]
pub struct VectorSearchResult {
	pub ids: Vec<Vec<String>>,
	pub documents: Vec<Vec<String>>,
	pub metadatas: Vec<Vec<Map<String, Value>>>,
	pub distances: Vec<Vec<f32>>,
}
impl VectorSearchResult {
	pub fn push_query(&mut self, hits: Vec<VectorHit>) {
		let mut ids = Vec::with_capacity(hits.len());
		let mut documents = Vec::with_capacity(hits.len());
		let mut metadatas = Vec::with_capacity(hits.len());
		let mut distances = Vec::with_capacity(hits.len());

		for hit in hits {
			ids.push(hit.id);
			documents.push(hit.document);
			metadatas.push(hit.metadata);
			distances.push(hit.distance);
		}

		self.ids.push(ids);
		self.documents.push(documents);
		self.metadatas.push(metadatas);
		self.distances.push(distances);
	}

	/// Rows for one query vector. Ragged arrays are truncated to the shortest column.
	pub fn hits(&self, query_index: usize) -> Vec<VectorHit> {
		let (Some(ids), Some(documents), Some(metadatas), Some(distances)) = (
			self.ids.get(query_index),
			self.documents.get(query_index),
			self.metadatas.get(query_index),
			self.distances.get(query_index),
		) else {
			return Vec::new();
		};

		ids.iter()
			.zip(documents)
			.zip(metadatas)
			.zip(distances)
			.map(|(((id, document), metadata), distance)| VectorHit {
				id: id.clone(),
				document: document.clone(),
				metadata: metadata.clone(),
				distance: *distance,
			})
			.collect()
	}
}

#[derive(Debug, Clone)]
pub struct VectorHit {
	pub id: String,
	pub document: String,
	pub metadata: Map<String, Value>,
	pub distance: f32,
}

/// Lexical (term overlap / BM25) hit. `score` is backend-specific and unbounded; higher is
/// better.
#[derive(Debug, Clone)]
pub struct LexicalHit {
	pub id: String,
	pub document: String,
	pub metadata: Map<String, Value>,
	pub score: f32,
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		collection: &'a str,
		vectors: &'a [Vec<f32>],
		limit: usize,
	) -> BoxFuture<'a, Result<VectorSearchResult>>;

	fn lexical_search<'a>(
		&'a self,
		collection: &'a str,
		query: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<LexicalHit>>>;

	fn upsert<'a>(&'a self, collection: &'a str, items: &'a [VectorItem])
	-> BoxFuture<'a, Result<()>>;

	fn has_collection<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<bool>>;
}

/// The backend chosen at startup from `storage.vector.backend`.
pub enum VectorBackend {
	Qdrant(QdrantIndex),
	InProcess(InProcessIndex),
}
impl VectorBackend {
	pub fn from_config(cfg: &tributary_config::VectorStore) -> Result<Self> {
		match cfg.backend.as_str() {
			"qdrant" => Ok(Self::Qdrant(QdrantIndex::new(cfg)?)),
			"in_process" => Ok(Self::InProcess(InProcessIndex::new(cfg.vector_dim))),
			other =>
				Err(crate::Error::InvalidArgument(format!("Unsupported vector backend: {other}."))),
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::Qdrant(_) => "qdrant",
			Self::InProcess(_) => "in_process",
		}
	}

	fn as_index(&self) -> &dyn VectorIndex {
		match self {
			Self::Qdrant(index) => index,
			Self::InProcess(index) => index,
		}
	}
}
impl VectorIndex for VectorBackend {
	fn search<'a>(
		&'a self,
		collection: &'a str,
		vectors: &'a [Vec<f32>],
		limit: usize,
	) -> BoxFuture<'a, Result<VectorSearchResult>> {
		self.as_index().search(collection, vectors, limit)
	}

	fn lexical_search<'a>(
		&'a self,
		collection: &'a str,
		query: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<LexicalHit>>> {
		self.as_index().lexical_search(collection, query, limit)
	}

	fn upsert<'a>(
		&'a self,
		collection: &'a str,
		items: &'a [VectorItem],
	) -> BoxFuture<'a, Result<()>> {
		self.as_index().upsert(collection, items)
	}

	fn has_collection<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<bool>> {
		self.as_index().has_collection(collection)
	}
}
