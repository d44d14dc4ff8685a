pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";

use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		CreateCollectionBuilder, Distance, Document, Modifier, PointStruct, Query,
		QueryPointsBuilder, ScoredPoint, SparseVectorParamsBuilder, SparseVectorsConfigBuilder,
		UpsertPointsBuilder, Value, Vector, VectorParamsBuilder, VectorsConfigBuilder,
		value::Kind,
	},
};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::{
	BoxFuture, Error, Result,
	vector::{LexicalHit, VectorHit, VectorIndex, VectorItem, VectorSearchResult},
};

/// Payload key holding the caller's document id. Qdrant point ids must be UUIDs or integers, so
/// the point id is a UUIDv5 derived from this value.
const ID_KEY: &str = "id";
const TEXT_KEY: &str = "text";
const METADATA_KEY: &str = "metadata";

pub struct QdrantIndex {
	pub client: qdrant_client::Qdrant,
	pub vector_dim: u32,
}
impl QdrantIndex {
	pub fn new(cfg: &tributary_config::VectorStore) -> Result<Self> {
		let url = cfg.url.as_deref().ok_or_else(|| {
			Error::InvalidArgument("Qdrant backend requires storage.vector.url.".to_string())
		})?;
		let client = qdrant_client::Qdrant::from_url(url).build()?;

		Ok(Self { client, vector_dim: cfg.vector_dim })
	}

	async fn ensure_collection(&self, collection: &str) -> Result<()> {
		if self.client.collection_exists(collection).await? {
			return Ok(());
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine),
		);

		let mut sparse_vectors_config = SparseVectorsConfigBuilder::default();

		sparse_vectors_config.add_named_vector_params(
			BM25_VECTOR_NAME,
			SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
		);

		self.client
			.create_collection(
				CreateCollectionBuilder::new(collection)
					.vectors_config(vectors_config)
					.sparse_vectors_config(sparse_vectors_config),
			)
			.await?;

		tracing::info!(collection, "Created Qdrant collection.");

		Ok(())
	}

	async fn search_inner(
		&self,
		collection: &str,
		vectors: &[Vec<f32>],
		limit: usize,
	) -> Result<VectorSearchResult> {
		let mut out = VectorSearchResult::default();

		for vector in vectors {
			let search = QueryPointsBuilder::new(collection)
				.query(Query::new_nearest(vector.clone()))
				.using(DENSE_VECTOR_NAME)
				.with_payload(true)
				.limit(limit as u64);
			let response = self.client.query(search).await?;
			// Cosine collections report similarity; the contract is a distance.
			let hits = response
				.result
				.iter()
				.map(|point| {
					let (id, document, metadata) = decode_point(point);

					VectorHit { id, document, metadata, distance: 1.0 - point.score }
				})
				.collect();

			out.push_query(hits);
		}

		Ok(out)
	}

	async fn lexical_search_inner(
		&self,
		collection: &str,
		query: &str,
		limit: usize,
	) -> Result<Vec<LexicalHit>> {
		let search = QueryPointsBuilder::new(collection)
			.query(Query::new_nearest(Document::new(query.to_string(), BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.with_payload(true)
			.limit(limit as u64);
		let response = self.client.query(search).await?;

		Ok(response
			.result
			.iter()
			.map(|point| {
				let (id, document, metadata) = decode_point(point);

				LexicalHit { id, document, metadata, score: point.score }
			})
			.collect())
	}

	async fn upsert_inner(&self, collection: &str, items: &[VectorItem]) -> Result<()> {
		if items.is_empty() {
			return Ok(());
		}

		self.ensure_collection(collection).await?;

		let mut points = Vec::with_capacity(items.len());

		for item in items {
			if item.vector.len() != self.vector_dim as usize {
				return Err(Error::InvalidArgument(format!(
					"Vector for {} has dimension {}, expected {}.",
					item.id,
					item.vector.len(),
					self.vector_dim
				)));
			}

			let mut payload_map = HashMap::new();

			payload_map.insert(ID_KEY.to_string(), Value::from(item.id.clone()));
			payload_map.insert(TEXT_KEY.to_string(), Value::from(item.text.clone()));
			payload_map.insert(
				METADATA_KEY.to_string(),
				Value::from(JsonValue::Object(item.metadata.clone())),
			);

			let mut vector_map = HashMap::new();

			vector_map.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(item.vector.clone()));
			vector_map.insert(
				BM25_VECTOR_NAME.to_string(),
				Vector::from(Document::new(item.text.clone(), BM25_MODEL)),
			);

			points.push(PointStruct::new(
				point_id(&item.id).to_string(),
				vector_map,
				Payload::from(payload_map),
			));
		}

		self.client.upsert_points(UpsertPointsBuilder::new(collection, points).wait(true)).await?;

		Ok(())
	}
}
impl VectorIndex for QdrantIndex {
	fn search<'a>(
		&'a self,
		collection: &'a str,
		vectors: &'a [Vec<f32>],
		limit: usize,
	) -> BoxFuture<'a, Result<VectorSearchResult>> {
		Box::pin(self.search_inner(collection, vectors, limit))
	}

	fn lexical_search<'a>(
		&'a self,
		collection: &'a str,
		query: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<LexicalHit>>> {
		Box::pin(self.lexical_search_inner(collection, query, limit))
	}

	fn upsert<'a>(
		&'a self,
		collection: &'a str,
		items: &'a [VectorItem],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_inner(collection, items))
	}

	fn has_collection<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(self.client.collection_exists(collection).await?) })
	}
}

pub fn point_id(id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes())
}

fn decode_point(point: &ScoredPoint) -> (String, String, Map<String, JsonValue>) {
	let id = match point.payload.get(ID_KEY).and_then(|value| value.kind.as_ref()) {
		Some(Kind::StringValue(text)) => text.clone(),
		_ => String::new(),
	};
	let document = match point.payload.get(TEXT_KEY).and_then(|value| value.kind.as_ref()) {
		Some(Kind::StringValue(text)) => text.clone(),
		_ => String::new(),
	};
	let metadata = match point.payload.get(METADATA_KEY).map(payload_to_json) {
		Some(JsonValue::Object(map)) => map,
		_ => Map::new(),
	};

	(id, document, metadata)
}

fn payload_to_json(value: &Value) -> JsonValue {
	match &value.kind {
		Some(Kind::NullValue(_)) | None => JsonValue::Null,
		Some(Kind::BoolValue(flag)) => JsonValue::Bool(*flag),
		Some(Kind::IntegerValue(number)) => JsonValue::from(*number),
		Some(Kind::DoubleValue(number)) => JsonValue::from(*number),
		Some(Kind::StringValue(text)) => JsonValue::String(text.clone()),
		Some(Kind::ListValue(list)) => {
			JsonValue::Array(list.values.iter().map(payload_to_json).collect())
		},
		Some(Kind::StructValue(inner)) => JsonValue::Object(
			inner.fields.iter().map(|(key, value)| (key.clone(), payload_to_json(value))).collect(),
		),
	}
}
