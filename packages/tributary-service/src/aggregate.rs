//! Fan-out search across every source, merge, cap, and optional rerank.

use std::{cmp::Ordering, time::Duration};

use serde::Deserialize;
use tokio::sync::OnceCell;

use tributary_storage::{models::Permission, retrieval};

use crate::{
	AggregatedResult, Error, Result, SearchResult, SearchService, assemble_context,
	knowledge::{self, CollectionRef, KnowledgeSearchArgs},
	memory, notes, prompts,
};

/// How merged results are cut down to `k`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
	/// Cap the merged list to `k` and leave relevance decisions to the caller.
	#[default]
	MergeAll,
	/// Drop results below the threshold, then cap to `k`.
	ThresholdFiltered,
}
impl AggregationMode {
	pub fn parse(label: &str) -> Result<Self> {
		match label.trim().to_ascii_lowercase().as_str() {
			"merge_all" => Ok(Self::MergeAll),
			"threshold_filtered" => Ok(Self::ThresholdFiltered),
			other => Err(Error::InvalidRequest {
				message: format!("Unknown aggregation mode {other:?}."),
			}),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::MergeAll => "merge_all",
			Self::ThresholdFiltered => "threshold_filtered",
		}
	}
}

/// Whether scores are rescaled per source before merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
	/// Merge on each source's native scale.
	#[default]
	Raw,
	/// Min-max rescale each source's scores into `[0, 1]` before merging.
	MinMax,
}
impl ScoreNormalization {
	pub fn parse(label: &str) -> Result<Self> {
		match label.trim().to_ascii_lowercase().as_str() {
			"raw" => Ok(Self::Raw),
			"min_max" => Ok(Self::MinMax),
			other => Err(Error::InvalidRequest {
				message: format!("Unknown score normalization {other:?}."),
			}),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Raw => "raw",
			Self::MinMax => "min_max",
		}
	}
}

/// One search call. Unset options fall back to the `[search]` config section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
	pub user_id: String,
	pub query: String,
	pub top_k: Option<u32>,
	pub threshold: Option<f32>,
	pub relevance_floor: Option<f32>,
	pub hybrid: Option<bool>,
	pub bm25_weight: Option<f32>,
	pub rerank: Option<bool>,
	pub k_reranker: Option<u32>,
	pub mode: Option<AggregationMode>,
	pub normalization: Option<ScoreNormalization>,
	/// Restricts knowledge search to these files instead of every readable collection.
	pub file_ids: Option<Vec<String>>,
	pub timeout_ms: Option<u64>,
}
impl SearchRequest {
	pub fn new(user_id: impl Into<String>, query: impl Into<String>) -> Self {
		Self { user_id: user_id.into(), query: query.into(), ..Default::default() }
	}
}

#[derive(Debug, Clone)]
struct ResolvedOptions {
	k: usize,
	threshold: f32,
	relevance_floor: f32,
	bm25_weight: Option<f32>,
	k_reranker: Option<usize>,
	mode: AggregationMode,
	normalization: ScoreNormalization,
	timeout: Option<Duration>,
}

/// Concatenates per-source results in order, sorts them by descending score (ties keep their
/// concatenation order), applies the mode, and caps to `k`.
pub fn merge_ranked(
	per_source: Vec<Vec<SearchResult>>,
	mode: AggregationMode,
	k: usize,
	threshold: f32,
) -> Vec<SearchResult> {
	let mut merged: Vec<SearchResult> = per_source.into_iter().flatten().collect();

	merged.sort_by(descending_score);

	if mode == AggregationMode::ThresholdFiltered {
		merged.retain(|result| result.score >= threshold);
	}

	merged.truncate(k);

	merged
}

/// Rescales one source's scores into `[0, 1]`. A source whose scores are all equal maps to 1.0.
pub fn normalize_source(results: &mut [SearchResult]) {
	let scores: Vec<f32> = results.iter().map(|result| result.score).collect();

	for (result, score) in results.iter_mut().zip(retrieval::min_max_normalize(&scores)) {
		result.score = score;
	}
}

impl SearchService {
	/// Searches knowledge collections, memories, notes and prompts for `req.query`.
	///
	/// Source failures never surface here: a failing source contributes nothing. Only invalid
	/// request options return an error.
	pub async fn search(&self, req: SearchRequest) -> Result<AggregatedResult> {
		let options = self.resolve_options(&req)?;
		// Dropping the timed-out future cancels every source still in flight.
		let gathered = match options.timeout {
			Some(limit) => tokio::time::timeout(limit, self.gather(&req, &options)).await.ok(),
			None => Some(self.gather(&req, &options).await),
		};
		let Some(per_source) = gathered else {
			tracing::warn!(
				user_id = %req.user_id,
				timeout_ms = options.timeout.map(|limit| limit.as_millis() as u64),
				"Search timed out. Returning no results."
			);

			return Ok(AggregatedResult::empty(req.query));
		};
		let mut merged = merge_ranked(per_source, options.mode, options.k, options.threshold);

		if merged.is_empty() {
			tracing::info!(user_id = %req.user_id, "No results from any source.");

			return Ok(AggregatedResult::empty(req.query));
		}
		if let Some(k_reranker) = options.k_reranker {
			merged = self.rerank_results(&req.query, merged, k_reranker).await;
		}

		let result = AggregatedResult::new(req.query, merged);

		tracing::info!(
			user_id = %req.user_id,
			count = result.total_count(),
			max_score = result.max_score(),
			mode = options.mode.as_str(),
			threshold = options.threshold,
			"Search finished."
		);

		Ok(result)
	}

	/// [`SearchService::search`] plus the context block assembled from its results.
	/// `max_chars` defaults to `context.max_chars`.
	pub async fn search_with_context(
		&self,
		req: SearchRequest,
		max_chars: Option<usize>,
	) -> Result<(AggregatedResult, String)> {
		let max_chars = max_chars.unwrap_or(self.cfg.context.max_chars);
		let result = self.search(req).await?;
		let context = assemble_context(&result, max_chars);

		Ok((result, context))
	}

	fn resolve_options(&self, req: &SearchRequest) -> Result<ResolvedOptions> {
		let search = &self.cfg.search;

		if req.user_id.trim().is_empty() {
			return Err(invalid("user_id must be non-empty."));
		}

		let k = req.top_k.unwrap_or(search.top_k) as usize;

		if k == 0 {
			return Err(invalid("top_k must be greater than zero."));
		}

		let threshold = req.threshold.unwrap_or(search.threshold);
		let relevance_floor = req.relevance_floor.unwrap_or(search.relevance_floor);

		if !threshold.is_finite() || !relevance_floor.is_finite() {
			return Err(invalid("threshold and relevance_floor must be finite numbers."));
		}

		let bm25_weight = if req.hybrid.unwrap_or(search.hybrid) {
			let weight = req.bm25_weight.unwrap_or(search.bm25_weight);

			if !(0.0..=1.0).contains(&weight) {
				return Err(invalid("bm25_weight must be in the range 0.0-1.0."));
			}

			Some(weight)
		} else {
			None
		};
		let k_reranker = if req.rerank.unwrap_or(search.rerank) {
			let k_reranker = req.k_reranker.unwrap_or(search.k_reranker) as usize;

			if k_reranker == 0 {
				return Err(invalid("k_reranker must be greater than zero."));
			}
			if self.cfg.providers.rerank.is_none() {
				return Err(invalid("Reranking requires a configured rerank provider."));
			}

			Some(k_reranker)
		} else {
			None
		};
		let mode = match req.mode {
			Some(mode) => mode,
			None => AggregationMode::parse(&search.mode)?,
		};
		let normalization = match req.normalization {
			Some(normalization) => normalization,
			None => ScoreNormalization::parse(&search.normalization)?,
		};
		let timeout = match req.timeout_ms.or(search.timeout_ms) {
			Some(0) => return Err(invalid("timeout_ms must be greater than zero.")),
			Some(ms) => Some(Duration::from_millis(ms)),
			None => None,
		};

		Ok(ResolvedOptions {
			k,
			threshold,
			relevance_floor,
			bm25_weight,
			k_reranker,
			mode,
			normalization,
			timeout,
		})
	}

	/// Runs every source concurrently. The returned lists are in source order: knowledge,
	/// memories, notes, prompts.
	///
	/// The query is embedded at most once, by whichever vector source asks first; the lexical
	/// sources never wait on it.
	async fn gather(
		&self,
		req: &SearchRequest,
		options: &ResolvedOptions,
	) -> Vec<Vec<SearchResult>> {
		let query_vector = OnceCell::new();
		let knowledge = async {
			match self.query_vector(&query_vector, req).await {
				Some(vector) => self.search_knowledge(req, options, vector).await,
				None => Vec::new(),
			}
		};
		let memories = async {
			match self.query_vector(&query_vector, req).await {
				Some(vector) =>
					memory::search_memories(
						self.catalog.as_ref(),
						self.index.as_ref(),
						&req.user_id,
						vector,
						options.k,
					)
					.await,
				None => Vec::new(),
			}
		};
		let notes = notes::search_notes(self.catalog.as_ref(), &req.user_id, &req.query, options.k);
		let prompts =
			prompts::search_prompts(self.catalog.as_ref(), &req.user_id, &req.query, options.k);
		let (knowledge, memories, notes, prompts) =
			tokio::join!(knowledge, memories, notes, prompts);

		tracing::debug!(
			knowledge = knowledge.len(),
			memories = memories.len(),
			notes = notes.len(),
			prompts = prompts.len(),
			"Collected source results."
		);

		let mut per_source = vec![knowledge, memories, notes, prompts];

		if options.normalization == ScoreNormalization::MinMax {
			for results in &mut per_source {
				normalize_source(results);
			}
		}

		per_source
	}

	async fn query_vector<'a>(
		&self,
		cell: &'a OnceCell<Option<Vec<f32>>>,
		req: &SearchRequest,
	) -> Option<&'a [f32]> {
		cell.get_or_init(|| async {
			match self.embed_one(&req.query).await {
				Ok(vector) => Some(vector),
				Err(err) => {
					tracing::error!(
						error = %err,
						user_id = %req.user_id,
						"Query embedding failed. Skipping knowledge and memory search."
					);

					None
				},
			}
		})
		.await
		.as_deref()
	}

	async fn search_knowledge(
		&self,
		req: &SearchRequest,
		options: &ResolvedOptions,
		query_vector: &[f32],
	) -> Vec<SearchResult> {
		let collections: Vec<CollectionRef> = match req.file_ids.as_deref() {
			Some(file_ids) if !file_ids.is_empty() => knowledge::collections_for_files(file_ids),
			_ => match self.catalog.list_readable_collections(&req.user_id, Permission::Read).await
			{
				Ok(bases) => bases.into_iter().map(CollectionRef::from).collect(),
				Err(err) => {
					tracing::error!(
						error = %err,
						user_id = %req.user_id,
						"Collection discovery failed."
					);

					return Vec::new();
				},
			},
		};

		if collections.is_empty() {
			tracing::debug!(
				user_id = %req.user_id,
				"No readable collections. Skipping knowledge search."
			);

			return Vec::new();
		}

		knowledge::search_knowledge(self.index.as_ref(), KnowledgeSearchArgs {
			collections: &collections,
			query: &req.query,
			query_vector,
			k: options.k,
			relevance_floor: options.relevance_floor,
			bm25_weight: options.bm25_weight,
		})
		.await
	}

	/// Re-scores the top `k_reranker` results with the rerank provider and returns them in the
	/// new order. Any provider failure keeps the merged order untouched.
	async fn rerank_results(
		&self,
		query: &str,
		merged: Vec<SearchResult>,
		k_reranker: usize,
	) -> Vec<SearchResult> {
		let Some(cfg) = self.cfg.providers.rerank.as_ref() else {
			return merged;
		};
		let candidates: Vec<SearchResult> = merged.iter().take(k_reranker).cloned().collect();
		let docs: Vec<String> = candidates.iter().map(|result| result.content.clone()).collect();

		match self.providers.rerank.rerank(cfg, query, &docs).await {
			Ok(scores) if scores.len() == candidates.len() => {
				let mut reranked: Vec<SearchResult> = candidates
					.into_iter()
					.zip(scores)
					.map(|(mut result, score)| {
						result.score = score;

						result
					})
					.collect();

				reranked.sort_by(descending_score);

				reranked
			},
			Ok(scores) => {
				tracing::warn!(
					expected = candidates.len(),
					actual = scores.len(),
					"Rerank score count mismatch. Keeping merged order."
				);

				merged
			},
			Err(err) => {
				tracing::warn!(error = %err, "Rerank failed. Keeping merged order.");

				merged
			},
		}
	}
}

fn descending_score(a: &SearchResult, b: &SearchResult) -> Ordering {
	b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
}

fn invalid(message: &str) -> Error {
	Error::InvalidRequest { message: message.to_string() }
}
