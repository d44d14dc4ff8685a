use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

/// One retrieved unit, scored on its source's own scale.
///
/// Vector-derived scores are clamped to `[0, 1]`. Lexical scores are additive heuristics and may
/// exceed 1.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
	pub content: String,
	pub metadata: Map<String, Value>,
	pub score: f32,
	/// Machine identifier: collection id, note id, or prompt command.
	pub source: String,
	/// Label shown in assembled context.
	pub source_name: String,
}

/// The ranked answer to one query.
///
/// `total_count`, `max_score` and `sources` are derived from `results` and only change through
/// [`AggregatedResult::set_results`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
	results: Vec<SearchResult>,
	total_count: usize,
	max_score: f32,
	sources: BTreeSet<String>,
	query: String,
}
impl AggregatedResult {
	pub fn new(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
		let mut out = Self::empty(query);

		out.set_results(results);

		out
	}

	pub fn empty(query: impl Into<String>) -> Self {
		Self {
			results: Vec::new(),
			total_count: 0,
			max_score: 0.0,
			sources: BTreeSet::new(),
			query: query.into(),
		}
	}

	pub fn set_results(&mut self, results: Vec<SearchResult>) {
		self.total_count = results.len();
		self.max_score = results.iter().map(|result| result.score).reduce(f32::max).unwrap_or(0.0);
		self.sources = results.iter().map(|result| result.source.clone()).collect();
		self.results = results;
	}

	pub fn results(&self) -> &[SearchResult] {
		&self.results
	}

	pub fn into_results(self) -> Vec<SearchResult> {
		self.results
	}

	pub fn total_count(&self) -> usize {
		self.total_count
	}

	pub fn max_score(&self) -> f32 {
		self.max_score
	}

	pub fn sources(&self) -> &BTreeSet<String> {
		&self.sources
	}

	pub fn query(&self) -> &str {
		&self.query
	}

	pub fn is_empty(&self) -> bool {
		self.results.is_empty()
	}

	/// True when at least one result reaches `threshold`.
	pub fn is_relevant(&self, threshold: f32) -> bool {
		!self.results.is_empty() && self.max_score >= threshold
	}
}
