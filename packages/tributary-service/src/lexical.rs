//! Substring scoring shared by the note and prompt sources.

use std::cmp::Ordering;

/// Characters of body text carried into a lexical result.
pub(crate) const SNIPPET_CHARS: usize = 500;

#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldWeights {
	/// Awarded when the whole query occurs in the field.
	pub(crate) exact: f32,
	/// Awarded when only some query word occurs in the field.
	pub(crate) word: f32,
}

pub(crate) struct LexicalQuery {
	full: String,
	words: Vec<String>,
}
impl LexicalQuery {
	/// The query is lower-cased but not trimmed: surrounding whitespace is part of the exact
	/// match, and an empty query is a substring of every field.
	pub(crate) fn new(query: &str) -> Self {
		let full = query.to_lowercase();
		let words = full.split_whitespace().map(str::to_string).collect();

		Self { full, words }
	}

	/// `field` must already be lower-cased.
	pub(crate) fn score_field(&self, field: &str, weights: FieldWeights) -> f32 {
		if field.contains(self.full.as_str()) {
			weights.exact
		} else if self.words.iter().any(|word| field.contains(word.as_str())) {
			weights.word
		} else {
			0.0
		}
	}
}

pub(crate) fn snippet(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((end, _)) => &text[..end],
		None => text,
	}
}

/// Stable descending sort by score, then cap.
pub(crate) fn rank<T>(mut scored: Vec<(T, f32)>, k: usize) -> Vec<(T, f32)> {
	scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
	scored.truncate(k);

	scored
}

#[cfg(test)]
mod tests {
	use super::*;

	const WEIGHTS: FieldWeights = FieldWeights { exact: 1.0, word: 0.5 };

	#[test]
	fn exact_match_wins_over_word_match() {
		let query = LexicalQuery::new("Rust Async");

		assert_eq!(query.score_field("notes on rust async io", WEIGHTS), 1.0);
		assert_eq!(query.score_field("async first, rust later", WEIGHTS), 0.5);
		assert_eq!(query.score_field("python", WEIGHTS), 0.0);
	}

	#[test]
	fn words_match_as_substrings() {
		let query = LexicalQuery::new("borrow");

		assert_eq!(query.score_field("borrowing rules", WEIGHTS), 1.0);
	}

	#[test]
	fn empty_query_matches_every_field_exactly() {
		let query = LexicalQuery::new("");

		assert_eq!(query.score_field("anything", WEIGHTS), 1.0);
		assert_eq!(query.score_field("", WEIGHTS), 1.0);
	}

	#[test]
	fn padded_query_falls_back_to_word_match() {
		let query = LexicalQuery::new(" python ");

		assert_eq!(query.score_field("i love python", WEIGHTS), 0.5);
		assert_eq!(query.score_field("a python script", WEIGHTS), 1.0);
	}

	#[test]
	fn snippet_respects_char_boundaries() {
		assert_eq!(snippet("héllo", 2), "hé");
		assert_eq!(snippet("short", 500), "short");
	}

	#[test]
	fn rank_is_stable_for_ties() {
		let ranked = rank(vec![("a", 0.5), ("b", 0.9), ("c", 0.5), ("d", 0.1)], 3);

		assert_eq!(ranked.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec!["b", "a", "c"]);
	}
}
