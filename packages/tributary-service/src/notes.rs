//! Lexical search over a user's readable notes.

use serde_json::{Map, Value};

use tributary_storage::models::Note;

use crate::{
	Catalog, Result, SearchResult,
	lexical::{self, FieldWeights, LexicalQuery, SNIPPET_CHARS},
};

const TITLE_WEIGHTS: FieldWeights = FieldWeights { exact: 1.0, word: 0.5 };
const CONTENT_WEIGHTS: FieldWeights = FieldWeights { exact: 0.7, word: 0.3 };

pub async fn search_notes(
	catalog: &dyn Catalog,
	user_id: &str,
	query: &str,
	k: usize,
) -> Vec<SearchResult> {
	match try_search_notes(catalog, user_id, query, k).await {
		Ok(results) => {
			tracing::debug!(user_id, count = results.len(), "Note search finished.");

			results
		},
		Err(err) => {
			tracing::error!(error = %err, user_id, "Note search failed.");

			Vec::new()
		},
	}
}

async fn try_search_notes(
	catalog: &dyn Catalog,
	user_id: &str,
	query: &str,
	k: usize,
) -> Result<Vec<SearchResult>> {
	let notes = catalog.list_readable_notes(user_id).await?;

	Ok(rank_notes(&notes, query, k))
}

/// Scores every note against `query` and returns the best `k`, highest first.
pub fn rank_notes(notes: &[Note], query: &str, k: usize) -> Vec<SearchResult> {
	let query = LexicalQuery::new(query);
	let scored = notes
		.iter()
		.filter_map(|note| {
			let content = note_content(&note.data);
			let score = score_note(&query, &note.title, &content);

			(score > 0.0).then_some(((note, content), score))
		})
		.collect();

	lexical::rank(scored, k)
		.into_iter()
		.map(|((note, content), score)| {
			let text = if content.is_empty() {
				note.title.clone()
			} else {
				format!("{}\n\n{}", note.title, lexical::snippet(&content, SNIPPET_CHARS))
			};
			let mut metadata = Map::new();

			metadata.insert("note_id".to_string(), Value::String(note.note_id.clone()));
			metadata.insert("title".to_string(), Value::String(note.title.clone()));
			metadata
				.insert("created_at".to_string(), Value::from(note.created_at.unix_timestamp()));

			SearchResult {
				content: text,
				metadata,
				score,
				source: note.note_id.clone(),
				source_name: format!("Note: {}", note.title),
			}
		})
		.collect()
}

/// Body text of a note: `content.md`, then `content.text`, then `content` when it is a string.
pub fn note_content(data: &Value) -> String {
	match data.get("content") {
		Some(Value::Object(content)) => content
			.get("md")
			.and_then(Value::as_str)
			.filter(|text| !text.is_empty())
			.or_else(|| content.get("text").and_then(Value::as_str))
			.unwrap_or_default()
			.to_string(),
		Some(Value::String(text)) => text.clone(),
		_ => String::new(),
	}
}

fn score_note(query: &LexicalQuery, title: &str, content: &str) -> f32 {
	query.score_field(&title.to_lowercase(), TITLE_WEIGHTS)
		+ query.score_field(&content.to_lowercase(), CONTENT_WEIGHTS)
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use time::OffsetDateTime;

	use super::*;

	fn note(id: &str, title: &str, data: Value) -> Note {
		Note {
			note_id: id.to_string(),
			user_id: "u1".to_string(),
			title: title.to_string(),
			data,
			created_at: OffsetDateTime::UNIX_EPOCH,
		}
	}

	fn score(query: &str, title: &str, content: &str) -> f32 {
		score_note(&LexicalQuery::new(query), title, content)
	}

	#[test]
	fn title_match_ignores_case() {
		assert_eq!(score("python", "I love Python", "no mention"), 1.0);
	}

	#[test]
	fn single_word_in_content_scores_word_weight() {
		assert_eq!(score("machine learning", "ML basics", "a machine that sorts"), 0.3);
	}

	#[test]
	fn title_and_content_contributions_add_up() {
		let total = score("rust", "Rust notes", "rust everywhere");

		assert!((total - 1.7).abs() < 1e-6);
	}

	#[test]
	fn empty_query_scores_every_note_in_full() {
		let notes = vec![
			note("n1", "I love Python", json!({ "content": { "md": "body" } })),
			note("n2", "Untitled", json!({})),
		];
		let results = rank_notes(&notes, "", 5);

		assert_eq!(results.len(), 2);
		assert!(results.iter().all(|result| (result.score - 1.7).abs() < 1e-6));
	}

	#[test]
	fn padded_query_is_not_trimmed() {
		let notes = vec![note("n1", "I love Python", json!({ "content": { "md": "body" } }))];
		let results = rank_notes(&notes, " python ", 5);

		assert_eq!(results.len(), 1);
		assert_eq!(results[0].score, 0.5);
	}

	#[test]
	fn content_extraction_prefers_markdown() {
		assert_eq!(note_content(&json!({ "content": { "md": "# md", "text": "plain" } })), "# md");
		assert_eq!(note_content(&json!({ "content": { "md": "", "text": "plain" } })), "plain");
		assert_eq!(note_content(&json!({ "content": "bare" })), "bare");
		assert_eq!(note_content(&json!({ "content": 3 })), "");
		assert_eq!(note_content(&json!(null)), "");
	}

	#[test]
	fn ranked_notes_carry_snippet_and_metadata() {
		let long_body = "rust ".repeat(200);
		let notes = vec![
			note("n1", "Gardening", json!({ "content": { "md": "tomatoes" } })),
			note("n2", "Rust tips", json!({ "content": { "md": long_body } })),
			note("n3", "Rust", json!({})),
		];
		let results = rank_notes(&notes, "rust", 5);

		assert_eq!(results.len(), 2);
		assert_eq!(results[0].source, "n2");
		assert_eq!(results[0].source_name, "Note: Rust tips");
		assert_eq!(results[0].content.chars().count(), "Rust tips\n\n".len() + SNIPPET_CHARS);
		assert_eq!(results[0].metadata["note_id"], "n2");
		assert_eq!(results[0].metadata["created_at"], 0);
		assert_eq!(results[1].content, "Rust");
	}

	#[test]
	fn ranked_notes_are_capped() {
		let notes: Vec<Note> =
			(0..5).map(|i| note(&format!("n{i}"), "rust", json!({}))).collect();

		assert_eq!(rank_notes(&notes, "rust", 2).len(), 2);
	}
}
