//! Lexical search over a user's readable prompt templates.

use serde_json::{Map, Value};

use tributary_storage::models::Prompt;

use crate::{
	Catalog, Result, SearchResult,
	lexical::{self, FieldWeights, LexicalQuery, SNIPPET_CHARS},
};

const COMMAND_WEIGHTS: FieldWeights = FieldWeights { exact: 1.0, word: 0.6 };
const TITLE_WEIGHTS: FieldWeights = FieldWeights { exact: 0.8, word: 0.4 };
const CONTENT_WEIGHTS: FieldWeights = FieldWeights { exact: 0.6, word: 0.2 };

pub async fn search_prompts(
	catalog: &dyn Catalog,
	user_id: &str,
	query: &str,
	k: usize,
) -> Vec<SearchResult> {
	match try_search_prompts(catalog, user_id, query, k).await {
		Ok(results) => {
			tracing::debug!(user_id, count = results.len(), "Prompt search finished.");

			results
		},
		Err(err) => {
			tracing::error!(error = %err, user_id, "Prompt search failed.");

			Vec::new()
		},
	}
}

async fn try_search_prompts(
	catalog: &dyn Catalog,
	user_id: &str,
	query: &str,
	k: usize,
) -> Result<Vec<SearchResult>> {
	let prompts = catalog.list_readable_prompts(user_id).await?;

	Ok(rank_prompts(&prompts, query, k))
}

pub fn rank_prompts(prompts: &[Prompt], query: &str, k: usize) -> Vec<SearchResult> {
	let query = LexicalQuery::new(query);
	let scored = prompts
		.iter()
		.filter_map(|prompt| {
			let score = score_prompt(&query, prompt);

			(score > 0.0).then_some((prompt, score))
		})
		.collect();

	lexical::rank(scored, k)
		.into_iter()
		.map(|(prompt, score)| {
			let mut metadata = Map::new();

			metadata.insert("command".to_string(), Value::String(prompt.command.clone()));
			metadata.insert("title".to_string(), Value::String(prompt.title.clone()));
			metadata
				.insert("created_at".to_string(), Value::from(prompt.created_at.unix_timestamp()));

			SearchResult {
				content: format!(
					"/{}: {}\n\n{}",
					prompt.command,
					prompt.title,
					lexical::snippet(&prompt.content, SNIPPET_CHARS)
				),
				metadata,
				score,
				source: prompt.command.clone(),
				source_name: format!("Prompt: {}", prompt.title),
			}
		})
		.collect()
}

fn score_prompt(query: &LexicalQuery, prompt: &Prompt) -> f32 {
	query.score_field(&prompt.command.to_lowercase(), COMMAND_WEIGHTS)
		+ query.score_field(&prompt.title.to_lowercase(), TITLE_WEIGHTS)
		+ query.score_field(&prompt.content.to_lowercase(), CONTENT_WEIGHTS)
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;

	use super::*;

	fn prompt(command: &str, title: &str, content: &str) -> Prompt {
		Prompt {
			command: command.to_string(),
			user_id: "u1".to_string(),
			title: title.to_string(),
			content: content.to_string(),
			created_at: OffsetDateTime::UNIX_EPOCH,
		}
	}

	fn score(query: &str, prompt: &Prompt) -> f32 {
		score_prompt(&LexicalQuery::new(query), prompt)
	}

	#[test]
	fn command_outweighs_title_and_content() {
		let by_command = prompt("summarize", "Digest", "Shorten the text.");
		let by_title = prompt("tldr", "Summarize", "Shorten the text.");
		let by_content = prompt("tldr", "Digest", "Summarize the text.");

		assert_eq!(score("summarize", &by_command), 1.0);
		assert_eq!(score("summarize", &by_title), 0.8);
		assert_eq!(score("summarize", &by_content), 0.6);
	}

	#[test]
	fn word_matches_use_lower_weights() {
		let p = prompt("review-code", "Code review", "Review this code for bugs.");

		// "code" hits every field by word, "please" hits nothing.
		let total = score("please code", &p);

		assert!((total - (0.6 + 0.4 + 0.2)).abs() < 1e-6);
	}

	#[test]
	fn empty_query_scores_every_field_exactly() {
		let results = rank_prompts(&[prompt("tldr", "Digest", "Shorten the text.")], "", 3);

		assert_eq!(results.len(), 1);
		assert!((results[0].score - 2.4).abs() < 1e-6);
	}

	#[test]
	fn padded_query_only_earns_word_weights() {
		let p = prompt("summarize", "Summarize", "Summarize the text.");

		assert!((score(" summarize ", &p) - (0.6 + 0.4 + 0.2)).abs() < 1e-6);
	}

	#[test]
	fn ranked_prompts_use_command_layout() {
		let prompts = vec![
			prompt("translate", "Translate text", "Translate the following into French."),
			prompt("weather", "Forecast", "What is the weather?"),
		];
		let results = rank_prompts(&prompts, "translate", 3);

		assert_eq!(results.len(), 1);
		assert_eq!(
			results[0].content,
			"/translate: Translate text\n\nTranslate the following into French."
		);
		assert_eq!(results[0].source, "translate");
		assert_eq!(results[0].source_name, "Prompt: Translate text");
		assert_eq!(results[0].metadata["command"], "translate");
	}
}
