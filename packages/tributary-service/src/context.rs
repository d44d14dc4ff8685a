use crate::AggregatedResult;

/// Renders results as `[Source: {source_name}] {content}` blocks, in order, while the running
/// length stays within `max_chars` characters. The first block that would overflow ends the
/// context; no block is ever cut short.
pub fn assemble_context(result: &AggregatedResult, max_chars: usize) -> String {
	let mut context = String::new();
	let mut used = 0;
	let mut included = 0;

	for item in result.results() {
		let block = format!("[Source: {}] {}\n\n", item.source_name, item.content);
		let len = block.chars().count();

		if used + len > max_chars {
			break;
		}

		context.push_str(&block);

		used += len;
		included += 1;
	}

	let context = context.trim_end().to_string();

	tracing::debug!(
		chars = context.chars().count(),
		included,
		available = result.total_count(),
		"Assembled search context."
	);

	context
}
