pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_user_groups.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_user_groups.sql")),
				"tables/002_knowledge_bases.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_knowledge_bases.sql")),
				"tables/003_notes.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_notes.sql")),
				"tables/004_prompts.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_prompts.sql")),
				"tables/005_memories.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_memories.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
