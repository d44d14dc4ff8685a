//! Catalog reads filtered by ownership and `access_control`.
//!
//! An item is visible to a user when the user owns it, when it has no `access_control` and the
//! requested permission is read, or when `access_control -> <permission>` lists the user or one
//! of the user's groups.

use crate::{
	Result,
	db::Db,
	models::{KnowledgeBase, Memory, Note, Permission, Prompt},
};

const ACCESS_FILTER: &str = "\
(
	t.user_id = $1
	OR (t.access_control IS NULL AND $2 = 'read')
	OR COALESCE(t.access_control -> $2 -> 'user_ids', '[]'::jsonb) ? $1
	OR EXISTS (
		SELECT 1
		FROM user_group_members m
		WHERE m.user_id = $1
			AND COALESCE(t.access_control -> $2 -> 'group_ids', '[]'::jsonb) ? m.group_id
	)
)";

pub async fn list_readable_collections(
	db: &Db,
	user_id: &str,
	permission: Permission,
) -> Result<Vec<KnowledgeBase>> {
	let sql = format!(
		"\
SELECT t.knowledge_base_id, t.name
FROM knowledge_bases t
WHERE {ACCESS_FILTER}
ORDER BY t.created_at, t.knowledge_base_id"
	);
	let rows = sqlx::query_as::<_, KnowledgeBase>(&sql)
		.bind(user_id)
		.bind(permission.as_str())
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn list_readable_notes(
	db: &Db,
	user_id: &str,
	permission: Permission,
) -> Result<Vec<Note>> {
	let sql = format!(
		"\
SELECT t.note_id, t.user_id, t.title, t.data, t.created_at
FROM notes t
WHERE {ACCESS_FILTER}
ORDER BY t.created_at DESC, t.note_id"
	);
	let rows = sqlx::query_as::<_, Note>(&sql)
		.bind(user_id)
		.bind(permission.as_str())
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn list_readable_prompts(
	db: &Db,
	user_id: &str,
	permission: Permission,
) -> Result<Vec<Prompt>> {
	let sql = format!(
		"\
SELECT t.command, t.user_id, t.title, t.content, t.created_at
FROM prompts t
WHERE {ACCESS_FILTER}
ORDER BY t.created_at DESC, t.command"
	);
	let rows = sqlx::query_as::<_, Prompt>(&sql)
		.bind(user_id)
		.bind(permission.as_str())
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn count_memories(db: &Db, user_id: &str) -> Result<i64> {
	let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memories WHERE user_id = $1")
		.bind(user_id)
		.fetch_one(&db.pool)
		.await?;

	Ok(count)
}

pub async fn insert_memory(db: &Db, memory: &Memory) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO memories (memory_id, user_id, content, created_at)
VALUES ($1, $2, $3, $4)",
	)
	.bind(memory.memory_id)
	.bind(memory.user_id.as_str())
	.bind(memory.content.as_str())
	.bind(memory.created_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}
