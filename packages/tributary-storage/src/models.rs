use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Access level checked against an item's `access_control` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
	Read,
	Write,
}
impl Permission {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Read => "read",
			Self::Write => "write",
		}
	}
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KnowledgeBase {
	pub knowledge_base_id: String,
	pub name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Note {
	pub note_id: String,
	pub user_id: String,
	pub title: String,
	pub data: Value,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Prompt {
	pub command: String,
	pub user_id: String,
	pub title: String,
	pub content: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Memory {
	pub memory_id: Uuid,
	pub user_id: String,
	pub content: String,
	pub created_at: OffsetDateTime,
}
