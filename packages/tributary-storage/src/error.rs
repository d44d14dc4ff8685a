#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Catalog query failed: {0}")]
	Database(#[from] sqlx::Error),
	#[error("Qdrant request failed: {0}")]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Collection {0} does not exist.")]
	MissingCollection(String),
	#[error("All {failures} collection queries failed.")]
	AllCollectionsFailed { failures: usize },
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
