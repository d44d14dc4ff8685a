pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Test setup failed: {0}")]
	Setup(String),

	#[error("Test cleanup failed: {0}")]
	Cleanup(String),

	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
}
