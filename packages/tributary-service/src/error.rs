pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
}
impl From<tributary_storage::Error> for Error {
	fn from(err: tributary_storage::Error) -> Self {
		let message = err.to_string();

		match err {
			tributary_storage::Error::InvalidArgument(_) => Self::InvalidRequest { message },
			tributary_storage::Error::MissingCollection(_) => Self::NotFound { message },
			tributary_storage::Error::Qdrant(_) => Self::Qdrant { message },
			tributary_storage::Error::Database(_)
			| tributary_storage::Error::AllCollectionsFailed { .. } => Self::Storage { message },
		}
	}
}

impl From<tributary_providers::Error> for Error {
	fn from(err: tributary_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
