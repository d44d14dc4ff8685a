pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("Provider response could not be decoded: {0}")]
	Decode(#[from] serde_json::Error),
	#[error("Invalid provider header {name:?}.")]
	Header { name: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
