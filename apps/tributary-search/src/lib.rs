use std::{io, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use tributary_config::Config;
use tributary_service::{
	AggregationMode, SaveMemoryOutcome, ScoreNormalization, SearchRequest, SearchService,
};
use tributary_storage::{db::Db, vector::VectorBackend};

#[derive(Debug, Parser)]
#[command(
	version = tributary_cli::VERSION,
	rename_all = "kebab",
	styles = tributary_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Searches every source and prints the ranked results with the assembled context.
	Search(SearchArgs),
	/// Stores a memory unless a near-identical one already exists.
	Remember {
		#[arg(long, short = 'u')]
		user: String,
		content: String,
	},
}

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
	#[arg(long, short = 'u')]
	pub user: String,
	pub query: String,
	#[arg(long, short = 'k')]
	pub top_k: Option<u32>,
	#[arg(long)]
	pub threshold: Option<f32>,
	#[arg(long)]
	pub relevance_floor: Option<f32>,
	#[arg(long)]
	pub hybrid: bool,
	#[arg(long)]
	pub bm25_weight: Option<f32>,
	#[arg(long)]
	pub rerank: bool,
	#[arg(long)]
	pub k_reranker: Option<u32>,
	/// `merge_all` or `threshold_filtered`.
	#[arg(long)]
	pub mode: Option<String>,
	/// `raw` or `min_max`.
	#[arg(long)]
	pub normalization: Option<String>,
	#[arg(long = "file", value_name = "FILE_ID")]
	pub file_ids: Vec<String>,
	#[arg(long)]
	pub timeout_ms: Option<u64>,
	#[arg(long)]
	pub max_chars: Option<usize>,
}
impl SearchArgs {
	/// Unset flags stay `None` so the configured defaults apply.
	pub fn to_request(&self) -> tributary_service::Result<SearchRequest> {
		Ok(SearchRequest {
			top_k: self.top_k,
			threshold: self.threshold,
			relevance_floor: self.relevance_floor,
			hybrid: self.hybrid.then_some(true),
			bm25_weight: self.bm25_weight,
			rerank: self.rerank.then_some(true),
			k_reranker: self.k_reranker,
			mode: self.mode.as_deref().map(AggregationMode::parse).transpose()?,
			normalization: self
				.normalization
				.as_deref()
				.map(ScoreNormalization::parse)
				.transpose()?,
			file_ids: (!self.file_ids.is_empty()).then(|| self.file_ids.clone()),
			timeout_ms: self.timeout_ms,
			..SearchRequest::new(self.user.as_str(), self.query.as_str())
		})
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = tributary_config::load(&args.config)?;

	init_tracing(&config)?;

	let service = connect(config).await?;

	match args.command {
		Command::Search(search) => {
			let req = search.to_request()?;
			let (result, context) = service.search_with_context(req, search.max_chars).await?;

			println!(
				"{}",
				serde_json::to_string_pretty(&json!({ "result": result, "context": context }))?
			);
		},
		Command::Remember { user, content } => {
			let output = match service.save_memory(&user, &content).await? {
				SaveMemoryOutcome::Saved { memory_id } =>
					json!({ "status": "saved", "memory_id": memory_id.to_string() }),
				SaveMemoryOutcome::Duplicate { similarity } =>
					json!({ "status": "duplicate", "similarity": similarity }),
			};

			println!("{}", serde_json::to_string_pretty(&output)?);
		},
	}

	Ok(())
}

async fn connect(config: Config) -> color_eyre::Result<SearchService> {
	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let backend = VectorBackend::from_config(&config.storage.vector)?;

	tracing::info!(backend = backend.name(), "Vector backend ready.");

	Ok(SearchService::new(config, Arc::new(db), Arc::new(backend)))
}

fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

	Ok(())
}
