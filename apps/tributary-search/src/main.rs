use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = tributary_search::Args::parse();
	tributary_search::run(args).await
}
