use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use mdchunk::telemetry;

mod inspect;
mod run;
mod setup;
mod split;

#[derive(Parser)]
#[command(name = "mdchunk", about = "Split long markdown files into token-budgeted chunks")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,
    /// Tokenizer: cl100k, file:<tokenizer.json> or hf:<model-id>
    #[arg(global = true, long, default_value = "cl100k")]
    tokenizer: String,
    /// Debug logging when RUST_LOG is unset
    #[arg(global = true, short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk every markdown file in a directory and write an index
    Run(run::RunCmd),
    /// Chunk a single markdown file
    #[command(alias = "chunk-file")]
    Split(split::SplitCmd),
    /// Token statistics and section outline of a file
    #[command(alias = "estimate-tokens")]
    Inspect(inspect::InspectCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // stderr only; RUST_LOG and MDCHUNK_LOG_FORMAT apply
    telemetry::config::init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => run::run(&cli.tokenizer, args).await?,
        Commands::Split(args) => split::run(&cli.tokenizer, args).await?,
        Commands::Inspect(args) => inspect::run(&cli.tokenizer, args).await?,
    }

    Ok(())
}
