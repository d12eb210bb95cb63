mod commands;
mod output;

use clap::{Args, Parser, Subcommand};
use dtmap_core::config::{
    PipelineOptions, DEFAULT_CLUSTER_MAP_FILE, DEFAULT_MAPPINGS_FILE, DEFAULT_VERIFICATION_FILE,
};
use dtmap_core::terminology::CodeFilter;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dtmap",
    version,
    about = "Map decision-tree conditions to clusters of clinical terminology codes"
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster the terminology and map every decision-tree condition (full pipeline)
    Run {
        /// Decision-tree records (JSON array)
        records: PathBuf,

        /// Terminology table (JSON array or CSV with code,description columns)
        terminology: PathBuf,

        /// Where to write the cluster map
        #[arg(long, default_value = DEFAULT_CLUSTER_MAP_FILE)]
        clusters_out: PathBuf,

        /// Where to write the mapping output
        #[arg(long, default_value = DEFAULT_MAPPINGS_FILE)]
        mappings_out: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Cluster the terminology only and write the cluster map
    Cluster {
        /// Terminology table (JSON array or CSV with code,description columns)
        terminology: PathBuf,

        /// Where to write the cluster map
        #[arg(long, default_value = DEFAULT_CLUSTER_MAP_FILE)]
        clusters_out: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Map decision-tree conditions against an existing cluster map
    Match {
        /// Decision-tree records (JSON array)
        records: PathBuf,

        /// Cluster map written by `dtmap cluster` or `dtmap run`
        #[arg(long, default_value = DEFAULT_CLUSTER_MAP_FILE)]
        clusters: PathBuf,

        /// Ask the oracle for a condition and its codes directly; no cluster map is read
        #[arg(long)]
        direct: bool,

        /// Where to write the mapping output
        #[arg(long, default_value = DEFAULT_MAPPINGS_FILE)]
        mappings_out: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Print the condition profile extracted from each decision-tree record
    Profile {
        /// Decision-tree records (JSON array)
        records: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Ask the oracle to audit one randomly sampled mapping
    Verify {
        /// Terminology table used to re-query code descriptions
        terminology: PathBuf,

        /// Mapping output to sample from
        #[arg(long, default_value = DEFAULT_MAPPINGS_FILE)]
        mappings: PathBuf,

        /// Where to write the verification report
        #[arg(short = 'O', long = "out", value_name = "FILE", default_value = DEFAULT_VERIFICATION_FILE)]
        out: PathBuf,

        /// Also translate the representative back into the condition language
        #[arg(long)]
        back_translate: bool,

        /// Seed for the record sampler (random if omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Language of the decision-tree conditions
        #[arg(long, default_value = "Chinese")]
        condition_language: String,

        /// Language of the terminology descriptions
        #[arg(long, default_value = "English")]
        terminology_language: String,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Look up mappings by category or code
    Query {
        /// Mapping output to search
        #[arg(long, default_value = DEFAULT_MAPPINGS_FILE)]
        mappings: PathBuf,

        /// Show records in this category (e.g. "respiratory", "obs and gyne")
        #[arg(long, conflicts_with = "code")]
        category: Option<String>,

        /// Show records whose cluster contains this code
        #[arg(long)]
        code: Option<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// List the clinical categories conditions are classified into
    Categories,
}

/// Tuning flags shared by the commands that cluster or match.
#[derive(Args)]
struct PipelineArgs {
    /// Terminology codes per clustering request
    #[arg(long, default_value_t = 50)]
    batch_size: usize,

    /// Minimum similarity for the translated fuzzy match
    #[arg(long, default_value_t = 0.8)]
    fuzzy_threshold: f64,

    /// Minimum similarity for the closest-match fallback of the oracle tier
    #[arg(long, default_value_t = 0.7)]
    fallback_threshold: f64,

    /// Clustering attempts per batch
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Records between mapping checkpoints
    #[arg(long, default_value_t = 10)]
    flush_every: usize,

    /// Skip the pauses between oracle calls
    #[arg(long)]
    no_delay: bool,

    /// Only cluster codes starting with this prefix
    #[arg(long)]
    code_prefix: Option<String>,

    /// Only cluster codes whose description contains this text
    #[arg(long)]
    description_contains: Option<String>,

    /// Language of the decision-tree conditions
    #[arg(long, default_value = "Chinese")]
    condition_language: String,

    /// Language of the terminology descriptions
    #[arg(long, default_value = "English")]
    terminology_language: String,
}

impl PipelineArgs {
    fn into_options(self) -> PipelineOptions {
        let defaults = if self.no_delay {
            PipelineOptions::without_delays()
        } else {
            PipelineOptions::default()
        };
        PipelineOptions {
            batch_size: self.batch_size,
            fuzzy_threshold: self.fuzzy_threshold,
            fallback_threshold: self.fallback_threshold,
            retry_attempts: self.retries,
            flush_every: self.flush_every,
            condition_language: self.condition_language,
            terminology_language: self.terminology_language,
            code_filter: CodeFilter {
                code_prefix: self.code_prefix,
                description_contains: self.description_contains,
            },
            ..defaults
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let result = match cli.command {
        Commands::Run {
            records,
            terminology,
            clusters_out,
            mappings_out,
            pipeline,
            output,
        } => commands::run::run(
            &records,
            &terminology,
            clusters_out,
            mappings_out,
            pipeline.into_options(),
            &output,
        ),
        Commands::Cluster {
            terminology,
            clusters_out,
            pipeline,
            output,
        } => commands::run::cluster(&terminology, clusters_out, pipeline.into_options(), &output),
        Commands::Match {
            records,
            clusters,
            direct,
            mappings_out,
            pipeline,
            output,
        } => commands::run::rematch(
            &records,
            &clusters,
            direct,
            mappings_out,
            pipeline.into_options(),
            &output,
        ),
        Commands::Profile { records, output } => commands::profile::run(&records, &output),
        Commands::Verify {
            terminology,
            mappings,
            out,
            back_translate,
            seed,
            condition_language,
            terminology_language,
            output,
        } => {
            let options = PipelineOptions {
                condition_language,
                terminology_language,
                call_delay: Duration::ZERO,
                ..PipelineOptions::default()
            };
            commands::verify::run(
                &terminology,
                &mappings,
                &out,
                back_translate,
                seed,
                &options,
                &output,
            )
        }
        Commands::Query {
            mappings,
            category,
            code,
            output,
        } => commands::query::run(&mappings, category.as_deref(), code.as_deref(), &output),
        Commands::Categories => commands::query::categories(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
