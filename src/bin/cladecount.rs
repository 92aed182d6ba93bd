use std::process::ExitCode;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use cladecount::app::{Pipeline, RunOptions};
use cladecount::config::Config;
use cladecount::domain::AsOf;
use cladecount::error::CladeError;
use cladecount::fetch::HttpTransfer;
use cladecount::ncbi::NcbiHttpClient;
use cladecount::nextclade::{DEFAULT_DATASET_TAG, NextcladeCli};
use cladecount::output::JsonOutput;
use cladecount::s3::{S3HttpStore, resolve_as_of};

#[derive(Parser)]
#[command(name = "cladecount")]
#[command(about = "Point-in-time SARS-CoV-2 clade counts from public genome surveillance data")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download genome metadata as of a date and write clade counts")]
    Counts(CountsArgs),
    #[command(about = "Download and unpack the NCBI genome sequence package")]
    Sequences(SequencesArgs),
    #[command(about = "Resolve the metadata object version as of a date")]
    Resolve(ResolveArgs),
    #[command(about = "Download the pinned nextclade reference dataset")]
    Dataset(DatasetArgs),
}

#[derive(Args)]
struct CountsArgs {
    #[arg(long, help = "As-of date (YYYY-MM-DD), defaults to now")]
    as_of: Option<String>,

    #[arg(long, help = "Directory for downloaded and derived files")]
    data_dir: Option<Utf8PathBuf>,

    #[arg(long, help = "Reuse an already-downloaded metadata file for the same date")]
    use_existing: bool,

    #[arg(long, help = "Cap the number of metadata rows read")]
    num_rows: Option<usize>,
}

#[derive(Args)]
struct SequencesArgs {
    #[arg(long, help = "Only request sequences released since this date (YYYY-MM-DD)")]
    released_since: String,

    #[arg(long, help = "Directory for downloaded and derived files")]
    data_dir: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct ResolveArgs {
    #[arg(long, help = "As-of date (YYYY-MM-DD), defaults to now")]
    as_of: Option<String>,

    #[arg(long, help = "Object key to resolve, defaults to the genome metadata key")]
    key: Option<String>,
}

#[derive(Args)]
struct DatasetArgs {
    #[arg(long, default_value = DEFAULT_DATASET_TAG)]
    tag: String,

    #[arg(long, help = "Directory for downloaded and derived files")]
    data_dir: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        if let Some(clade) = report.downcast_ref::<CladeError>() {
            // A malformed upstream package is expected bad data, not a crate
            // defect: print the member listing and stop without a report chain.
            if let CladeError::PackageIncomplete { members } = clade {
                eprintln!("error downloading NCBI package: archive is missing expected members");
                for member in members {
                    eprintln!("  {member}");
                }
                return ExitCode::from(4);
            }
            eprintln!("{report:?}");
            return ExitCode::from(map_exit_code(clade));
        }
        eprintln!("{report:?}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CladeError) -> u8 {
    match error {
        CladeError::NoVersionFound { .. } => 2,
        CladeError::InvalidDate(_) => 2,
        CladeError::S3Http(_)
        | CladeError::S3Status { .. }
        | CladeError::NcbiHttp(_)
        | CladeError::NcbiStatus { .. }
        | CladeError::TransferHttp(_)
        | CladeError::TransferStatus { .. }
        | CladeError::MissingTool(_)
        | CladeError::Nextclade(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Counts(args) => run_counts(args),
        Commands::Sequences(args) => run_sequences(args),
        Commands::Resolve(args) => run_resolve(args),
        Commands::Dataset(args) => run_dataset(args),
    }
}

fn parse_as_of(value: Option<&str>) -> miette::Result<AsOf> {
    match value {
        Some(value) => value.parse::<AsOf>().into_diagnostic(),
        None => Ok(AsOf::now()),
    }
}

fn build_pipeline(
    data_dir: Option<Utf8PathBuf>,
) -> miette::Result<Pipeline<S3HttpStore, NcbiHttpClient, HttpTransfer>> {
    let config = Config::new(data_dir).into_diagnostic()?;
    let versions = S3HttpStore::new().into_diagnostic()?;
    let ncbi = NcbiHttpClient::new(&config.ncbi_base_url).into_diagnostic()?;
    let transfer = HttpTransfer::new().into_diagnostic()?;
    Ok(Pipeline::new(config, versions, ncbi, transfer))
}

fn run_counts(args: CountsArgs) -> miette::Result<()> {
    let as_of = parse_as_of(args.as_of.as_deref())?;
    let pipeline = build_pipeline(args.data_dir)?;
    let options = RunOptions {
        use_existing: args.use_existing,
        num_rows: args.num_rows,
    };
    let result = pipeline.clade_counts(&as_of, &options).into_diagnostic()?;
    JsonOutput::print_counts(&result).into_diagnostic()?;
    Ok(())
}

fn run_sequences(args: SequencesArgs) -> miette::Result<()> {
    NaiveDate::parse_from_str(&args.released_since, "%Y-%m-%d")
        .map_err(|_| {
            CladeError::InvalidDate(format!(
                "invalid date string: {} (should be in YYYY-MM-DD format)",
                args.released_since
            ))
        })
        .into_diagnostic()?;

    let pipeline = build_pipeline(args.data_dir)?;
    let result = pipeline
        .fetch_sequence_package(&args.released_since)
        .into_diagnostic()?;
    JsonOutput::print_package(&result).into_diagnostic()?;
    Ok(())
}

fn run_resolve(args: ResolveArgs) -> miette::Result<()> {
    let as_of = parse_as_of(args.as_of.as_deref())?;
    let config = Config::new(None).into_diagnostic()?;
    let key = args.key.unwrap_or_else(|| config.genome_metadata_key.clone());
    let store = S3HttpStore::new().into_diagnostic()?;

    let reference =
        resolve_as_of(&store, &config.nextstrain_bucket, &key, &as_of).into_diagnostic()?;
    JsonOutput::print_reference(&reference).into_diagnostic()?;
    Ok(())
}

fn run_dataset(args: DatasetArgs) -> miette::Result<()> {
    let config = Config::new(args.data_dir).into_diagnostic()?;
    std::fs::create_dir_all(config.data_path.as_std_path()).into_diagnostic()?;

    let nextclade = NextcladeCli::new();
    let output_zip = config.nextclade_dataset_path(&args.tag);
    nextclade
        .download_dataset(&args.tag, output_zip.as_std_path())
        .into_diagnostic()?;
    println!("{output_zip}");
    Ok(())
}
