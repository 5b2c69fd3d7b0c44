use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use collab_graph::aggregate::{Aggregator, CollabFold, WeightedCollabFold};
use collab_graph::codec;
use collab_graph::config::{self, PipelineConfig};
use collab_graph::graph::{Adjacency, BipartiteGraph};
use collab_graph::pipeline::Pipeline;
use collab_graph::project::{self, ProjectionOptions};
use collab_graph::schema::ShapeFold;
use collab_graph::source::SourceKind;
use collab_graph::stats::IngestSummary;
use collab_graph::validate;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "collab-graph")]
#[command(about = "Build collaboration graphs from gzip NDJSON activity archives")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest archives into the actor -> resources graph
    Collab(CollabArgs),
    /// Ingest archives into a weighted actor,resource,weight edge list
    WeightedCollab(WeightedCollabArgs),
    /// Invert a text collab graph into a resource -> actors listing
    ResourceGraph(ResourceGraphArgs),
    /// Project a graph onto actors sharing a resource
    Project(ProjectArgs),
    /// Check that archives hold newline-delimited JSON objects
    Validate(ValidateArgs),
    /// List the distinct record shapes found in archives
    InferShapes(InferShapesArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum GraphFormat {
    /// Whitespace separated adjacency lines
    Text,
    /// Little-endian node/degree/neighbors records
    Binary,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProjectFrom {
    /// Text actor -> resources graph, projected in two passes
    TextCollab,
    /// Binary resource -> actors listing, projected while streaming
    ResourceBinary,
}

#[derive(Args)]
struct SourceArgs {
    /// Source identifiers (file paths or URLs)
    sources: Vec<String>,

    /// File with one source identifier per line
    #[arg(long)]
    jobs_file: Option<PathBuf>,

    /// Source type: file or http
    #[arg(short = 't', long, default_value = "file")]
    source_type: String,

    /// Number of concurrent source workers
    #[arg(long, default_value_t = config::WORKER_COUNT)]
    workers: usize,

    /// Capacity of the decoded record channel
    #[arg(long, default_value_t = config::CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Whole-request HTTP deadline in seconds
    #[arg(long, default_value_t = config::HTTP_TIMEOUT_SECS)]
    http_timeout: u64,
}

#[derive(Args)]
struct CollabArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output path (result is discarded when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = GraphFormat::Text)]
    format: GraphFormat,
}

#[derive(Args)]
struct WeightedCollabArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output CSV path (result is discarded when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ResourceGraphArgs {
    /// Text collab graph written by `collab`
    input: PathBuf,

    /// Output path (result is discarded when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = GraphFormat::Binary)]
    format: GraphFormat,
}

#[derive(Args)]
struct ProjectArgs {
    /// Input graph file
    input: PathBuf,

    /// Layout of the input graph
    #[arg(long, value_enum, default_value_t = ProjectFrom::TextCollab)]
    from: ProjectFrom,

    /// Skip resources with more actors than this
    #[arg(long)]
    max_fan_in: Option<usize>,

    /// Output path (result is discarded when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = GraphFormat::Text)]
    format: GraphFormat,
}

#[derive(Args)]
struct ValidateArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Non-empty lines sampled per source
    #[arg(long, default_value_t = config::VALIDATION_SAMPLE_LINES)]
    sample_lines: usize,
}

#[derive(Args)]
struct InferShapesArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output path, one shape per line (result is discarded when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl SourceArgs {
    fn kind(&self) -> Result<SourceKind> {
        Ok(self.source_type.parse::<SourceKind>()?)
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_workers(self.workers)
            .with_channel_capacity(self.channel_capacity)
            .with_http_timeout(Duration::from_secs(self.http_timeout))
    }

    /// Positional sources followed by the jobs file entries.
    fn jobs(&self) -> Result<Vec<String>> {
        let mut jobs = self.sources.clone();
        if let Some(path) = &self.jobs_file {
            let listing = fs::read_to_string(path)
                .with_context(|| format!("Failed to read jobs file: {}", path.display()))?;
            jobs.extend(
                listing
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from),
            );
        }
        if jobs.is_empty() {
            warn!("No sources given");
        }
        Ok(jobs)
    }
}

/// Returns the output path, or `None` after warning that the result is dropped.
fn output_or_discard(output: Option<&Path>) -> Option<&Path> {
    if output.is_none() {
        warn!("No output path given, discarding result");
    }
    output
}

fn save_adjacency(path: &Path, adjacency: &Adjacency, format: GraphFormat) -> Result<()> {
    let written = match format {
        GraphFormat::Text => codec::save_text(path, adjacency),
        GraphFormat::Binary => codec::save_binary(path, adjacency),
    };
    written.with_context(|| format!("Failed to write graph: {}", path.display()))?;
    info!(path = %path.display(), nodes = adjacency.node_count(), "Graph written");
    Ok(())
}

fn ingest<A: Aggregator>(args: &SourceArgs, aggregator: A) -> Result<A::Output> {
    let kind = args.kind()?;
    let jobs = args.jobs()?;
    let pipeline = Pipeline::new(args.pipeline_config())?;

    info!(sources = jobs.len(), source_type = %kind, "Starting ingestion");
    let start = Instant::now();
    let ingested = pipeline.run(&jobs, kind, aggregator)?;
    print_ingest_summary(&ingested.summary, start.elapsed());
    Ok(ingested.output)
}

fn print_ingest_summary(summary: &IngestSummary, elapsed: Duration) {
    println!();
    println!("=== Summary ===");
    println!("Ingestion time:     {:.2}s", elapsed.as_secs_f64());
    println!(
        "Sources attempted:  {}/{}",
        summary.sources_completed, summary.total_sources
    );
    println!("Sources failed:     {}", summary.sources_failed);
    println!("Records decoded:    {}", summary.records_decoded);
    println!("Lines skipped:      {}", summary.lines_skipped);
    println!("Declared bytes:     {}", summary.bytes_declared);
}

fn run_collab(args: CollabArgs) -> Result<()> {
    let graph = ingest(&args.source, CollabFold)?;
    println!("Actors:             {}", graph.actor_count());
    println!("Edges:              {}", graph.edge_count());

    if let Some(path) = output_or_discard(args.output.as_deref()) {
        save_adjacency(path, graph.as_adjacency(), args.format)?;
    }
    Ok(())
}

fn run_weighted_collab(args: WeightedCollabArgs) -> Result<()> {
    let graph = ingest(&args.source, WeightedCollabFold)?;
    println!("Actors:             {}", graph.actor_count());
    println!("Weighted edges:     {}", graph.edge_count());

    if let Some(path) = output_or_discard(args.output.as_deref()) {
        codec::save_weighted_edges(path, &graph)
            .with_context(|| format!("Failed to write edge list: {}", path.display()))?;
        info!(path = %path.display(), edges = graph.edge_count(), "Edge list written");
    }
    Ok(())
}

fn load_collab(path: &Path) -> Result<BipartiteGraph> {
    let adjacency = codec::load_text(path)
        .with_context(|| format!("Failed to read collab graph: {}", path.display()))?;
    Ok(BipartiteGraph::from_adjacency(adjacency))
}

fn run_resource_graph(args: ResourceGraphArgs) -> Result<()> {
    let resources = load_collab(&args.input)?.invert();
    println!("Resources:          {}", resources.resource_count());

    if let Some(path) = output_or_discard(args.output.as_deref()) {
        save_adjacency(path, resources.as_adjacency(), args.format)?;
    }
    Ok(())
}

fn run_project(args: ProjectArgs) -> Result<()> {
    let options = ProjectionOptions {
        max_fan_in: args.max_fan_in,
    };
    let start = Instant::now();

    let projected = match args.from {
        ProjectFrom::TextCollab => project::project_two_pass(&load_collab(&args.input)?, options),
        ProjectFrom::ResourceBinary => project::project_resource_file(&args.input, options)
            .with_context(|| format!("Failed to project listing: {}", args.input.display()))?,
    };

    println!();
    println!("=== Summary ===");
    println!("Projection time:    {:.2}s", start.elapsed().as_secs_f64());
    println!("Projected edges:    {}", projected.edge_count());

    if let Some(path) = output_or_discard(args.output.as_deref()) {
        save_adjacency(path, projected.as_adjacency(), args.format)?;
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<()> {
    let kind = args.source.kind()?;
    let jobs = args.source.jobs()?;
    let provider = kind.provider(&args.source.pipeline_config())?;

    let mut rejected = 0usize;
    for id in &jobs {
        let report = provider
            .open(id)
            .and_then(|opened| validate::validate_ndjson(opened.reader, args.sample_lines));
        match report {
            Ok(report) => {
                if !report.is_ndjson {
                    rejected += 1;
                }
                println!(
                    "{}\t{}\t{}/{} ({:.3})",
                    if report.is_ndjson { "ok" } else { "not-ndjson" },
                    id,
                    report.valid,
                    report.sampled,
                    report.ratio
                );
            }
            Err(e) => {
                rejected += 1;
                warn!(source = %id, error = %e, "Validation failed");
                println!("error\t{}\t{}", id, e);
            }
        }
    }

    if rejected > 0 {
        anyhow::bail!("{} of {} sources are not valid NDJSON", rejected, jobs.len());
    }
    Ok(())
}

fn run_infer_shapes(args: InferShapesArgs) -> Result<()> {
    let shapes = ingest(&args.source, ShapeFold)?;
    println!("Distinct shapes:    {}", shapes.len());

    if let Some(path) = output_or_discard(args.output.as_deref()) {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for shape in &shapes {
            writeln!(writer, "{}", shape)?;
        }
        writer.flush()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Collab(args) => run_collab(args),
        Commands::WeightedCollab(args) => run_weighted_collab(args),
        Commands::ResourceGraph(args) => run_resource_graph(args),
        Commands::Project(args) => run_project(args),
        Commands::Validate(args) => run_validate(args),
        Commands::InferShapes(args) => run_infer_shapes(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
