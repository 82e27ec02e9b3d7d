// consumer-dedup CLI - seed, search, and deduplicate a customer store.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::path::PathBuf;

use consumer_dedup::{
    populate, run_batch, CustomerFields, DraftAction, DuplicateResolver, GeneratorConfig,
    MergeWorkflow, RecordFilter, RecordStore, RecordType, ResolutionChoice, ResolvedOutcome,
    ScoredDuplicate, SqliteStore, SubmitOutcome, ThresholdConfig,
};

#[derive(Parser)]
#[command(name = "consumer-dedup", version, about = "Customer duplicate resolution engine")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "customers.db")]
    db: PathBuf,

    /// Minimum similarity score (0-160) a duplicate must reach
    #[arg(long, global = true, default_value_t = 0)]
    similarity_threshold: u32,

    /// Maximum duplicates to return per subject
    #[arg(long, global = true, default_value_t = 10)]
    limit: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed the store with synthetic customers and known duplicates
    Generate {
        #[arg(long, default_value_t = 200)]
        records: usize,

        /// Share of records produced as typo'd duplicates
        #[arg(long, default_value_t = 0.2)]
        duplicate_ratio: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Drop existing records first
        #[arg(long)]
        reset: bool,
    },

    /// Find duplicates for an ad-hoc partial customer
    Search {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },

    /// Find duplicates of an existing record
    Duplicates { id: String },

    /// Add a customer, running the duplicate confirmation flow
    Add {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,

        /// What to do when high-confidence duplicates are found
        #[arg(long, value_enum, default_value_t = DuplicatePolicy::Abort)]
        if_duplicate: DuplicatePolicy,
    },

    /// Sweep the whole store and report duplicate groups
    Batch {
        /// Also write the groups to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Record counts by type
    Stats,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DuplicatePolicy {
    /// Create anyway, stamped as confirmed-not-duplicate
    Proceed,
    /// Keep the best-matching existing record, discard the draft
    UseExisting,
    /// Print the duplicates and stop without writing
    Abort,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consumer_dedup=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let store = SqliteStore::open(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;

    let mut settings = ThresholdConfig::default();
    settings.similarity_threshold = cli.similarity_threshold;
    settings.max_results = cli.limit.min(consumer_dedup::MAX_RESULTS_LIMIT).max(1);

    match cli.command {
        Command::Generate {
            records,
            duplicate_ratio,
            seed,
            reset,
        } => cmd_generate(&store, records, duplicate_ratio, seed, reset),
        Command::Search {
            first_name,
            last_name,
            email,
            phone,
        } => {
            let fields = assemble_fields(first_name, last_name, email, phone, None);
            cmd_search(&store, &fields, &settings)
        }
        Command::Duplicates { id } => cmd_duplicates(&store, &id, &settings),
        Command::Add {
            first_name,
            last_name,
            email,
            phone,
            address,
            if_duplicate,
        } => {
            let fields = assemble_fields(first_name, last_name, email, phone, address);
            cmd_add(&store, fields, &settings, if_duplicate)
        }
        Command::Batch { csv } => cmd_batch(&store, &settings, csv),
        Command::Stats => cmd_stats(&store),
    }
}

fn assemble_fields(
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
) -> CustomerFields {
    CustomerFields {
        first_name,
        last_name,
        email,
        phone,
        address,
    }
}

fn cmd_generate(
    store: &SqliteStore,
    records: usize,
    duplicate_ratio: f64,
    seed: u64,
    reset: bool,
) -> Result<()> {
    if reset {
        let dropped = store.clear()?;
        if dropped > 0 {
            println!("✓ Dropped {} existing records", dropped);
        }
    }

    let config = GeneratorConfig {
        num_records: records,
        duplicate_ratio,
        seed,
    };
    let counts = populate(store, &config)?;
    println!(
        "✓ Generated {} originals + {} duplicates (seed {})",
        counts.originals, counts.duplicates, seed
    );
    Ok(())
}

fn cmd_search(store: &SqliteStore, fields: &CustomerFields, settings: &ThresholdConfig) -> Result<()> {
    let resolver = DuplicateResolver::new(store);
    let duplicates = resolver.resolve(fields, None, settings, settings.max_results)?;

    if duplicates.is_empty() {
        println!("No duplicates found for {}", fields.display_name());
        return Ok(());
    }
    println!("Found {} potential duplicate(s):", duplicates.len());
    for dup in &duplicates {
        print_duplicate(dup);
    }
    Ok(())
}

fn cmd_duplicates(store: &SqliteStore, id: &str, settings: &ThresholdConfig) -> Result<()> {
    let record = store
        .find_by_id(id)?
        .with_context(|| format!("no record with id {}", id))?;

    let resolver = DuplicateResolver::new(store);
    let duplicates = resolver.resolve(
        &record.fields.searchable(),
        Some(id),
        settings,
        settings.max_results,
    )?;

    println!(
        "Duplicates of {} ({}):",
        record.fields.display_name(),
        record.id
    );
    if duplicates.is_empty() {
        println!("  none above threshold");
        return Ok(());
    }
    for dup in &duplicates {
        print_duplicate(dup);
    }
    Ok(())
}

fn cmd_add(
    store: &SqliteStore,
    fields: CustomerFields,
    settings: &ThresholdConfig,
    policy: DuplicatePolicy,
) -> Result<()> {
    let mut workflow = MergeWorkflow::new(store, settings.clone()).with_actor("cli");

    let outcome = workflow.submit(DraftAction::Create { fields })?;
    let duplicates = match outcome {
        SubmitOutcome::Resolved(ResolvedOutcome::Created { id }) => {
            println!("✓ Customer created: {}", id);
            return Ok(());
        }
        SubmitOutcome::Resolved(other) => bail!("unexpected outcome: {:?}", other),
        SubmitOutcome::AwaitingConfirmation { duplicates } => duplicates,
    };

    println!("Found {} high-confidence duplicate(s):", duplicates.len());
    for dup in &duplicates {
        print_duplicate(dup);
    }

    match policy {
        DuplicatePolicy::Abort => bail!("not created; rerun with --if-duplicate to resolve"),
        DuplicatePolicy::Proceed => {
            let resolved = workflow.confirm(ResolutionChoice::Proceed)?;
            if let ResolvedOutcome::Created { id } = resolved {
                println!("✓ Created anyway (confirmed not duplicate): {}", id);
            }
        }
        DuplicatePolicy::UseExisting => {
            // duplicates come sorted best-first
            let best = duplicates[0].record.id.clone();
            workflow.confirm(ResolutionChoice::UseExisting { id: best.clone() })?;
            println!("✓ Using existing record: {}", best);
        }
    }
    Ok(())
}

fn cmd_batch(store: &SqliteStore, settings: &ThresholdConfig, csv: Option<PathBuf>) -> Result<()> {
    let report = run_batch(store, settings)?;
    print!("{}", report.summary());

    for (i, group) in report.groups.iter().enumerate() {
        println!(
            "\nGroup #{} (max similarity {}):",
            i + 1,
            group.max_similarity
        );
        println!(
            "  master    {}  {}",
            group.master.id,
            group.master.fields.display_name()
        );
        for dup in &group.duplicates {
            println!(
                "  duplicate {}  {}  score {}",
                dup.record.id,
                dup.record.fields.display_name(),
                dup.similarity_score
            );
        }
    }

    if let Some(path) = csv {
        let file = File::create(&path)
            .with_context(|| format!("creating report file {}", path.display()))?;
        report.write_csv(file)?;
        println!("\n✓ CSV report written to {}", path.display());
    }
    Ok(())
}

fn cmd_stats(store: &SqliteStore) -> Result<()> {
    let total = store.count(RecordFilter::All)?;
    let originals = store.count(RecordFilter::ByType(RecordType::Original))?;
    let duplicates = store.count(RecordFilter::ByType(RecordType::Duplicate))?;

    println!("Records:    {}", total);
    println!("  original:  {}", originals);
    println!("  duplicate: {}", duplicates);
    Ok(())
}

fn print_duplicate(dup: &ScoredDuplicate) {
    println!(
        "  {}  {}  score {}/160 ({:.0}%)  {}  [{}]",
        dup.record.id,
        dup.record.fields.display_name(),
        dup.similarity_score,
        consumer_dedup::score_percentage(dup.similarity_score),
        dup.confidence.level,
        dup.record.record_type.as_str()
    );
}
