//! Command-line interface for the metlink client.

use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use metlink::repository::MemoryArtworkRepository;
use metlink::{MetClient, MetConfig, ProgressiveOptions};

#[derive(Parser)]
#[command(name = "metlink", version, about = "MET collection API client")]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the catalog and print matching object ids.
    Search {
        query: String,
        /// Only return objects with images.
        #[arg(long, default_value_t = true)]
        has_images: bool,
        /// Maximum number of ids to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Fetch one object and print it as JSON.
    Fetch { object_id: u64 },
    /// List object ids in a department.
    Department { department_id: u32 },
    /// Fetch objects in batches and print the normalized records as JSON.
    Import {
        object_ids: Vec<u64>,
        #[arg(long, default_value_t = 5)]
        batch_size: usize,
        /// Importing user recorded on each record.
        #[arg(long, default_value = "cli")]
        importer: String,
    },
    /// Show rate limit and cache diagnostics.
    Status,
}

/// Check verbosity before clap parses, for early logger setup.
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = MetClient::new(MetConfig::from_env());

    match cli.command {
        Command::Search {
            query,
            has_images,
            limit,
        } => {
            let ids = client.search(&query, has_images).await?;
            println!(
                "{} {} objects match \"{}\"",
                style("→").cyan(),
                ids.len(),
                query
            );
            for id in ids.iter().take(limit) {
                println!("{id}");
            }
            if ids.len() > limit {
                println!("… {} more", ids.len() - limit);
            }
        }
        Command::Fetch { object_id } => match client.get_by_id(object_id).await? {
            Some(artwork) => println!("{}", serde_json::to_string_pretty(&artwork)?),
            None => {
                println!("{} object {} not found", style("!").yellow(), object_id);
                std::process::exit(1);
            }
        },
        Command::Department { department_id } => {
            let ids = client.objects_in_department(department_id).await?;
            println!(
                "{} {} objects in department {}",
                style("→").cyan(),
                ids.len(),
                department_id
            );
            for id in &ids {
                println!("{id}");
            }
        }
        Command::Import {
            object_ids,
            batch_size,
            importer,
        } => {
            import(&client, &object_ids, batch_size, &importer).await?;
        }
        Command::Status => {
            let rate = client.rate_limit_status().await;
            let cache = client.cache_status().await;
            println!(
                "scheduler: {}/{} in window, can send now: {}",
                rate.requests_in_window,
                rate.requests_in_window + rate.remaining,
                rate.can_send_now
            );
            println!(
                "cache: {} entries, {} hits / {} misses ({:.0}% hit rate)",
                cache.size,
                cache.hits,
                cache.misses,
                cache.hit_rate * 100.0
            );
        }
    }

    Ok(())
}

async fn import(
    client: &MetClient,
    object_ids: &[u64],
    batch_size: usize,
    importer: &str,
) -> anyhow::Result<()> {
    if object_ids.is_empty() {
        anyhow::bail!("no object ids given");
    }

    println!(
        "\n{} Importing {} objects from the MET catalog",
        style("→").cyan(),
        object_ids.len()
    );

    let pb = ProgressBar::new(object_ids.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .expect("valid progress template")
            .progress_chars("=> "),
    );

    let options = ProgressiveOptions {
        batch_size,
        batch_pause: Duration::from_millis(500),
        ..Default::default()
    };
    let result = client
        .get_many_progressive(
            object_ids,
            |progress| {
                pb.set_position(progress.items_processed as u64);
                pb.set_message(format!(
                    "batch {}/{}",
                    progress.batch_number, progress.total_batches
                ));
            },
            &options,
        )
        .await;
    pb.finish_and_clear();

    // Records are already cached, so persistence re-reads are free.
    let repo = MemoryArtworkRepository::new();
    for artwork in &result.records {
        client
            .import_and_persist(artwork.object_id, importer, &repo)
            .await?;
    }

    println!(
        "{} {} imported, {} skipped or failed",
        style("✓").green(),
        repo.len().await,
        object_ids.len() - result.records.len()
    );
    for failure in &result.failures {
        println!(
            "  {} object {}: {}",
            style("!").yellow(),
            failure.object_id,
            failure.error
        );
    }

    println!("{}", serde_json::to_string_pretty(&repo.all().await)?);
    Ok(())
}
