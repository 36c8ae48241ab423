use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use sqlx::PgPool;

#[derive(Debug, Parser)]
#[command(name = "beanstore-cli")]
#[command(about = "Bean catalog maintenance commands")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Seed an empty catalog from a JSON file
    Import {
        /// Seed file to read (defaults to `BEANSTORE_SEED_PATH`)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// List every bean in the catalog
    List,
    /// Show the current featured bean
    Featured,
    /// Rotate the featured bean now
    Select {
        /// Seed the random pick for a reproducible result
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("beanstore-cli: run with --help to see available commands");
        return Ok(());
    };

    let config = beanstore_core::load_app_config()?;
    let pool = beanstore_db::connect_pool(
        &config.database_url,
        beanstore_db::PoolConfig::from_app_config(&config),
    )
    .await?;

    match command {
        Commands::Migrate => {
            let applied = beanstore_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Import { path } => {
            let path = path.unwrap_or(config.seed_path);
            run_import(&pool, &path).await?;
        }
        Commands::List => run_list(&pool).await?,
        Commands::Featured => run_featured(&pool).await?,
        Commands::Select { seed } => run_select(&pool, seed.or(config.selection_seed)).await?,
    }

    Ok(())
}

async fn run_import(pool: &PgPool, path: &std::path::Path) -> anyhow::Result<()> {
    let beans = beanstore_core::load_seed_file(path)?;
    tracing::info!(count = beans.len(), path = %path.display(), "seed file loaded");

    let imported = beanstore_db::import_beans(pool, &beans).await?;
    if imported == 0 {
        println!("catalog already has beans; nothing imported");
    } else {
        println!("imported {imported} bean(s) from {}", path.display());
    }
    Ok(())
}

async fn run_list(pool: &PgPool) -> anyhow::Result<()> {
    let beans = beanstore_db::list_beans(pool).await?;
    if beans.is_empty() {
        println!("no beans in the catalog");
        return Ok(());
    }

    for bean in beans {
        let marker = if bean.is_featured { "*" } else { " " };
        println!(
            "{marker} {:>5}  {:<20} {:>8}  {}",
            bean.id, bean.name, bean.cost, bean.colour
        );
    }
    Ok(())
}

async fn run_featured(pool: &PgPool) -> anyhow::Result<()> {
    match beanstore_db::get_featured_bean(pool).await? {
        Some(bean) => println!("{} ({}) {} [id {}]", bean.name, bean.colour, bean.cost, bean.id),
        None => println!("no bean is featured"),
    }

    let wait = beanstore_core::delay_until_next_local_midnight();
    let secs = wait.as_secs();
    println!("next rotation in {}h {:02}m", secs / 3600, (secs % 3600) / 60);
    Ok(())
}

async fn run_select(pool: &PgPool, seed: Option<u64>) -> anyhow::Result<()> {
    let mut rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let outcome = beanstore_db::run_selection_cycle(pool, &mut rng).await?;

    match outcome.featured_id {
        Some(id) if outcome.changed => {
            let previous = outcome
                .previous_featured_id
                .map_or_else(|| "none".to_string(), |p| p.to_string());
            println!("featured bean is now {id} (was {previous})");
        }
        _ => println!("no eligible beans; featured bean unchanged"),
    }
    Ok(())
}

#[cfg(test)]
mod tests;
