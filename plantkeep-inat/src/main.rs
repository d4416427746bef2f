//! PlantKeep iNaturalist import CLI
//!
//! Connects an iNaturalist account, lists observations that could be
//! imported, runs imports into the local inventory, and manages backups.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use plantkeep_common::backup::{read_backup, write_backup};
use plantkeep_common::config::{
    get_user_agent, load_toml_config, resolve_config_path, resolve_data_folder, LoggingConfig,
    TomlConfig,
};
use plantkeep_common::store::{apply_import, InventoryStore};
use plantkeep_inat::{
    filter_candidates, ImportCoordinator, ImportRequest, InatClient, InatSettings, LocationFilter,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for plantkeep-inat
#[derive(Parser, Debug)]
#[command(name = "plantkeep-inat")]
#[command(about = "Import iNaturalist plant observations into a PlantKeep inventory")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "PLANTKEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the inventory file
    #[arg(long, global = true, env = "PLANTKEEP_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that an iNaturalist account exists
    VerifyUser { login: String },

    /// Search iNaturalist places by name
    Places { query: String },

    /// List observations available for import
    Candidates {
        #[command(flatten)]
        target: TargetArgs,

        /// Only show observations mentioning this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Import observations into the inventory
    Import {
        #[command(flatten)]
        target: TargetArgs,

        /// Observation ids to import (repeatable)
        #[arg(long = "select", num_args = 1.., conflicts_with = "all")]
        select: Vec<String>,

        /// Import every candidate
        #[arg(long)]
        all: bool,
    },

    /// Write a dated backup of the inventory
    Export {
        /// Directory for the backup file (defaults to the data folder)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Replace the inventory with the contents of a backup file
    Restore { file: PathBuf },
}

/// Whose observations, and where
#[derive(Args, Debug)]
struct TargetArgs {
    /// iNaturalist login (defaults to `user_login` from the config)
    #[arg(long)]
    user: Option<String>,

    /// iNaturalist place id
    #[arg(long, conflicts_with_all = ["lat", "lng"])]
    place_id: Option<u64>,

    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,

    /// Search radius in km (coordinates only)
    #[arg(long, default_value_t = 10.0)]
    radius: f64,
}

impl TargetArgs {
    fn user(&self, config: &TomlConfig) -> String {
        self.user
            .clone()
            .or_else(|| config.user_login.clone())
            .unwrap_or_default()
    }

    fn location(&self) -> Option<LocationFilter> {
        match (self.place_id, self.lat, self.lng) {
            (Some(id), _, _) => Some(LocationFilter::Place { id }),
            (None, Some(lat), Some(lng)) => Some(LocationFilter::Coordinates {
                lat,
                lng,
                radius_km: self.radius,
            }),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = load_toml_config(config_path.as_deref()).context("Failed to load config")?;
    init_tracing(&config.logging)?;

    match &config_path {
        Some(path) if path.exists() => info!(path = %path.display(), "Using config file"),
        Some(path) => warn!(path = %path.display(), "Config file not found, using defaults"),
        None => warn!("No config path available, using defaults"),
    }

    let data_folder = resolve_data_folder(cli.data_folder.as_deref(), &config);
    let store = InventoryStore::in_data_folder(&data_folder, config.require_location);
    info!(data_folder = %data_folder.display(), "Inventory location");

    match cli.command {
        Command::VerifyUser { login } => verify_user(&config, &login).await,
        Command::Places { query } => search_places(&config, &query).await,
        Command::Candidates { target, search } => {
            list_candidates(&config, &store, &target, search.as_deref().unwrap_or("")).await
        }
        Command::Import {
            target,
            select,
            all,
        } => run_import(&config, &store, &target, select, all).await,
        Command::Export { output_dir } => {
            export_inventory(&store, output_dir.as_deref().unwrap_or(&data_folder))
        }
        Command::Restore { file } => restore_inventory(&store, &file),
    }
}

/// Initialize tracing from `[logging]`; `RUST_LOG` takes precedence
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "plantkeep_inat={level},plantkeep_common={level}",
            level = logging.level
        ))
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn build_client(config: &TomlConfig) -> Result<(InatClient, InatSettings)> {
    let settings = InatSettings::resolve(config);
    let client = InatClient::new(&settings, get_user_agent())
        .context("Failed to create iNaturalist client")?;
    Ok((client, settings))
}

fn build_coordinator(config: &TomlConfig) -> Result<ImportCoordinator<InatClient>> {
    let (client, settings) = build_client(config)?;
    ImportCoordinator::with_catalog_file(client, config.catalog_path.as_deref(), &settings)
        .context("Failed to load reference catalog")
}

async fn verify_user(config: &TomlConfig, login: &str) -> Result<()> {
    let (client, _) = build_client(config)?;
    if client.verify_user(login).await? {
        println!("Connected: {}", login.trim());
        Ok(())
    } else {
        bail!("No iNaturalist account found for '{}'", login.trim())
    }
}

async fn search_places(config: &TomlConfig, query: &str) -> Result<()> {
    let (client, _) = build_client(config)?;
    let places = client.search_places(query).await?;
    if places.is_empty() {
        println!("No places found");
    }
    for place in places {
        println!("{:>10}  {}", place.id, place.display_name);
    }
    Ok(())
}

async fn list_candidates(
    config: &TomlConfig,
    store: &InventoryStore,
    target: &TargetArgs,
    search: &str,
) -> Result<()> {
    let inventory = store.load().context("Failed to load inventory")?;
    let coordinator = build_coordinator(config)?;
    let location = target.location();

    let all = coordinator
        .candidates(&target.user(config), location.as_ref(), &inventory)
        .await?;
    let candidates = filter_candidates(&all, search);

    for candidate in &candidates {
        let obs = &candidate.observation;
        let label = match &candidate.matched_plant {
            Some(plant) => format!("UPDATE {} ({})", plant.name, candidate.match_type),
            None => "NEW".to_string(),
        };
        println!(
            "{:>12}  {:<10}  {:<32}  {:<28}  {}",
            obs.id,
            obs.observed_on().unwrap_or("-"),
            obs.scientific_name().unwrap_or("-"),
            obs.species_guess().unwrap_or("-"),
            label
        );
    }
    if candidates.len() == all.len() {
        println!("{} candidate observation(s)", candidates.len());
    } else {
        println!("{} of {} candidate observation(s)", candidates.len(), all.len());
    }
    Ok(())
}

async fn run_import(
    config: &TomlConfig,
    store: &InventoryStore,
    target: &TargetArgs,
    select: Vec<String>,
    all: bool,
) -> Result<()> {
    let inventory = store.load().context("Failed to load inventory")?;
    let coordinator = build_coordinator(config)?;
    let user = target.user(config);
    let location = target.location();

    let selected: HashSet<String> = if all {
        coordinator
            .candidates(&user, location.as_ref(), &inventory)
            .await?
            .iter()
            .map(|c| c.id().to_string())
            .collect()
    } else {
        select.into_iter().collect()
    };

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling import");
            ctrl_c_token.cancel();
        }
    });

    let request = ImportRequest {
        user,
        location,
        inventory: inventory.clone(),
        selected,
    };
    let outcome = coordinator.import(request, &cancel).await?;

    for failure in &outcome.partial_failures {
        warn!(
            observation_id = %failure.observation_id,
            taxon_id = failure.taxon_id,
            reason = %failure.reason,
            "Imported without classification"
        );
    }

    let mut inventory = inventory;
    let summary = apply_import(&mut inventory, outcome.new_plants, outcome.updated_plants);
    store.save(&inventory).context("Failed to save inventory")?;

    println!(
        "Imported {} new plant(s), updated {} existing plant(s){}",
        summary.added,
        summary.updated,
        if outcome.cancelled { " (cancelled)" } else { "" }
    );
    if !outcome.partial_failures.is_empty() {
        println!(
            "{} plant(s) could not be classified and were imported unranked",
            outcome.partial_failures.len()
        );
    }
    Ok(())
}

fn export_inventory(store: &InventoryStore, output_dir: &Path) -> Result<()> {
    let inventory = store.load().context("Failed to load inventory")?;
    let today = chrono::Local::now().date_naive();
    let path = write_backup(&inventory, output_dir, today)?;
    println!("Backup written to {}", path.display());
    Ok(())
}

fn restore_inventory(store: &InventoryStore, file: &Path) -> Result<()> {
    let plants =
        read_backup(file).with_context(|| format!("Failed to read backup {}", file.display()))?;
    store.save(&plants).context("Failed to save inventory")?;
    println!("Restored {} plant(s) from {}", plants.len(), file.display());
    Ok(())
}
