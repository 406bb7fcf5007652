// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use thurmbox::config::Settings;
use thurmbox::samples::{waveform, SampleLoader};
use thurmbox::storage::LocalStorage;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Sample and storage tools for Thurmbox."
)]
struct Cli {
    /// The path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints the URL and format a sample name resolves to.
    Resolve {
        /// The name of the sample.
        name: String,
    },
    /// Loads a sample and prints a summary of its waveform.
    Load {
        /// The name of the sample.
        name: String,
    },
    /// Prints the value stored under a key.
    Get {
        /// The key to read.
        key: String,
    },
    /// Stores a value under a key.
    Set {
        /// The key to write.
        key: String,
        /// The value to store.
        value: String,
    },
    /// Removes a key.
    Remove {
        /// The key to remove.
        key: String,
    },
    /// Removes every key in the configured namespace.
    Clear {},
    /// Lists every key in the configured namespace.
    Keys {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve { name } => {
            let definition = SampleLoader::from_config(settings.samples())?.resolve(&name);
            println!("{} ({})", definition.url(), definition.format());
        }
        Commands::Load { name } => {
            let sample = SampleLoader::from_config(settings.samples())?
                .load(&name)
                .await?;
            let values = &sample.raw()[..sample.raw().len() - waveform::RESERVED_TAIL];
            let peak = values.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));

            println!("{}: {}", sample.name(), sample.definition().url());
            println!("- samples: {}", values.len());
            println!("- peak: {:.4}", peak);
            println!("- mean: {:.4}", waveform::mean(values));
        }
        Commands::Get { key } => {
            let storage = LocalStorage::from_config(settings.storage()).await;
            match storage.get_item(&key) {
                Some(value) => println!("{}", value),
                None => println!("{} is not set.", key),
            }
        }
        Commands::Set { key, value } => {
            let storage = LocalStorage::from_config(settings.storage()).await;
            storage.set_item(&key, &value);
            storage.flush().await;
        }
        Commands::Remove { key } => {
            let storage = LocalStorage::from_config(settings.storage()).await;
            storage.remove_item(&key);
            storage.flush().await;
        }
        Commands::Clear {} => {
            let storage = LocalStorage::from_config(settings.storage()).await;
            storage.clear();
            storage.flush().await;
        }
        Commands::Keys {} => {
            let storage = LocalStorage::from_config(settings.storage()).await;
            if storage.is_empty() {
                println!("No keys in {}.", storage.namespace());
                return Ok(());
            }

            println!("Keys (count: {}):", storage.len());
            for index in 0..storage.len() {
                if let Some(key) = storage.key(index) {
                    println!("- {}", key);
                }
            }
        }
    }

    Ok(())
}
