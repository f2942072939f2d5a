// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - mediates between a social-messaging platform and a local
//! application.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_config::CourierConfig;

#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gateway and the refresh scheduler.
    Serve,
    /// Exchange an authorization code for a stored long-lived credential.
    Exchange { code: String },
    /// Send one message on behalf of a subject.
    Send {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        recipient: String,
        /// Reuse a key to make retries of this command safe.
        #[arg(long)]
        key: Option<String>,
        text: String,
    },
    /// List stored credentials (tokens are never printed).
    Credentials {
        /// Only credentials in this refresh state, e.g. refresh_failed.
        #[arg(long)]
        state: Option<String>,
    },
    /// Delete a subject's credential.
    Revoke { subject: String },
    /// Query a running server's health endpoint.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and report every problem found.
    Check,
    /// Print a fresh hex key for storage.token_encryption_key.
    Keygen,
}

fn load_config(path: Option<&PathBuf>) -> CourierConfig {
    let result = match path {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Config {
        action: ConfigCommand::Keygen,
    } = &cli.command
    {
        match courier_storage::TokenCipher::generate() {
            Ok(cipher) => println!("{}", cipher.to_hex()),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Exchange { code } => commands::exchange(&config, &code).await,
        Commands::Send {
            subject,
            recipient,
            key,
            text,
        } => commands::send(&config, subject, recipient, key, text).await,
        Commands::Credentials { state } => commands::list_credentials(&config, state).await,
        Commands::Revoke { subject } => commands::revoke(&config, &subject).await,
        Commands::Status { json } => status::run_status(&config, json).await,
        Commands::Config {
            action: ConfigCommand::Check,
        } => {
            eprintln!("courier: configuration is valid");
            Ok(())
        }
        Commands::Config {
            action: ConfigCommand::Keygen,
        } => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn defaults_validate() {
        let config = courier_config::load_and_validate_str("").expect("defaults should be valid");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn cli_parses_send() {
        let cli = Cli::try_parse_from([
            "courier", "send", "--subject", "alice", "--recipient", "bob", "--key", "k-1", "hello",
        ])
        .unwrap();
        match cli.command {
            Commands::Send { subject, key, text, .. } => {
                assert_eq!(subject, "alice");
                assert_eq!(key.as_deref(), Some("k-1"));
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
