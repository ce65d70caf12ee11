//! netd network CLI (netctl)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use netctl::commands::{EditCommand, OutputFormat, ShowCommand};
use netctl::config::DaemonConfig;
use netctl::context::CliContext;

#[derive(Parser)]
#[command(name = "netctl")]
#[command(about = "netd network management CLI")]
#[command(version)]
#[command(long_about = "
netd network management CLI

Manages the networks of a netd node. Updates are propagated to the other
cluster members unless restricted to a single node with --target.
Configuration is read from /etc/netd/netd.toml and NETD_* environment
variables.

Examples:
  netctl list                                      # List networks
  netctl show lxdbr0 --format json                 # Show one network as JSON
  netctl create lxdbr0 ipv4.address=10.0.0.1/24    # Create a bridge
  netctl create mv0 -t macvlan parent=eth0         # Create a macvlan network
  netctl set lxdbr0 ipv4.dhcp.ranges=10.0.0.10-10.0.0.50
  netctl set lxdbr0 --unset ipv6.address           # Remove a key
  netctl set lxdbr0 parent=eth1 --target node2     # Change one member only
  netctl rename lxdbr0 lxdbr1                      # Rename an unused network
  netctl delete lxdbr1                             # Delete an unused network
  netctl used lxdbr0                               # Check for references
")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List networks
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show a network
    Show {
        /// Network name
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Create a network
    Create {
        /// Network name
        name: String,

        /// Config entries as key=value
        entries: Vec<String>,

        /// Network type
        #[arg(short = 't', long = "type", default_value = "bridge")]
        driver: String,

        /// Description
        #[arg(long)]
        description: Option<String>,
    },

    /// Change network config
    Set {
        /// Network name
        name: String,

        /// Config entries as key=value
        entries: Vec<String>,

        /// Config keys to remove
        #[arg(long)]
        unset: Vec<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Apply on this cluster member only
        #[arg(long)]
        target: Option<String>,
    },

    /// Rename a network
    Rename {
        /// Current name
        name: String,

        /// New name
        new_name: String,
    },

    /// Delete a network
    Delete {
        /// Network name
        name: String,
    },

    /// Check whether a network is referenced
    Used {
        /// Network name
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<DaemonConfig> {
    let config = match path {
        Some(path) => DaemonConfig::load_from_file(path)?,
        None => DaemonConfig::load_with_defaults()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        verbose,
        debug,
        quiet,
        config,
        command,
    } = Cli::parse();

    // Initialize logging
    let log_level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let result = async move {
        let config = load_config(config.as_ref())?;
        let context = CliContext::bootstrap(config).await?;

        match command {
            Commands::List { format } => ShowCommand::new(context).list(format).await,
            Commands::Show { name, format } => ShowCommand::new(context).show(&name, format).await,
            Commands::Used { name, format } => ShowCommand::new(context).used(&name, format).await,
            Commands::Create {
                name,
                entries,
                driver,
                description,
            } => {
                EditCommand::new(context)
                    .create(&name, &driver, description, &entries)
                    .await
            }
            Commands::Set {
                name,
                entries,
                unset,
                description,
                target,
            } => {
                EditCommand::new(context)
                    .set(&name, &entries, &unset, description, target.as_deref())
                    .await
            }
            Commands::Rename { name, new_name } => {
                EditCommand::new(context).rename(&name, &new_name).await
            }
            Commands::Delete { name } => EditCommand::new(context).delete(&name).await,
        }
    }
    .await;

    // Handle errors with appropriate exit codes
    match result {
        Ok(output) => {
            if !quiet {
                println!("{}", output);
            }
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);

            // Print error chain if in verbose mode
            if verbose || debug {
                for cause in e.chain().skip(1) {
                    eprintln!("  Caused by: {}", cause);
                }
            }
            std::process::exit(1);
        }
    }
}
