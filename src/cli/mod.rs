// Pwvault - CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, resources, list, add, remove-resource,
// remove-credential, verify.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{execute, run};

use crate::config::{DB_ENV, PASSPHRASE_ENV};
use crate::store::DEFAULT_KIND;

/// Pwvault: a local, passphrase-encrypted credential vault.
#[derive(Parser)]
#[command(name = "pwvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the vault database file.
    #[arg(long, global = true, env = DB_ENV)]
    pub db: Option<PathBuf>,

    /// Passphrase the vault key is derived from.
    #[arg(long, global = true, env = PASSPHRASE_ENV, hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Print results as JSON instead of a table.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the vault tables (safe to run again).
    Init,

    /// List resources. Needs no passphrase.
    Resources,

    /// List credentials with decrypted secrets, optionally for one resource.
    List {
        /// Resource id or exact name.
        resource: Option<String>,
    },

    /// Add a credential, creating the resource if the name is new.
    Add {
        /// Resource id or name (names are created on first use).
        resource: String,

        username: String,

        /// The secret to encrypt. Beware shell history.
        secret: String,

        /// Free-form credential kind.
        #[arg(long, default_value = DEFAULT_KIND)]
        kind: String,
    },

    /// Delete a resource and every credential attached to it.
    RemoveResource {
        id: i64,
    },

    /// Delete a single credential.
    RemoveCredential {
        id: i64,
    },

    /// Check the vault for orphaned credentials.
    Verify,
}
