use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(name = "codeforge", version, about = "CodeForge JSON-UI CLI")]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Structured JSON logs on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Store root directory (default: .codeforge)
    #[arg(long, global = true, default_value = ".codeforge")]
    pub store_root: PathBuf,

    /// Storage backend for `kv` data sources and `storage` commands.
    #[arg(long, global = true, value_enum, default_value_t = Backend::Sqlite)]
    pub backend: Backend,

    /// Base URL of a codeforge-api service (with `--backend remote`).
    #[arg(long, global = true)]
    pub remote_url: Option<String>,

    /// Engine config JSON file (limits, render options).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Sqlite,
    Fs,
    Remote,
    Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    Html,
    Json,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compile a page schema and print its diagnostics.
    Validate {
        /// Page schema path, URL, or `-` for stdin.
        input: String,
    },

    /// Mount a page and print the rendered output.
    Render {
        input: String,
        #[arg(long, value_enum, default_value_t = RenderFormat::Html)]
        format: RenderFormat,
    },

    /// Fire an event on a mounted page and print the resulting state.
    Fire {
        input: String,
        /// Component id.
        #[arg(long)]
        node: String,
        /// Event name, e.g. onClick.
        #[arg(long)]
        event: String,
        /// Event payload as JSON.
        #[arg(long)]
        payload: Option<String>,
        #[arg(long, default_value_t = 1)]
        times: u32,
    },

    /// List registered components.
    Components,

    /// Inspect and edit the key-value store.
    Storage {
        #[command(subcommand)]
        command: StorageCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum StorageCommand {
    Keys,
    Get {
        key: String,
    },
    /// VALUE is parsed as JSON, falling back to a plain string.
    Set {
        key: String,
        value: String,
    },
    Delete {
        key: String,
    },
    Clear,
    Export {
        /// Write to a file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Upsert every entry of a JSON object file.
    Import {
        input: String,
    },
    Stats,
}
