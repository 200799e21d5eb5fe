//! CLI interface for kbase.
//!
//! Provides command-line argument parsing using clap.

use clap::{Parser, Subcommand};

/// Command-line interface for kbase.
#[derive(Parser)]
#[command(name = "kbase")]
#[command(author, version, about = "Pluggable knowledge-base layer with fan-out search", long_about = None)]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Search one knowledge base, or fan out across all enabled ones.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return (defaults to the configured
        /// `search.default_top_k`).
        #[arg(short = 'n', long)]
        top_k: Option<usize>,

        /// Restrict the search to one knowledge base.
        #[arg(long)]
        kb: Option<String>,

        /// Filter candidates to this category (single knowledge base only).
        #[arg(short, long, requires = "kb")]
        category: Option<String>,

        /// Comma-separated tag filter (single knowledge base only).
        #[arg(short = 'T', long, requires = "kb")]
        tags: Option<String>,
    },

    /// List items in a knowledge base.
    List {
        /// Knowledge base to list.
        #[arg(long)]
        kb: String,

        /// Filter results to this category only.
        #[arg(short, long)]
        category: Option<String>,

        /// Comma-separated tag filter.
        #[arg(short = 'T', long)]
        tags: Option<String>,
    },

    /// Add an item to a knowledge base (content from --file or stdin).
    Add {
        /// Knowledge base to add into.
        #[arg(long)]
        kb: String,

        /// Unique item id.
        #[arg(short, long)]
        id: String,

        /// Optional human-readable title.
        #[arg(short, long)]
        title: Option<String>,

        /// Optional category for grouping.
        #[arg(short = 'C', long)]
        category: Option<String>,

        /// Comma-separated tags.
        #[arg(short = 'T', long)]
        tags: Option<String>,

        /// Read content from file instead of stdin.
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Print the content of an item by id.
    Get {
        /// Knowledge base to read from.
        kb: String,

        /// Item id.
        id: String,
    },

    /// Delete an item by id.
    Delete {
        /// Knowledge base to delete from.
        kb: String,

        /// Item id.
        id: String,
    },

    /// Show every registered knowledge base with its stats.
    Summary,
}
