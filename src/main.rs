//! # dioe-tei CLI (`dtei`)
//!
//! The `dtei` binary reads an annotation store and prints the resolved
//! structures as JSON on stdout. Logs go to stderr and are filtered with
//! `RUST_LOG` (default `dioe_tei=info`).
//!
//! ## Usage
//!
//! ```bash
//! dtei --config ./config/dtei.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dtei init` | Create the mirror schema |
//! | `dtei informants <ID>...` | Informant metadata |
//! | `dtei timeline <TRANSCRIPT>` | Tokens in reading order |
//! | `dtei answers <TOKEN>...` | Answers attached to tokens |
//! | `dtei tokenset-answers <SET>...` | Token-set tags per member token |
//! | `dtei tags` | Tag catalog or tree |
//! | `dtei export <TRANSCRIPT>` | Write the JSON bundle for one transcript |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dioe_tei::answers::{self, ResolveOptions};
use dioe_tei::{config, export, informants, migrate, tags, timeline, tokensets};

/// dioe-tei CLI: resolve transcript annotations for TEI export.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "dtei",
    about = "dioe-tei: resolve transcript annotations for TEI export",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dtei.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by the answer commands.
#[derive(clap::Args)]
struct ResolveFlags {
    /// Report integrity issues alongside the result instead of failing.
    #[arg(long)]
    lenient: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the mirror schema.
    ///
    /// Idempotent; running it against an initialized database is safe.
    Init,

    /// Print informant metadata for the given ids.
    Informants {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Print the tokens of a transcript in reading order.
    Timeline {
        transcript_id: i64,

        /// Group tokens into speaker turns.
        #[arg(long)]
        utterances: bool,
    },

    /// Print the answers attached to the given tokens.
    Answers {
        #[arg(required = true)]
        token_ids: Vec<i64>,

        /// Leave out tokens that have no answers.
        #[arg(long)]
        omit_empty: bool,

        #[command(flatten)]
        flags: ResolveFlags,
    },

    /// Print token-set tags projected onto member tokens.
    TokensetAnswers {
        #[arg(required = true)]
        set_ids: Vec<i64>,

        #[command(flatten)]
        flags: ResolveFlags,
    },

    /// Print the tag catalog.
    Tags {
        /// Expand into the tag family tree.
        #[arg(long)]
        tree: bool,
    },

    /// Export one transcript as a JSON bundle.
    Export {
        transcript_id: i64,

        /// Output directory. Defaults to `[export].output_dir`.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dioe_tei=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = match cli.command {
        // init can bootstrap a local mirror before any config file exists
        Commands::Init if !cli.config.exists() => config::Config::minimal(),
        _ => config::load_config(&cli.config)?,
    };
    let base = ResolveOptions::from(&cfg.resolve);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Informants { ids } => {
            informants::run_informants(&cfg, &ids).await?;
        }
        Commands::Timeline {
            transcript_id,
            utterances,
        } => {
            timeline::run_timeline(&cfg, transcript_id, utterances).await?;
        }
        Commands::Answers {
            token_ids,
            omit_empty,
            flags,
        } => {
            let opts = ResolveOptions {
                include_empty: base.include_empty && !omit_empty,
                strict: base.strict && !flags.lenient,
            };
            answers::run_answers(&cfg, &token_ids, &opts).await?;
        }
        Commands::TokensetAnswers { set_ids, flags } => {
            let opts = ResolveOptions {
                strict: base.strict && !flags.lenient,
                ..base
            };
            tokensets::run_tokenset_answers(&cfg, &set_ids, &opts).await?;
        }
        Commands::Tags { tree } => {
            tags::run_tags(&cfg, tree).await?;
        }
        Commands::Export { transcript_id, out } => {
            export::run_export(&cfg, transcript_id, out.as_deref()).await?;
        }
    }

    Ok(())
}
