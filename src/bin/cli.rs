//! PromoPilot CLI
//!
//! Local entry point for creating campaigns and running pipeline stages
//! against a JSON-file store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use promopilot::{
    actions::{Actions, CreateCampaignRequest, RunRequest},
    error::Result,
    models::{Config, PostingAccount, RunSettings},
    pipeline::Services,
    rate_limit::RateLimiter,
    store::{LocalStore, Store},
};

/// PromoPilot - comment outreach automation
#[derive(Parser, Debug)]
#[command(name = "promopilot", version, about = "Comment outreach automation")]
struct Cli {
    /// Path to the storage directory containing config and data files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new campaign
    Create {
        /// URL the generated backlinks point at
        #[arg(long)]
        target_url: String,

        /// Primary keyword driving discovery and content
        #[arg(long)]
        keyword: String,

        /// Visible text of the injected hyperlink
        #[arg(long)]
        anchor_text: String,

        /// Desired posting volume
        #[arg(long, default_value_t = 10)]
        desired_posts: usize,
    },

    /// Run the full pipeline for a campaign
    Run {
        campaign_id: String,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Discover candidate targets for a campaign
    Discover {
        campaign_id: String,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Detect comment forms on a campaign's pending targets
    Detect {
        campaign_id: String,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Post comments through a campaign's vetted forms
    Post {
        campaign_id: String,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Show campaign counters and the latest job
    Status { campaign_id: String },

    /// Show everything a campaign has produced
    Results { campaign_id: String },

    /// Register a posting identity
    AddAccount {
        #[arg(long)]
        display_name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        website: Option<String>,
    },

    /// List all campaigns
    List,

    /// Validate the configuration file
    Validate,
}

/// Run options shared by the stage subcommands.
#[derive(Args, Debug)]
struct RunFlags {
    /// Cap on discovered targets
    #[arg(long)]
    max_targets: Option<usize>,

    /// Cap on posts this run
    #[arg(long)]
    max_posts: Option<usize>,

    /// Build payloads but skip the actual submission
    #[arg(long)]
    dry_run: bool,

    /// Stop after detection instead of auto-posting
    #[arg(long)]
    no_auto_post: bool,

    /// Skip robots.txt checks
    #[arg(long)]
    ignore_robots: bool,

    /// Fetch pages through the rendering service
    #[arg(long)]
    js_rendering: bool,

    /// Override the vetting promotion threshold
    #[arg(long)]
    min_confidence: Option<i32>,

    /// Override the inter-request delay in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

impl RunFlags {
    fn into_settings(self) -> RunSettings {
        RunSettings {
            max_targets: self.max_targets,
            max_posts: self.max_posts,
            auto_post: !self.no_auto_post,
            dry_run: self.dry_run,
            respect_robots_txt: !self.ignore_robots,
            rate_limit_delay: self.delay_ms,
            min_confidence_score: self.min_confidence,
            enable_js_rendering: self.js_rendering,
        }
    }
}

/// Caller identifier used for the CLI's own quota bucket.
const CALLER: &str = "cli";

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Arc::new(Config::load_or_default(&config_path));

    if let Command::Validate = cli.command {
        config.validate()?;
        log::info!("Configuration OK");
        return Ok(());
    }

    let store: Arc<dyn Store> = Arc::new(LocalStore::new(&cli.storage_dir));
    let services = Services::from_config(config.clone())?;
    let limiter = RateLimiter::new(
        config.rate_limit.quota,
        Duration::from_secs(config.rate_limit.window_secs),
    );
    let actions = Actions::new(services, store.clone(), limiter);

    match cli.command {
        Command::Create {
            target_url,
            keyword,
            anchor_text,
            desired_posts,
        } => {
            let campaign = actions
                .create_campaign(
                    CALLER,
                    CreateCampaignRequest {
                        target_url,
                        keyword,
                        anchor_text,
                        desired_posts,
                    },
                )
                .await?;
            print_json(&campaign)?;
        }

        Command::Run { campaign_id, flags } => {
            let response = actions
                .start_campaign(
                    CALLER,
                    RunRequest {
                        campaign_id,
                        settings: flags.into_settings(),
                    },
                )
                .await?;
            print_json(&response)?;
        }

        Command::Discover { campaign_id, flags } => {
            let response = actions
                .discover(
                    CALLER,
                    RunRequest {
                        campaign_id,
                        settings: flags.into_settings(),
                    },
                )
                .await?;
            print_json(&response)?;
        }

        Command::Detect { campaign_id, flags } => {
            let response = actions
                .detect_forms(
                    CALLER,
                    RunRequest {
                        campaign_id,
                        settings: flags.into_settings(),
                    },
                )
                .await?;
            print_json(&response)?;
        }

        Command::Post { campaign_id, flags } => {
            let response = actions
                .post_comments(
                    CALLER,
                    RunRequest {
                        campaign_id,
                        settings: flags.into_settings(),
                    },
                )
                .await?;
            print_json(&response)?;
        }

        Command::Status { campaign_id } => {
            let status = actions.get_status(CALLER, &campaign_id).await?;
            print_json(&status)?;
        }

        Command::Results { campaign_id } => {
            let results = actions.get_results(CALLER, &campaign_id).await?;
            print_json(&results)?;
        }

        Command::AddAccount {
            display_name,
            email,
            website,
        } => {
            let id = store.allocate_id("acct").await?;
            let mut account = PostingAccount::new(id, display_name, email);
            account.website = website;
            store.add_account(&account).await?;
            print_json(&account)?;
        }

        Command::List => {
            let campaigns = store.list_campaigns().await?;
            print_json(&campaigns)?;
        }

        Command::Validate => unreachable!("handled above"),
    }

    Ok(())
}
