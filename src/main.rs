use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use change_submitter::App;
use change_submitter::Config;
use change_submitter::clients::github::GithubClient;
use change_submitter::config::DEFAULT_API_URL;
use change_submitter::server;
use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Parser)]
#[command(name = "change-submitter")]
#[command(about = "Turn submitted file edits into GitHub pull requests", long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:5000")]
    bind: String,

    /// GitHub token used for every API call
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// Owner of the target repository
    #[arg(long, env = "REPO_OWNER")]
    repo_owner: String,

    /// Name of the target repository
    #[arg(long, env = "REPO_NAME")]
    repo_name: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Branch that submission branches start from and PRs target
    #[arg(long, env = "BASE_BRANCH", default_value = "main")]
    base_branch: String,

    /// Branch prefix for submissions that don't name one
    #[arg(long, env = "BRANCH_PREFIX", default_value = "changes")]
    branch_prefix: String,

    /// Origin allowed to call the API from a browser (any origin if unset)
    #[arg(long, env = "ALLOWED_ORIGIN")]
    allowed_origin: Option<String>,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::new(
            self.github_token.clone(),
            self.repo_owner.clone(),
            self.repo_name.clone(),
        );
        config.api_url = self.api_url.clone();
        config.base_branch = self.base_branch.clone();
        config.default_branch_prefix = self.branch_prefix.clone();
        config
    }
}

fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let cli = Cli::parse();
    let config = cli.config();
    info!(?config, "loaded config");

    let cors = server::cors_layer(cli.allowed_origin.as_deref())?;
    let gh = GithubClient::new(&config);
    let app = Arc::new(App::new(config, gh));
    let router = server::router(app, cors);

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
