use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use command_gateway::api::ApiServerBuilder;
use command_gateway::cache::QueryCache;
use command_gateway::intent::IntentClassifier;
use command_gateway::llm::{GeminiClient, LlmClient};
use command_gateway::parsing::RuleParser;
use command_gateway::rag::Retriever;
use command_gateway::scheduler::Job;
use command_gateway::telegram::{DisabledMessenger, Messenger, TelegramClient};
use command_gateway::{Assistant, Config, Scheduler, Services, db};

/// Command - Telegram personal assistant
#[derive(Parser)]
#[command(name = "command", version, about)]
struct Cli {
    /// Port to listen on (overrides `COMMAND_PORT`)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server and scheduler (default)
    Serve,
    /// List scheduled jobs with their next run
    Jobs,
    /// Run one job now and exit
    RunJob {
        /// Job name, e.g. `morning_briefing`
        name: String,
    },
    /// Classify a message without acting on it
    Classify {
        /// Message text
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "info,command_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Long-lived pieces shared by every command
struct Runtime {
    config: Config,
    pool: db::DbPool,
    services: Services,
    messenger: Arc<dyn Messenger>,
    telegram: Option<TelegramClient>,
}

fn build_runtime(config: Config) -> anyhow::Result<Runtime> {
    let pool = db::init(&config.server.db_path)?;
    tracing::info!(path = %config.server.db_path.display(), "database ready");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let cache = QueryCache::new(config.assistant.cache_ttl);
    let mut services = Services::new(
        pool.clone(),
        cache,
        config.assistant.clone(),
        Arc::new(RuleParser),
    );

    if let Some(key) = config.llm.api_key.clone() {
        let gemini = Arc::new(GeminiClient::new(
            http.clone(),
            key,
            &config.llm.model,
            &config.llm.embedding_model,
        ));
        let retriever = Retriever::new(
            gemini.clone(),
            services.embeddings.clone(),
            config.assistant.duplicate_threshold,
        );
        let llm: Arc<dyn LlmClient> = gemini;
        services = services.with_llm(llm).with_retriever(retriever);
        tracing::info!(model = %config.llm.model, "Gemini enabled");
    } else {
        tracing::warn!("GEMINI_API_KEY not set, using rule-based classification");
    }

    let telegram = config
        .telegram
        .bot_token
        .clone()
        .map(|token| TelegramClient::new(http, token));
    let messenger: Arc<dyn Messenger> = match &telegram {
        Some(client) => Arc::new(client.clone()),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set, outbound messages are dropped");
            Arc::new(DisabledMessenger)
        }
    };

    Ok(Runtime {
        config,
        pool,
        services,
        messenger,
        telegram,
    })
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");
    let rt = build_runtime(config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(rt, cli.port).await,
        Command::Jobs => list_jobs(&rt),
        Command::RunJob { name } => run_job(&rt, &name).await,
        Command::Classify { text } => classify(&rt, &text).await,
    }
}

async fn serve(rt: Runtime, port: Option<u16>) -> anyhow::Result<()> {
    let Runtime {
        config,
        pool,
        services,
        messenger,
        telegram,
    } = rt;

    if let (Some(client), Some(url)) = (&telegram, &config.telegram.webhook_url) {
        match client
            .set_webhook(url.as_str(), config.telegram.webhook_secret.as_deref())
            .await
        {
            Ok(()) => tracing::info!(url = %url, "webhook registered"),
            Err(e) => tracing::error!(error = %e, "failed to register webhook"),
        }
    }

    let scheduler = Scheduler::new(services.clone(), messenger.clone(), config.telegram.chat_id)?;
    if config.server.scheduler_enabled {
        scheduler.start().await;
    } else {
        tracing::info!("scheduler disabled");
    }

    let assistant = Arc::new(Assistant::new(services, messenger));
    let server = ApiServerBuilder::new(pool, assistant)
        .scheduler(scheduler.clone())
        .api_key(config.server.admin_api_key.clone())
        .webhook_secret(config.telegram.webhook_secret.clone())
        .rate_limit(config.server.rate_limit_rpm)
        .port(port.unwrap_or(config.server.port))
        .build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    scheduler.stop().await;
    Ok(())
}

fn job_runner(rt: &Runtime) -> command_gateway::Result<Scheduler> {
    Scheduler::new(
        rt.services.clone(),
        rt.messenger.clone(),
        rt.config.telegram.chat_id,
    )
}

fn list_jobs(rt: &Runtime) -> anyhow::Result<()> {
    let scheduler = job_runner(rt)?;
    for info in scheduler.triggers()? {
        let next = info
            .next_run
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        let last = info.last_run.map_or_else(
            || "never".to_string(),
            |r| format!("{} ({})", r.started_at.format("%Y-%m-%d %H:%M"), r.status),
        );
        println!("{:<22} {:<20} next {next}  last {last}", info.name, info.schedule);
    }
    Ok(())
}

async fn run_job(rt: &Runtime, name: &str) -> anyhow::Result<()> {
    let job: Job = name.parse()?;
    let scheduler = job_runner(rt)?;
    let outcome = scheduler.execute(job).await?;
    println!("{job}: {outcome:?}");
    Ok(())
}

async fn classify(rt: &Runtime, text: &str) -> anyhow::Result<()> {
    let classifier = IntentClassifier::new(rt.services.llm.clone(), rt.services.parser.clone());
    let result = classifier.classify(text, &[]).await;
    println!("intent:     {}", result.intent);
    println!("confidence: {:.2}", result.confidence);
    let mut entities: Vec<_> = result.entities.iter().collect();
    entities.sort();
    for (key, value) in entities {
        println!("  {key} = {value}");
    }
    Ok(())
}
