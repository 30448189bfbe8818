use std::{path::Path, sync::Arc, time::Duration};

use clap::Parser;
use purger::{
    commands::{CommandSurface, command_definitions},
    config::PurgerConfig,
    interactions::{self, InteractionState, SignatureVerifier},
    observability,
    platform::{
        BotIdentity, GuildId, Permissions, Platform,
        discord::{DiscordClient, DiscordPlatform, invite_url},
    },
    purge::PurgeExecutor,
    scheduler::{Schedule, Scheduler},
    store::ConfigStore,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "purger.toml";

/// How long shutdown waits for in-flight purges and deferred replies.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// CLI arguments for the purge service
#[derive(Parser, Debug)]
#[command(version, about = "Scheduled Discord channel purger", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./purger.toml if it exists,
    /// otherwise the configuration is read from the environment)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Serve the interactions endpoint and run the scheduler (default)
    Serve,
    /// Purge every configured channel of every guild once and exit
    RunOnce,
    /// Print the bot invite URL
    Invite,
    /// Validate the configuration and print the schedule
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config_path = args.config.as_deref();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config_path).await,
        Command::RunOnce => run_once(config_path).await,
        Command::Invite => run_invite(config_path).await,
        Command::CheckConfig => run_check_config(config_path),
    }
}

fn load_config(explicit_path: Option<&str>) -> PurgerConfig {
    let result = match explicit_path {
        Some(path) => PurgerConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            PurgerConfig::from_file(DEFAULT_CONFIG_FILE)
        }
        None => PurgerConfig::from_env(),
    };

    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

fn init_observability(config: &PurgerConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn build_schedule(config: &PurgerConfig) -> Schedule {
    match Schedule::from_config(&config.schedule) {
        Ok(schedule) => schedule,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn build_client(config: &PurgerConfig) -> DiscordClient {
    match DiscordClient::new(&config.discord) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build platform client");
            std::process::exit(1);
        }
    }
}

/// The long-lived pieces shared by the scheduler and the command surface.
struct Services {
    store: Arc<ConfigStore>,
    scheduler: Arc<Scheduler>,
    surface: Arc<CommandSurface>,
}

fn build_services(config: &PurgerConfig, client: &DiscordClient, identity: BotIdentity) -> Services {
    let platform: Arc<dyn Platform> = Arc::new(DiscordPlatform::new(client.clone()));
    let store = Arc::new(ConfigStore::load(&config.store.path));
    let executor = PurgeExecutor::new(config.purge.clone(), identity.user_id);
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&platform),
        Arc::clone(&store),
        executor.clone(),
        build_schedule(config),
    ));
    let surface = Arc::new(CommandSurface::new(
        platform,
        Arc::clone(&store),
        executor,
        Arc::clone(&scheduler),
        identity,
        Permissions::from_bits(config.discord.permissions),
        config.commands.clone(),
    ));

    Services {
        store,
        scheduler,
        surface,
    }
}

async fn sync_commands(config: &PurgerConfig, client: &DiscordClient, identity: &BotIdentity) {
    let guild = config.discord.command_guild_id.map(GuildId);
    let definitions = command_definitions(config.commands.max_select_channels);
    match client
        .overwrite_commands(identity.application_id, guild, &definitions)
        .await
    {
        Ok(count) => tracing::info!(count, guild = ?guild, "Slash commands registered"),
        Err(e) => tracing::warn!(error = %e, "Failed to register slash commands"),
    }
}

async fn run_server(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);
    init_observability(&config);

    let Some(public_key) = config.discord.public_key.as_deref() else {
        tracing::error!("discord.public_key is required to serve interactions");
        std::process::exit(1);
    };
    let verifier = match SignatureVerifier::from_hex(public_key) {
        Ok(verifier) => Arc::new(verifier),
        Err(e) => {
            tracing::error!(error = %e, "Invalid interactions public key");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            cancel.cancel();
        });
    }

    let client = build_client(&config);
    let identity = match client.wait_until_ready(&cancel).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            tracing::info!("Shut down before the platform became ready");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "Platform rejected the bot credentials");
            std::process::exit(1);
        }
    };
    tracing::info!(
        user_id = %identity.user_id,
        application_id = %identity.application_id,
        username = %identity.username,
        "Platform ready"
    );

    if config.discord.sync_commands {
        sync_commands(&config, &client, &identity).await;
    }

    let services = build_services(&config, &client, identity);
    tracing::info!(
        store = %services.store.path().display(),
        guilds = services.store.guild_ids().len(),
        "Channel store loaded"
    );

    if config.schedule.enabled {
        services.scheduler.start(&tracker, cancel.clone());
    } else {
        tracing::info!("Scheduler disabled; only manual purges will run");
    }

    let state = InteractionState {
        verifier,
        surface: services.surface,
        client,
        tracker: tracker.clone(),
    };
    let app = interactions::router(state, config.server.body_limit_bytes);

    let bind_addr = config.server.socket_addr();
    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %bind_addr, "Failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!("Interactions endpoint listening on http://{bind_addr}/interactions");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    cancel.cancel();
    tracker.close();
    match tokio::time::timeout(SHUTDOWN_GRACE, tracker.wait()).await {
        Ok(()) => tracing::info!("All background tasks completed"),
        Err(_) => {
            tracing::warn!("Timeout waiting for background tasks, some may not have completed")
        }
    }
    tracing::info!("Shutdown complete");
}

async fn run_once(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);
    init_observability(&config);

    let client = build_client(&config);
    let identity = match client.identify().await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!(error = %e, "Failed to identify the bot");
            std::process::exit(1);
        }
    };

    let services = build_services(&config, &client, identity);
    let report = services.scheduler.run_cycle().await;
    println!(
        "Purged {} channel(s) in {} guild(s): {} message(s) deleted, {} failure(s).",
        report.channels, report.guilds, report.deleted, report.failures
    );
    if report.failures > 0 {
        std::process::exit(2);
    }
}

async fn run_invite(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);
    init_observability(&config);

    let client = build_client(&config);
    match client.identify().await {
        Ok(identity) => println!(
            "{}",
            invite_url(
                identity.application_id,
                Permissions::from_bits(config.discord.permissions)
            )
        ),
        Err(e) => {
            eprintln!("Failed to identify the bot: {e}");
            std::process::exit(1);
        }
    }
}

fn run_check_config(explicit_config_path: Option<&str>) {
    let config = load_config(explicit_config_path);
    let schedule = build_schedule(&config);

    println!("Configuration OK");
    println!("  store: {}", config.store.path.display());
    println!("  listen: {}", config.server.socket_addr());
    println!(
        "  interactions: {}",
        if config.discord.public_key.is_some() {
            "enabled"
        } else {
            "disabled (no discord.public_key)"
        }
    );
    if !config.schedule.enabled {
        println!("  schedule: disabled");
        return;
    }
    match schedule.next_anchor(chrono::Utc::now()) {
        Some(at) => println!(
            "  schedule: next run {} ({}), then every {}h",
            at.format("%Y-%m-%d %H:%M"),
            config.schedule.timezone,
            config.schedule.interval_hours
        ),
        None => println!("  schedule: no upcoming anchor"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
