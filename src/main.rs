//! Application entry point for cita-bot.
//!
//! Initializes all components and starts the Telegram bot.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use cita_bot::bot::Bot;
use cita_bot::config::Config;
use cita_bot::dispatch::Dispatcher;
use cita_bot::dispatch::Messenger;
use cita_bot::dispatch::telegram::TelegramApi;
use cita_bot::logging::setup_logging;
use cita_bot::monitor::SlotMonitor;
use cita_bot::probe::PageProber;
use cita_bot::probe::Prober;
use cita_bot::probe::classifier::SlotClassifier;
use cita_bot::probe::webdriver::WebDriverClient;
use cita_bot::repository::Repository;
use cita_bot::service::subscription_service::SubscriptionService;
use dotenv::dotenv;
use log::debug;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let init_start = Instant::now();
    let config = load_config().await?;

    let db = setup_database(&config, init_start).await?;

    let api = Arc::new(TelegramApi::new(&config.bot_token));
    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        api.clone() as Arc<dyn Messenger>,
    ));

    let monitor = setup_monitor(&config, db.clone(), dispatcher.clone(), init_start).await?;
    let bot = setup_bot(&config, db, api, monitor.clone(), dispatcher, init_start)?;

    run(init_start).await?;

    bot.stop();
    monitor.shutdown().await;
    Ok(())
}

async fn load_config() -> Result<Arc<Config>> {
    debug!("Loading configuration...");
    let config = Config::new()?;
    config.ensure_dirs()?;
    let config = Arc::new(config);
    setup_logging(&config.logs_path)?;
    info!("Starting cita-bot...");
    Ok(config)
}

async fn setup_database(config: &Config, init_start: Instant) -> Result<Arc<Repository>> {
    debug!("Setting up Repository...");
    let db = Arc::new(Repository::new(&config.db_url, &config.db_path).await?);

    info!("Initializing database schema...");
    db.init_schema().await?;
    info!(
        "Database setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    Ok(db)
}

async fn setup_monitor(
    config: &Config,
    db: Arc<Repository>,
    dispatcher: Arc<Dispatcher>,
    init_start: Instant,
) -> Result<Arc<SlotMonitor>> {
    debug!("Setting up SlotMonitor...");

    let driver = WebDriverClient::new(&config.webdriver_url);
    let prober = Arc::new(PageProber::new(
        driver,
        SlotClassifier::new(),
        &config.target_url,
        config.screenshot_path(),
        config.screenshot_on_slots,
        config.probe_timeout,
    )) as Arc<dyn Prober>;

    let monitor = SlotMonitor::new(
        db,
        prober,
        dispatcher,
        &config.target_url,
        config.default_interval,
    )
    .await?;

    if monitor.restore().await {
        info!("Monitoring resumed from saved state.");
    }

    info!(
        "Monitor setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    Ok(monitor)
}

fn setup_bot(
    config: &Config,
    db: Arc<Repository>,
    api: Arc<TelegramApi>,
    monitor: Arc<SlotMonitor>,
    dispatcher: Arc<Dispatcher>,
    init_start: Instant,
) -> Result<Arc<Bot>> {
    info!("Starting bot...");

    let subscriptions = Arc::new(SubscriptionService::new(db, config.admin_ids.clone()));
    let bot = Bot::new(api, monitor, dispatcher, subscriptions);
    bot.start();

    info!(
        "Bot setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    Ok(bot)
}

async fn run(init_start: Instant) -> Result<()> {
    info!(
        "cita-bot is up in {:.2}s. Press Ctrl+C to stop.",
        init_start.elapsed().as_secs_f64()
    );

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down.");

    Ok(())
}
