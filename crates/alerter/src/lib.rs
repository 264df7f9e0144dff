pub mod arguments;
pub mod chain;
pub mod config;
pub mod expiry;
pub mod ingestor;
pub mod missed_takes;
pub mod notify;
pub mod registry;
pub mod shutdown;
pub mod store;

use {
    crate::{
        chain::OnchainReader,
        expiry::ExpirySweeper,
        ingestor::EventIngestor,
        missed_takes::MissedTakeSweeper,
        notify::{AlertFormatter, LogNotifier, Notifier, TelegramNotifier},
        registry::AuctionRegistry,
        store::Store,
    },
    alloy::providers::Provider,
    anyhow::{Context, Result},
    std::sync::Arc,
};

pub async fn start(args: arguments::Arguments) {
    if let Err(err) = run(args).await {
        tracing::error!(?err, "alerter terminated");
        std::process::exit(1);
    }
    std::process::exit(0);
}

async fn run(args: arguments::Arguments) -> Result<()> {
    let provider = ethrpc::provider(&args.node_url);
    let chain_id = provider
        .get_chain_id()
        .await
        .context("could not fetch chain id")?;
    let network = config::for_chain(chain_id)
        .with_context(|| format!("no auction factories configured for chain {chain_id}"))?;
    tracing::info!(network = network.label, chain_id, "starting auction alerter");

    let chain: Arc<dyn chain::AuctionChain> = Arc::new(OnchainReader::new(provider));
    let store = Arc::new(Store::load(&args.state_file)?);
    let notifier: Arc<dyn Notifier> = if args.dry_run {
        Arc::new(LogNotifier)
    } else {
        let token = args
            .telegram_bot_token
            .as_deref()
            .context("--telegram-bot-token is required unless --dry-run is set")?;
        let chat_id = args
            .telegram_chat_id
            .clone()
            .context("--telegram-chat-id is required unless --dry-run is set")?;
        Arc::new(TelegramNotifier::new(token, chat_id))
    };
    let formatter = AlertFormatter { network };

    // A fresh state file starts its scan window at the current head. The
    // live subscription covers the present; scanning back to genesis on
    // the first sweep would be pointless and unbounded.
    if store.watermark().await == 0 {
        let head = chain.current_block().await?;
        store.set_watermark(head).await?;
        tracing::info!(head, "initialized watermark at current head");
    }

    let registry = AuctionRegistry::new(chain.clone(), network.factories.to_vec());
    let set = registry
        .subscription_set()
        .await
        .context("could not build the startup subscription set")?;
    tracing::info!(
        auctions = set.auctions.len(),
        tokens = set.tokens.len(),
        pairs = set.pairs.len(),
        tracked = store.active().await.len(),
        "built subscription set"
    );
    Metrics::get()
        .active_pairs
        .set(i64::try_from(store.active().await.len()).unwrap_or(i64::MAX));

    let ingestor = Arc::new(EventIngestor::new(
        chain.clone(),
        store.clone(),
        notifier.clone(),
        formatter,
    ));
    let expiry = ExpirySweeper::new(
        chain.clone(),
        store.clone(),
        notifier.clone(),
        formatter,
        args.expiry_sweep_interval,
    );
    let missed_takes = MissedTakeSweeper::new(
        chain.clone(),
        store.clone(),
        ingestor.clone(),
        args.missed_take_sweep_interval,
    );

    let ws = ethrpc::ws_provider(&args.node_ws_url).await?;
    notifier.send(&formatter.started()).await;

    tokio::spawn(expiry.run());
    tokio::spawn(missed_takes.run());

    let factories = network.factories.to_vec();
    tokio::select! {
        result = ingestor.run(ws, &set, factories) => {
            notifier.send(&formatter.shutdown()).await;
            result.context("event ingestion ended")
        }
        () = restart_trigger(args.restart_interval) => {
            // The live subscription set is fixed at startup, so newly
            // deployed auctions stay invisible until the next registry
            // scan. A controlled exit hands over to the supervisor, which
            // restarts the process; the store survives the restart.
            notifier.send(&formatter.restarting()).await;
            Ok(())
        }
        () = shutdown::signal_handler() => {
            notifier.send(&formatter.shutdown()).await;
            Ok(())
        }
    }
}

async fn restart_trigger(interval: std::time::Duration) {
    tokio::time::sleep(interval).await;
    tracing::info!(
        ?interval,
        "scheduled restart to pick up newly deployed auctions"
    );
}

#[derive(prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "alerter")]
pub(crate) struct Metrics {
    /// Alerts sent, by lifecycle event kind.
    #[metric(labels("kind"))]
    alerts: prometheus::IntCounterVec,

    /// Sweep executions, by sweeper and result.
    #[metric(labels("sweeper", "result"))]
    sweeps: prometheus::IntCounterVec,

    /// Number of currently tracked auction/token pairs.
    active_pairs: prometheus::IntGauge,

    /// Watermark of the missed-take scan window.
    last_checked_block: prometheus::IntGauge,
}

impl Metrics {
    pub(crate) fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry())
            .expect("metrics instantiation failed")
    }
}
