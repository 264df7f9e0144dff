use {
    crate::{
        chain::{self, AuctionChain, TokenInfo},
        notify::{AlertFormatter, Notifier},
        registry::SubscriptionSet,
        store::{AuctionTokenPair, Store},
    },
    alloy::{
        primitives::{Address, B256, U256},
        providers::Provider,
        rpc::types::{Filter, Log},
        sol_types::SolEvent,
    },
    anyhow::{Context, Result},
    contracts::alloy::{Auction, AuctionFactory, ERC20},
    ethrpc::AlloyProvider,
    futures::StreamExt,
    std::sync::Arc,
};

/// Outcome of applying a take event, so the missed-take sweep can stop
/// scanning a pair once it resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TakeOutcome {
    Partial,
    Full,
    /// The pair was no longer tracked; nothing was notified.
    AlreadyResolved,
}

/// Applies live auction lifecycle events to the store and emits the
/// corresponding alerts. The same transition logic also backs the
/// missed-take sweep, so both paths stay idempotent against each other:
/// every decision is keyed off the store's add/remove return values rather
/// than any in-memory view.
pub struct EventIngestor {
    chain: Arc<dyn AuctionChain>,
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
    formatter: AlertFormatter,
}

impl EventIngestor {
    pub fn new(
        chain: Arc<dyn AuctionChain>,
        store: Arc<Store>,
        notifier: Arc<dyn Notifier>,
        formatter: AlertFormatter,
    ) -> Self {
        Self {
            chain,
            store,
            notifier,
            formatter,
        }
    }

    /// Marks the pair active and alerts. Only a fresh insert alerts, so
    /// re-delivery of the same kick (restart replay, reconciliation) cannot
    /// duplicate the notification.
    pub async fn apply_kick(&self, kick: chain::KickEvent) -> Result<()> {
        let pair = AuctionTokenPair {
            auction: kick.auction,
            token: kick.token,
        };
        if !self.store.add(pair).await.context("could not record kick")? {
            tracing::debug!(?pair, "kick for already tracked pair, suppressing alert");
            return Ok(());
        }
        crate::Metrics::get().alerts.with_label_values(&["kicked"]).inc();

        let (sell, want_symbol) = self.describe_pair(pair).await;
        self.notifier
            .send(&self.formatter.kicked(pair, &sell, &want_symbol, kick.available))
            .await;
        Ok(())
    }

    /// Applies a take: reads the auction's remaining `available` after the
    /// transaction and either keeps the pair (partial) or removes it
    /// (full). Removal of an absent pair is a no-op so racing the expiry
    /// sweep is safe.
    pub async fn apply_take(
        &self,
        pair: AuctionTokenPair,
        amount: U256,
        tx: B256,
    ) -> Result<TakeOutcome> {
        let remaining = self
            .chain
            .available(pair.auction, pair.token)
            .await
            .context("could not read remaining available amount")?;

        if !remaining.is_zero() {
            crate::Metrics::get()
                .alerts
                .with_label_values(&["partially_taken"])
                .inc();
            let (sell, want_symbol) = self.describe_pair(pair).await;
            self.notifier
                .send(&self.formatter.partially_taken(
                    &sell,
                    &want_symbol,
                    amount,
                    remaining,
                    tx,
                ))
                .await;
            return Ok(TakeOutcome::Partial);
        }

        if !self
            .store
            .remove(pair)
            .await
            .context("could not record full take")?
        {
            tracing::debug!(?pair, "take for untracked pair, suppressing alert");
            return Ok(TakeOutcome::AlreadyResolved);
        }
        crate::Metrics::get()
            .alerts
            .with_label_values(&["fully_taken"])
            .inc();
        let (sell, want_symbol) = self.describe_pair(pair).await;
        self.notifier
            .send(&self.formatter.fully_taken(&sell, &want_symbol, amount, tx))
            .await;
        Ok(TakeOutcome::Full)
    }

    /// Alerts about a newly deployed auction. The new auction's kicks are
    /// only tracked after the next restart's registry scan.
    async fn on_deployed(&self, auction: Address, want: Address, tx: Option<B256>) {
        let want_symbol = match self.chain.token_info(want).await {
            Ok(info) => info.symbol,
            Err(err) => {
                tracing::warn!(?err, %want, "could not resolve want token of new auction");
                want.to_string()
            }
        };
        let receiver = match self.chain.receiver(auction).await {
            Ok(receiver) => self.formatter.network.known_address_name(receiver),
            Err(err) => {
                tracing::warn!(?err, %auction, "could not resolve receiver of new auction");
                "unknown".to_string()
            }
        };
        let deployer = match tx {
            Some(tx) => match self.chain.tx_sender(tx).await {
                Ok(deployer) => self.formatter.network.known_address_name(deployer),
                Err(err) => {
                    tracing::warn!(?err, %auction, "could not resolve deployer of new auction");
                    "unknown".to_string()
                }
            },
            None => "unknown".to_string(),
        };
        crate::Metrics::get()
            .alerts
            .with_label_values(&["new_auction"])
            .inc();
        self.notifier
            .send(
                &self
                    .formatter
                    .new_auction(auction, &want_symbol, receiver, deployer),
            )
            .await;
    }

    /// Symbols and decimals for the alert text. Metadata reads are only
    /// cosmetic, so failures degrade to raw addresses and 18 decimals
    /// instead of blocking an already applied transition.
    async fn describe_pair(&self, pair: AuctionTokenPair) -> (TokenInfo, String) {
        let sell = match self.chain.token_info(pair.token).await {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(?err, token = %pair.token, "could not resolve sell token info");
                TokenInfo {
                    symbol: pair.token.to_string(),
                    decimals: 18,
                }
            }
        };
        let want_symbol = match self.want_symbol(pair.auction).await {
            Ok(symbol) => symbol,
            Err(err) => {
                tracing::warn!(?err, auction = %pair.auction, "could not resolve want token");
                "want".to_string()
            }
        };
        (sell, want_symbol)
    }

    async fn want_symbol(&self, auction: Address) -> Result<String> {
        let want = self.chain.want(auction).await?;
        Ok(self.chain.token_info(want).await?.symbol)
    }

    async fn handle_kick_log(&self, log: Log) {
        match chain::decode_kick(&log) {
            Ok(kick) => {
                tracing::info!(auction = %kick.auction, token = %kick.token, "observed kick");
                if let Err(err) = self.apply_kick(kick).await {
                    tracing::error!(?err, "could not apply kick transition");
                }
            }
            // A log that survives neither the typed nor the canonical
            // decoder is dropped; losing one event is recoverable, the
            // reconciliation sweeps re-derive state from chain reads.
            Err(err) => tracing::error!(?err, ?log, "dropping undecodable kick log"),
        }
    }

    async fn handle_take_log(&self, log: Log) {
        let decoded = match log.log_decode::<ERC20::Transfer>() {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::error!(?err, ?log, "dropping undecodable transfer log");
                return;
            }
        };
        let pair = AuctionTokenPair {
            auction: decoded.inner.data.from,
            token: log.address(),
        };
        let Some(tx) = log.transaction_hash else {
            tracing::warn!(?pair, "transfer log without transaction hash");
            return;
        };
        tracing::info!(?pair, taker = %decoded.inner.data.to, "observed take");
        if let Err(err) = self.apply_take(pair, decoded.inner.data.value, tx).await {
            tracing::error!(?err, ?pair, "could not apply take transition");
        }
    }

    async fn handle_deploy_log(&self, log: Log) {
        match log.log_decode::<AuctionFactory::DeployedNewAuction>() {
            Ok(decoded) => {
                let auction = decoded.inner.data.auction;
                tracing::info!(%auction, "observed new auction deployment");
                self.on_deployed(auction, decoded.inner.data.want, log.transaction_hash)
                    .await;
            }
            Err(err) => tracing::error!(?err, ?log, "dropping undecodable deployment log"),
        }
    }

    /// Subscribes to kicks, takes and deployments over the whole address
    /// set and dispatches each log by its address. Returns when any
    /// subscription ends; the caller treats that as fatal and lets the
    /// supervisor restart the process.
    pub async fn run(
        &self,
        ws: AlloyProvider,
        set: &SubscriptionSet,
        factories: Vec<Address>,
    ) -> Result<()> {
        let kick_filter = Filter::new()
            .address(set.auctions.clone())
            .event_signature(Auction::AuctionKicked::SIGNATURE_HASH);
        let take_filter = Filter::new()
            .address(set.tokens.clone())
            .event_signature(ERC20::Transfer::SIGNATURE_HASH)
            .topic1(
                set.auctions
                    .iter()
                    .map(|auction| auction.into_word())
                    .collect::<Vec<_>>(),
            );
        let deploy_filter = Filter::new()
            .address(factories)
            .event_signature(AuctionFactory::DeployedNewAuction::SIGNATURE_HASH);

        let mut kicks = ws
            .subscribe_logs(&kick_filter)
            .await
            .context("could not subscribe to kick logs")?
            .into_stream();
        let mut takes = ws
            .subscribe_logs(&take_filter)
            .await
            .context("could not subscribe to take logs")?
            .into_stream();
        let mut deployments = ws
            .subscribe_logs(&deploy_filter)
            .await
            .context("could not subscribe to deployment logs")?
            .into_stream();

        loop {
            tokio::select! {
                log = kicks.next() => match log {
                    Some(log) => self.handle_kick_log(log).await,
                    None => anyhow::bail!("kick subscription ended"),
                },
                log = takes.next() => match log {
                    Some(log) => self.handle_take_log(log).await,
                    None => anyhow::bail!("take subscription ended"),
                },
                log = deployments.next() => match log {
                    Some(log) => self.handle_deploy_log(log).await,
                    None => anyhow::bail!("deployment subscription ended"),
                },
            }
        }
    }
}
