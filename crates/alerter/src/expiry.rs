use {
    crate::{
        chain::AuctionChain,
        notify::{AlertFormatter, Notifier},
        store::Store,
    },
    anyhow::{Context, Result},
    futures::future::join_all,
    std::{sync::Arc, time::Duration},
};

/// Scheduled sweep demoting auctions whose window lapsed with unsold
/// inventory. Second source of removal next to the ingestor's take path;
/// both rely on the store's idempotent remove so racing is safe.
pub struct ExpirySweeper {
    chain: Arc<dyn AuctionChain>,
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
    formatter: AlertFormatter,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        chain: Arc<dyn AuctionChain>,
        store: Arc<Store>,
        notifier: Arc<dyn Notifier>,
        formatter: AlertFormatter,
        interval: Duration,
    ) -> Self {
        Self {
            chain,
            store,
            notifier,
            formatter,
            interval,
        }
    }

    /// Runs the sweep on its interval forever. A sweep only starts after
    /// the previous one finished, so ticks never overlap.
    pub async fn run(self) -> ! {
        loop {
            tracing::debug!("starting expiry sweep");
            let result = self.sweep_once().await;
            let label = if result.is_ok() { "ok" } else { "error" };
            crate::Metrics::get()
                .sweeps
                .with_label_values(&["expiry", label])
                .inc();
            if let Err(err) = result {
                tracing::warn!(?err, "expiry sweep failed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One pass over every tracked pair. The work list is re-derived from
    /// the store each cycle; a failed read skips that pair until the next
    /// cycle, a failed removal aborts so nothing is half applied.
    pub async fn sweep_once(&self) -> Result<()> {
        let pairs = self.store.active().await;
        let kickable = join_all(pairs.into_iter().map(|pair| {
            let chain = self.chain.clone();
            async move { (pair, chain.kickable(pair.auction, pair.token).await) }
        }))
        .await;

        for (pair, result) in kickable {
            let kickable = match result {
                Ok(kickable) => kickable,
                Err(err) => {
                    tracing::warn!(?err, ?pair, "could not read kickable amount, skipping pair");
                    continue;
                }
            };
            // The contract reports a non-zero kickable amount only once the
            // auction round is over; zero means the pair is still mid-sale
            // or cleanly resolved and carries no new information.
            if kickable.is_zero() {
                continue;
            }
            if !self
                .store
                .remove(pair)
                .await
                .context("could not record expiry")?
            {
                continue;
            }
            tracing::info!(?pair, %kickable, "auction expired with unsold inventory");
            crate::Metrics::get()
                .alerts
                .with_label_values(&["expired"])
                .inc();
            let sell = match self.chain.token_info(pair.token).await {
                Ok(info) => info,
                Err(err) => {
                    tracing::warn!(?err, token = %pair.token, "could not resolve sell token info");
                    crate::chain::TokenInfo {
                        symbol: pair.token.to_string(),
                        decimals: 18,
                    }
                }
            };
            self.notifier
                .send(&self.formatter.expired(pair, &sell, kickable))
                .await;
        }

        crate::Metrics::get()
            .active_pairs
            .set(i64::try_from(self.store.active().await.len()).unwrap_or(i64::MAX));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            chain::{MockAuctionChain, TokenInfo},
            config,
            notify::MockNotifier,
            store::AuctionTokenPair,
        },
        alloy::primitives::{Address, U256},
        mockall::predicate::eq,
    };

    fn pair(byte: u8) -> AuctionTokenPair {
        AuctionTokenPair {
            auction: Address::repeat_byte(byte),
            token: Address::repeat_byte(0x11),
        }
    }

    fn sweeper(chain: MockAuctionChain, notifier: MockNotifier, store: Arc<Store>) -> ExpirySweeper {
        ExpirySweeper::new(
            Arc::new(chain),
            store,
            Arc::new(notifier),
            AlertFormatter {
                network: config::for_chain(1).unwrap(),
            },
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn expired_pair_is_removed_and_notified() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::load(dir.path().join("state.json")).unwrap());
        store.add(pair(0xa1)).await.unwrap();
        store.add(pair(0xa2)).await.unwrap();

        let mut chain = MockAuctionChain::new();
        chain
            .expect_kickable()
            .with(eq(pair(0xa1).auction), eq(pair(0xa1).token))
            .returning(|_, _| Ok(U256::from(250u64)));
        chain
            .expect_kickable()
            .with(eq(pair(0xa2).auction), eq(pair(0xa2).token))
            .returning(|_, _| Ok(U256::ZERO));
        chain.expect_token_info().returning(|_| {
            Ok(TokenInfo {
                symbol: "yvDAI".to_string(),
                decimals: 0,
            })
        });

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|text: &str| text.contains("Expired") && text.contains("250"))
            .times(1)
            .returning(|_| ());

        sweeper(chain, notifier, store.clone())
            .sweep_once()
            .await
            .unwrap();

        // Only the lapsed pair is removed; zero kickable stays untouched.
        assert_eq!(store.active().await, vec![pair(0xa2)]);
    }

    #[tokio::test]
    async fn read_failure_skips_pair_without_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::load(dir.path().join("state.json")).unwrap());
        store.add(pair(0xa1)).await.unwrap();

        let mut chain = MockAuctionChain::new();
        chain
            .expect_kickable()
            .returning(|_, _| Err(anyhow::anyhow!("rpc timeout")));
        let notifier = MockNotifier::new();

        sweeper(chain, notifier, store.clone())
            .sweep_once()
            .await
            .unwrap();

        assert_eq!(store.active().await, vec![pair(0xa1)]);
    }
}
