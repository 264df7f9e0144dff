use {
    crate::{
        chain::AuctionChain,
        ingestor::{EventIngestor, TakeOutcome},
        store::Store,
    },
    anyhow::{Context, Result},
    ethrpc::block_stream::RangeInclusive,
    std::{sync::Arc, time::Duration},
};

/// Scheduled re-scan of the block range since the watermark for take events
/// the live subscription missed, e.g. while the process was down. Applies
/// the same transitions as the live ingestor, so duplicated observations
/// collapse into no-ops.
pub struct MissedTakeSweeper {
    chain: Arc<dyn AuctionChain>,
    store: Arc<Store>,
    ingestor: Arc<EventIngestor>,
    interval: Duration,
}

impl MissedTakeSweeper {
    pub fn new(
        chain: Arc<dyn AuctionChain>,
        store: Arc<Store>,
        ingestor: Arc<EventIngestor>,
        interval: Duration,
    ) -> Self {
        Self {
            chain,
            store,
            ingestor,
            interval,
        }
    }

    pub async fn run(self) -> ! {
        loop {
            tracing::debug!("starting missed take sweep");
            let result = self.sweep_once().await;
            let label = if result.is_ok() { "ok" } else { "error" };
            crate::Metrics::get()
                .sweeps
                .with_label_values(&["missed_takes", label])
                .inc();
            if let Err(err) = result {
                tracing::warn!(?err, "missed take sweep failed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Scans `(watermark, current]` for every tracked pair. Logs of one
    /// pair are applied in ascending block order and scanning of that pair
    /// stops at the first fully resolving take: further takes of the same
    /// pair within the window are not separately notified. This mirrors
    /// the window semantics of the watermark and is a known limitation,
    /// not an attempt at per-log delivery.
    ///
    /// Any failure aborts the sweep before the watermark advances, so the
    /// next cycle re-scans the same window against a freshly read store.
    pub async fn sweep_once(&self) -> Result<()> {
        let current = self.chain.current_block().await?;
        let watermark = self.store.watermark().await;
        if current <= watermark {
            tracing::debug!(current, watermark, "no new blocks to scan");
            return Ok(());
        }
        let range = RangeInclusive::try_new(watermark + 1, current)?;

        for pair in self.store.active().await {
            let takes = self
                .chain
                .take_logs(pair, range.clone())
                .await
                .with_context(|| format!("could not scan take logs of {pair:?}"))?;
            for take in takes {
                let outcome = self
                    .ingestor
                    .apply_take(pair, take.amount, take.transaction_hash)
                    .await
                    .with_context(|| format!("could not apply reconciled take of {pair:?}"))?;
                match outcome {
                    TakeOutcome::Partial => (),
                    // First full take wins; skip the pair's remaining logs
                    // in this window.
                    TakeOutcome::Full | TakeOutcome::AlreadyResolved => break,
                }
            }
        }

        self.store
            .set_watermark(current)
            .await
            .context("could not advance watermark")?;
        crate::Metrics::get()
            .last_checked_block
            .set(i64::try_from(current).unwrap_or(i64::MAX));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            chain::{MockAuctionChain, TakeEvent, TokenInfo},
            config,
            notify::{AlertFormatter, MockNotifier},
            store::AuctionTokenPair,
        },
        alloy::primitives::{Address, B256, U256},
        mockall::predicate::eq,
    };

    fn pair() -> AuctionTokenPair {
        AuctionTokenPair {
            auction: Address::repeat_byte(0xaa),
            token: Address::repeat_byte(0x11),
        }
    }

    fn take(block: u64, amount: u64) -> TakeEvent {
        TakeEvent {
            taker: Address::repeat_byte(0x99),
            amount: U256::from(amount),
            block_number: block,
            transaction_hash: B256::with_last_byte(block as u8),
        }
    }

    fn with_metadata(chain: &mut MockAuctionChain) {
        chain
            .expect_want()
            .returning(|_| Ok(Address::repeat_byte(0x22)));
        chain.expect_token_info().returning(|_| {
            Ok(TokenInfo {
                symbol: "yvDAI".to_string(),
                decimals: 18,
            })
        });
    }

    fn sweeper(
        chain: MockAuctionChain,
        notifier: MockNotifier,
        store: Arc<Store>,
    ) -> MissedTakeSweeper {
        let chain = Arc::new(chain);
        let formatter = AlertFormatter {
            network: config::for_chain(1).unwrap(),
        };
        let ingestor = Arc::new(EventIngestor::new(
            chain.clone(),
            store.clone(),
            Arc::new(notifier),
            formatter,
        ));
        MissedTakeSweeper::new(chain, store, ingestor, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn first_full_take_wins_and_watermark_advances() {
        observe::tracing::initialize_reentrant("alerter=debug");
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::load(dir.path().join("state.json")).unwrap());
        store.add(pair()).await.unwrap();
        store.set_watermark(100).await.unwrap();

        let mut chain = MockAuctionChain::new();
        with_metadata(&mut chain);
        chain.expect_current_block().returning(|| Ok(200));
        chain
            .expect_take_logs()
            .withf(|_, range| (*range.start(), *range.end()) == (101, 200))
            .returning(|_, _| Ok(vec![take(150, 1000), take(180, 1)]));
        // The block 150 take fully resolves the auction.
        chain.expect_available().returning(|_, _| Ok(U256::ZERO));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|text: &str| text.contains("Fully Taken"))
            .times(1)
            .returning(|_| ());

        sweeper(chain, notifier, store.clone())
            .sweep_once()
            .await
            .unwrap();

        // Only the first take was applied and notified; the block 180 log
        // was skipped, and the watermark covers the whole window.
        assert!(store.active().await.is_empty());
        assert_eq!(store.watermark().await, 200);
    }

    #[tokio::test]
    async fn partial_takes_are_all_applied() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::load(dir.path().join("state.json")).unwrap());
        store.add(pair()).await.unwrap();
        store.set_watermark(100).await.unwrap();

        let mut chain = MockAuctionChain::new();
        with_metadata(&mut chain);
        chain.expect_current_block().returning(|| Ok(200));
        chain
            .expect_take_logs()
            .returning(|_, _| Ok(vec![take(150, 300), take(180, 300)]));
        chain
            .expect_available()
            .returning(|_, _| Ok(U256::from(400u64)));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|text: &str| text.contains("Partially Taken"))
            .times(2)
            .returning(|_| ());

        sweeper(chain, notifier, store.clone())
            .sweep_once()
            .await
            .unwrap();

        assert_eq!(store.active().await, vec![pair()]);
        assert_eq!(store.watermark().await, 200);
    }

    #[tokio::test]
    async fn empty_window_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::load(dir.path().join("state.json")).unwrap());
        store.add(pair()).await.unwrap();
        store.set_watermark(200).await.unwrap();

        let mut chain = MockAuctionChain::new();
        chain.expect_current_block().returning(|| Ok(200));
        chain.expect_take_logs().times(0);
        let notifier = MockNotifier::new();

        sweeper(chain, notifier, store.clone())
            .sweep_once()
            .await
            .unwrap();
        assert_eq!(store.watermark().await, 200);
    }

    #[tokio::test]
    async fn scan_failure_leaves_watermark_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::load(dir.path().join("state.json")).unwrap());
        store.add(pair()).await.unwrap();
        store.set_watermark(100).await.unwrap();

        let mut chain = MockAuctionChain::new();
        chain.expect_current_block().returning(|| Ok(200));
        chain
            .expect_take_logs()
            .returning(|_, _| Err(anyhow::anyhow!("rpc timeout")));
        let notifier = MockNotifier::new();

        let result = sweeper(chain, notifier, store.clone()).sweep_once().await;
        assert!(result.is_err());
        assert_eq!(store.watermark().await, 100);
        assert_eq!(store.active().await, vec![pair()]);
    }

    #[tokio::test]
    async fn take_before_kick_converges_via_sweep() {
        // Reconciliation convergence: a fully resolving take was observed
        // live before its kick, leaving the pair tracked. The next sweep
        // covering the take's block resolves it.
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::load(dir.path().join("state.json")).unwrap());
        store.add(pair()).await.unwrap();
        store.set_watermark(100).await.unwrap();

        let mut chain = MockAuctionChain::new();
        with_metadata(&mut chain);
        chain.expect_current_block().returning(|| Ok(200));
        chain
            .expect_take_logs()
            .with(eq(pair()), eq(RangeInclusive::try_new(101, 200).unwrap()))
            .returning(|_, _| Ok(vec![take(150, 1000)]));
        chain.expect_available().returning(|_, _| Ok(U256::ZERO));

        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(1).returning(|_| ());

        sweeper(chain, notifier, store.clone())
            .sweep_once()
            .await
            .unwrap();
        assert!(store.active().await.is_empty());
    }
}
