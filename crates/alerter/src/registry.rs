use {
    crate::{chain::AuctionChain, store::AuctionTokenPair},
    alloy::primitives::Address,
    anyhow::{Context, Result},
    futures::future::join_all,
    std::{collections::BTreeSet, sync::Arc},
};

/// The subscription set built once at startup: everything the live
/// ingestor listens to. Newly deployed auctions become visible on the next
/// restart's scan, which is why the process restarts on a schedule.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    pub auctions: Vec<Address>,
    pub tokens: Vec<Address>,
    pub pairs: Vec<AuctionTokenPair>,
}

/// Enumerates factories, their deployed auctions and each auction's enabled
/// sell tokens. Pure read-through over the chain; holds no state of its own
/// and is never consulted by the sweeps mid-cycle.
pub struct AuctionRegistry {
    chain: Arc<dyn AuctionChain>,
    factories: Vec<Address>,
}

impl AuctionRegistry {
    pub fn new(chain: Arc<dyn AuctionChain>, factories: Vec<Address>) -> Self {
        Self { chain, factories }
    }

    pub async fn subscription_set(&self) -> Result<SubscriptionSet> {
        let mut auctions = BTreeSet::new();
        for factory in &self.factories {
            let deployed = self
                .chain
                .factory_auctions(*factory)
                .await
                .with_context(|| format!("could not list auctions of factory {factory}"))?;
            auctions.extend(deployed);
        }

        let enabled = join_all(auctions.iter().map(|auction| {
            let chain = self.chain.clone();
            let auction = *auction;
            async move {
                chain
                    .enabled_tokens(auction)
                    .await
                    .map(|tokens| (auction, tokens))
                    .with_context(|| format!("could not list enabled tokens of auction {auction}"))
            }
        }))
        .await;

        let mut tokens = BTreeSet::new();
        let mut pairs = Vec::new();
        for result in enabled {
            let (auction, enabled_tokens) = result?;
            for token in enabled_tokens {
                tokens.insert(token);
                pairs.push(AuctionTokenPair { auction, token });
            }
        }

        Ok(SubscriptionSet {
            auctions: auctions.into_iter().collect(),
            tokens: tokens.into_iter().collect(),
            pairs,
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::chain::MockAuctionChain, mockall::predicate::eq};

    #[tokio::test]
    async fn builds_subscription_set() {
        let factory = Address::repeat_byte(0xfa);
        let auction_a = Address::repeat_byte(0xa1);
        let auction_b = Address::repeat_byte(0xa2);
        let token_x = Address::repeat_byte(0x01);
        let token_y = Address::repeat_byte(0x02);

        let mut chain = MockAuctionChain::new();
        chain
            .expect_factory_auctions()
            .with(eq(factory))
            .returning(move |_| Ok(vec![auction_a, auction_b]));
        chain
            .expect_enabled_tokens()
            .with(eq(auction_a))
            .returning(move |_| Ok(vec![token_x, token_y]));
        chain
            .expect_enabled_tokens()
            .with(eq(auction_b))
            .returning(move |_| Ok(vec![token_x]));

        let registry = AuctionRegistry::new(Arc::new(chain), vec![factory]);
        let set = registry.subscription_set().await.unwrap();

        assert_eq!(set.auctions.len(), 2);
        assert_eq!(set.tokens.len(), 2);
        assert_eq!(set.pairs.len(), 3);
        assert!(set.pairs.contains(&AuctionTokenPair {
            auction: auction_b,
            token: token_x,
        }));
    }

    #[tokio::test]
    async fn factory_error_is_fatal() {
        let mut chain = MockAuctionChain::new();
        chain
            .expect_factory_auctions()
            .returning(|_| Err(anyhow::anyhow!("rpc down")));

        let registry = AuctionRegistry::new(Arc::new(chain), vec![Address::repeat_byte(0xfa)]);
        assert!(registry.subscription_set().await.is_err());
    }
}
