use {
    crate::store::AuctionTokenPair,
    alloy::{
        primitives::{Address, B256, U256},
        providers::Provider,
        rpc::types::{Filter, Log},
        sol_types::SolEvent,
    },
    anyhow::{Context, Result},
    contracts::alloy::{Auction, AuctionFactory, ERC20},
    ethrpc::{AlloyProvider, block_stream::RangeInclusive},
    std::collections::HashMap,
    tokio::sync::Mutex,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
}

/// An auction start observed on chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KickEvent {
    pub auction: Address,
    pub token: Address,
    pub available: U256,
}

/// A purchase against an active auction: an ERC-20 transfer whose sender is
/// the auction contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TakeEvent {
    pub taker: Address,
    pub amount: U256,
    pub block_number: u64,
    pub transaction_hash: B256,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("log topic0 does not match the expected event signature")]
    WrongSignature,
    #[error("log is missing the indexed token topic")]
    MissingTokenTopic,
    #[error("log data holds no amount word")]
    TruncatedData,
}

/// Decodes an `AuctionKicked` log. Tries the typed decoder first; factory
/// versions differ in ABI details the typed decoder rejects, so on failure
/// the raw log is re-read against the canonical fixed layout (indexed token
/// in topic1, available amount as the first data word) before giving up.
pub fn decode_kick(log: &Log) -> Result<KickEvent, DecodeError> {
    match log.log_decode::<Auction::AuctionKicked>() {
        Ok(decoded) => Ok(KickEvent {
            auction: log.address(),
            token: decoded.inner.data.from,
            available: decoded.inner.data.available,
        }),
        Err(err) => {
            tracing::debug!(?err, "typed kick decode failed, falling back to canonical layout");
            decode_kick_canonical(log)
        }
    }
}

fn decode_kick_canonical(log: &Log) -> Result<KickEvent, DecodeError> {
    let topics = log.topics();
    if topics.first() != Some(&Auction::AuctionKicked::SIGNATURE_HASH) {
        return Err(DecodeError::WrongSignature);
    }
    let token = topics.get(1).ok_or(DecodeError::MissingTokenTopic)?;
    let data = log.data().data.as_ref();
    if data.len() < 32 {
        return Err(DecodeError::TruncatedData);
    }
    Ok(KickEvent {
        auction: log.address(),
        token: Address::from_word(*token),
        available: U256::from_be_slice(&data[..32]),
    })
}

/// Read access to the auction contracts. The single production
/// implementation goes through the RPC provider; tests mock this seam.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AuctionChain: Send + Sync {
    async fn want(&self, auction: Address) -> Result<Address>;
    async fn available(&self, auction: Address, token: Address) -> Result<U256>;
    async fn kickable(&self, auction: Address, token: Address) -> Result<U256>;
    async fn receiver(&self, auction: Address) -> Result<Address>;
    async fn token_info(&self, token: Address) -> Result<TokenInfo>;
    async fn factory_auctions(&self, factory: Address) -> Result<Vec<Address>>;
    async fn enabled_tokens(&self, auction: Address) -> Result<Vec<Address>>;
    async fn current_block(&self) -> Result<u64>;
    /// All take events for the pair in the given block range, in ascending
    /// block and log index order.
    async fn take_logs(
        &self,
        pair: AuctionTokenPair,
        range: RangeInclusive<u64>,
    ) -> Result<Vec<TakeEvent>>;
    /// Sender of the given transaction, via its receipt.
    async fn tx_sender(&self, tx: B256) -> Result<Address>;
}

pub struct OnchainReader {
    provider: AlloyProvider,
    token_info: Mutex<HashMap<Address, TokenInfo>>,
}

impl OnchainReader {
    pub fn new(provider: AlloyProvider) -> Self {
        Self {
            provider,
            token_info: Mutex::new(HashMap::new()),
        }
    }

    fn auction(&self, address: Address) -> Auction::Instance {
        Auction::new(address, self.provider.clone())
    }
}

#[async_trait::async_trait]
impl AuctionChain for OnchainReader {
    async fn want(&self, auction: Address) -> Result<Address> {
        self.auction(auction)
            .want()
            .call()
            .await
            .context("want call failed")
    }

    async fn available(&self, auction: Address, token: Address) -> Result<U256> {
        self.auction(auction)
            .available(token)
            .call()
            .await
            .context("available call failed")
    }

    async fn kickable(&self, auction: Address, token: Address) -> Result<U256> {
        self.auction(auction)
            .kickable(token)
            .call()
            .await
            .context("kickable call failed")
    }

    async fn receiver(&self, auction: Address) -> Result<Address> {
        self.auction(auction)
            .receiver()
            .call()
            .await
            .context("receiver call failed")
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo> {
        if let Some(info) = self.token_info.lock().await.get(&token) {
            return Ok(info.clone());
        }
        let contract = ERC20::new(token, self.provider.clone());
        let symbol = contract.symbol().call().await.context("symbol call failed")?;
        let decimals = contract
            .decimals()
            .call()
            .await
            .context("decimals call failed")?;
        let info = TokenInfo { symbol, decimals };
        self.token_info.lock().await.insert(token, info.clone());
        Ok(info)
    }

    async fn factory_auctions(&self, factory: Address) -> Result<Vec<Address>> {
        AuctionFactory::new(factory, self.provider.clone())
            .getAllAuctions()
            .call()
            .await
            .context("getAllAuctions call failed")
    }

    async fn enabled_tokens(&self, auction: Address) -> Result<Vec<Address>> {
        self.auction(auction)
            .getAllEnabledAuctions()
            .call()
            .await
            .context("getAllEnabledAuctions call failed")
    }

    async fn current_block(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .context("could not fetch current block number")
    }

    async fn take_logs(
        &self,
        pair: AuctionTokenPair,
        range: RangeInclusive<u64>,
    ) -> Result<Vec<TakeEvent>> {
        let filter = Filter::new()
            .address(pair.token)
            .event_signature(ERC20::Transfer::SIGNATURE_HASH)
            .topic1(pair.auction.into_word())
            .from_block(*range.start())
            .to_block(*range.end());
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .context("could not fetch transfer logs")?;

        let mut takes = Vec::with_capacity(logs.len());
        for log in logs {
            let decoded = match log.log_decode::<ERC20::Transfer>() {
                Ok(decoded) => decoded,
                Err(err) => {
                    tracing::warn!(?err, ?log, "skipping undecodable transfer log");
                    continue;
                }
            };
            takes.push((
                (log.block_number, log.log_index),
                TakeEvent {
                    taker: decoded.inner.data.to,
                    amount: decoded.inner.data.value,
                    block_number: log.block_number.context("transfer log without block number")?,
                    transaction_hash: log
                        .transaction_hash
                        .context("transfer log without transaction hash")?,
                },
            ));
        }
        takes.sort_by_key(|(position, _)| *position);
        Ok(takes.into_iter().map(|(_, take)| take).collect())
    }

    async fn tx_sender(&self, tx: B256) -> Result<Address> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx)
            .await
            .context("could not fetch transaction receipt")?
            .context("transaction receipt not found")?;
        Ok(receipt.from)
    }
}
