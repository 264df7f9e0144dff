use {
    crate::{chain::TokenInfo, config::Network, store::AuctionTokenPair},
    alloy::primitives::{B256, U256, utils::format_units},
};

/// Delivers an alert to the operator channel. Strictly fire and forget:
/// implementations log failures and never propagate them, so notification
/// problems cannot block or corrupt lifecycle transitions.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);
}

/// Telegram group chat delivery via the Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("https://api.telegram.org/bot{bot_token}/sendMessage"),
            chat_id,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        let result = self.client.post(&self.url).json(&body).send().await;
        match result {
            Ok(response) if !response.status().is_success() => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(%status, %body, "telegram rejected alert");
            }
            Ok(_) => (),
            Err(err) => tracing::warn!(?err, "could not deliver alert"),
        }
    }
}

/// Prints alerts to the log instead of delivering them. Used for dry runs.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) {
        tracing::info!(%text, "alert");
    }
}

/// Renders the operator facing alert texts.
#[derive(Clone, Copy)]
pub struct AlertFormatter {
    pub network: &'static Network,
}

impl AlertFormatter {
    pub fn started(&self) -> String {
        format!(
            "🟢 🥾 <b>{} auction alerter started successfully</b>",
            self.network.label
        )
    }

    pub fn shutdown(&self) -> String {
        format!(
            "🔴 <b>{} auction alerter shutting down</b>",
            self.network.label
        )
    }

    pub fn restarting(&self) -> String {
        format!(
            "♻️ <b>{} auction alerter restarting to pick up newly deployed auctions</b>",
            self.network.label
        )
    }

    pub fn new_auction(
        &self,
        auction: alloy::primitives::Address,
        want_symbol: &str,
        receiver: String,
        deployer: String,
    ) -> String {
        format!(
            "👀 <b>New Auction Deployed!</b>\n\n<b>Want:</b> {want_symbol}\n<b>Receiver:</b> \
             {receiver}\n<b>Deployer:</b> {deployer}\n\n<a href='{}'>🔗 View Auction</a>",
            self.network.address_link(auction)
        )
    }

    pub fn kicked(&self, pair: AuctionTokenPair, sell: &TokenInfo, want_symbol: &str, available: U256) -> String {
        format!(
            "🥾 <b>Auction Kicked!</b>\n\n<b>Selling:</b> {} {}\n<b>For:</b> {want_symbol}\n\n<a \
             href='{}'>🔗 View Auction</a>",
            format_amount(available, sell.decimals),
            sell.symbol,
            self.network.address_link(pair.auction)
        )
    }

    pub fn partially_taken(
        &self,
        sell: &TokenInfo,
        want_symbol: &str,
        amount: U256,
        remaining: U256,
        tx: B256,
    ) -> String {
        format!(
            "🔄 <b>Auction Partially Taken</b>\n\n<b>Sold:</b> {} {} for \
             {want_symbol}\n<b>Remaining:</b> {} {}\n\n<a href='{}'>🔗 View Transaction</a>",
            format_amount(amount, sell.decimals),
            sell.symbol,
            format_amount(remaining, sell.decimals),
            sell.symbol,
            self.network.tx_link(tx)
        )
    }

    pub fn fully_taken(
        &self,
        sell: &TokenInfo,
        want_symbol: &str,
        amount: U256,
        tx: B256,
    ) -> String {
        format!(
            "✅ <b>Auction Fully Taken!</b>\n\n<b>Sold:</b> {} {} for {want_symbol}\n\n<a \
             href='{}'>🔗 View Transaction</a>",
            format_amount(amount, sell.decimals),
            sell.symbol,
            self.network.tx_link(tx)
        )
    }

    pub fn expired(&self, pair: AuctionTokenPair, sell: &TokenInfo, kickable: U256) -> String {
        format!(
            "⌛ <b>Auction Expired With Available Tokens</b>\n\n<b>Unsold:</b> {} {}\n\n<a \
             href='{}'>🔗 View Auction</a>",
            format_amount(kickable, sell.decimals),
            sell.symbol,
            self.network.address_link(pair.auction)
        )
    }
}

/// Scales a raw token amount by the token's decimals and trims trailing
/// zeros, so alerts read "1.5 WETH" instead of "1500000000000000000 WETH".
pub fn format_amount(amount: U256, decimals: u8) -> String {
    let Ok(formatted) = format_units(amount, decimals) else {
        return amount.to_string();
    };
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
