use {clap::Parser, std::path::PathBuf, std::time::Duration, url::Url};

#[derive(Parser)]
pub struct Arguments {
    /// The Ethereum node URL to connect to.
    #[clap(long, env, default_value = "http://localhost:8545")]
    pub node_url: Url,

    /// Websocket URL of the same node, used for the live log subscriptions.
    #[clap(long, env, default_value = "ws://localhost:8546")]
    pub node_ws_url: Url,

    /// Path of the JSON document holding the tracked auctions and the
    /// missed-take scan watermark. Must survive process restarts.
    #[clap(long, env, default_value = "state.json")]
    pub state_file: PathBuf,

    /// Telegram bot token used to deliver alerts.
    #[clap(long, env)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat the alerts are delivered to.
    #[clap(long, env, allow_hyphen_values = true)]
    pub telegram_chat_id: Option<String>,

    /// How often to check tracked auctions for lapsed windows with unsold
    /// inventory.
    #[clap(long, env, default_value = "1h", value_parser = humantime::parse_duration)]
    pub expiry_sweep_interval: Duration,

    /// How often to re-scan the block range since the watermark for take
    /// events the live subscription may have missed.
    #[clap(long, env, default_value = "5m", value_parser = humantime::parse_duration)]
    pub missed_take_sweep_interval: Duration,

    /// How long to run before deliberately exiting so the supervisor
    /// restarts the process. The live subscription set is fixed at startup;
    /// the restart picks up newly deployed auctions.
    #[clap(long, env, default_value = "1day", value_parser = humantime::parse_duration)]
    pub restart_interval: Duration,

    /// Log alerts instead of delivering them to Telegram.
    #[clap(long, env, action = clap::ArgAction::Set, default_value = "false")]
    pub dry_run: bool,
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "node_url: {}", self.node_url)?;
        writeln!(f, "node_ws_url: {}", self.node_ws_url)?;
        writeln!(f, "state_file: {:?}", self.state_file)?;
        writeln!(
            f,
            "telegram_bot_token: {}",
            self.telegram_bot_token.as_ref().map(|_| "SECRET").unwrap_or("None")
        )?;
        writeln!(
            f,
            "telegram_chat_id: {}",
            self.telegram_chat_id.as_deref().unwrap_or("None")
        )?;
        writeln!(f, "expiry_sweep_interval: {:?}", self.expiry_sweep_interval)?;
        writeln!(
            f,
            "missed_take_sweep_interval: {:?}",
            self.missed_take_sweep_interval
        )?;
        writeln!(f, "restart_interval: {:?}", self.restart_interval)?;
        writeln!(f, "dry_run: {}", self.dry_run)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let args = Arguments::parse_from(["alerter"]);
        assert_eq!(args.expiry_sweep_interval, Duration::from_secs(3600));
        assert_eq!(args.missed_take_sweep_interval, Duration::from_secs(300));
        assert_eq!(args.restart_interval, Duration::from_secs(86400));
        assert!(!args.dry_run);
    }

    #[test]
    fn token_is_redacted() {
        let args = Arguments::parse_from([
            "alerter",
            "--telegram-bot-token",
            "123:secret",
            "--telegram-chat-id",
            "-10042",
        ]);
        let display = args.to_string();
        assert!(!display.contains("secret"));
        assert!(display.contains("SECRET"));
    }
}
