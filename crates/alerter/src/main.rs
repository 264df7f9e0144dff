use clap::Parser;

#[tokio::main]
async fn main() {
    let args = alerter::arguments::Arguments::parse();
    observe::metrics::setup_registry(Some("auction_alerter".into()), None);
    observe::tracing::initialize(
        &observe::Config::default().with_env_filter("warn,alerter=debug"),
    );
    tracing::info!("running alerter with validated arguments:\n{}", args);
    alerter::start(args).await;
}
