pub mod block_stream;

use {
    alloy::{
        providers::{DynProvider, Provider, ProviderBuilder},
        rpc::client::ClientBuilder,
        transports::ws::WsConnect,
    },
    anyhow::{Context, Result},
    url::Url,
};

pub type AlloyProvider = DynProvider;

/// Creates a provider talking JSON RPC over HTTP.
pub fn provider(url: &Url) -> AlloyProvider {
    let rpc = ClientBuilder::default().http(url.clone());
    ProviderBuilder::new().connect_client(rpc).erased()
}

/// Creates a provider talking JSON RPC over a websocket connection. Only
/// this flavor supports log subscriptions. Reconnects are handled by the
/// alloy lib.
pub async fn ws_provider(url: &Url) -> Result<AlloyProvider> {
    let ws = WsConnect::new(url.as_str());
    let provider = ProviderBuilder::new()
        .connect_ws(ws)
        .await
        .with_context(|| format!("could not establish websocket connection to {url}"))?;
    Ok(provider.erased())
}
