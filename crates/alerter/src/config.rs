use {
    alloy::primitives::{Address, address},
    contracts::alloy::networks::{BASE, MAINNET},
};

/// Static per-network configuration: the auction factories to watch, the
/// block explorer to link alerts to and human readable aliases for well
/// known addresses.
#[derive(Debug)]
pub struct Network {
    pub label: &'static str,
    pub factories: &'static [Address],
    explorer_address_base: &'static str,
    explorer_tx_base: &'static str,
    known_addresses: &'static [(Address, &'static str)],
}

static NETWORKS: &[(u64, Network)] = &[
    (
        MAINNET,
        Network {
            label: "ethereum",
            factories: &[
                address!("0xCfA510188884F199fcC6e750764FAAbE6e56ec40"),
                address!("0xa3A3702d81Fd317FA1B8735227e29dc756C976C5"),
            ],
            explorer_address_base: "https://etherscan.io/address/",
            explorer_tx_base: "https://etherscan.io/tx/",
            known_addresses: &[
                (
                    address!("0xEf77cc176c748d291EfB6CdC982c5744fC7211c8"),
                    "yRoboTreasury",
                ),
                (
                    address!("0x16388463d60FFE0661Cf7F1f31a7D658aC790ff7"),
                    "SMS",
                ),
            ],
        },
    ),
    (
        BASE,
        Network {
            label: "base",
            factories: &[address!("0xCfA510188884F199fcC6e750764FAAbE6e56ec40")],
            explorer_address_base: "https://basescan.org/address/",
            explorer_tx_base: "https://basescan.org/tx/",
            known_addresses: &[],
        },
    ),
];

/// Returns the configuration for the given chain id. Watching a chain
/// without a configured factory set is a startup error handled by the
/// caller.
pub fn for_chain(chain_id: u64) -> Option<&'static Network> {
    NETWORKS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, network)| network)
}

impl Network {
    /// Alias for a well known address, or the address itself.
    pub fn known_address_name(&self, address: Address) -> String {
        self.known_addresses
            .iter()
            .find(|(known, _)| *known == address)
            .map(|(_, name)| (*name).to_string())
            .unwrap_or_else(|| address.to_string())
    }

    pub fn address_link(&self, address: Address) -> String {
        format!("{}{}", self.explorer_address_base, address)
    }

    pub fn tx_link(&self, tx: alloy::primitives::B256) -> String {
        format!("{}{}", self.explorer_tx_base, tx)
    }
}
