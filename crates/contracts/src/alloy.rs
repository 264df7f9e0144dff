pub mod networks {
    pub const MAINNET: u64 = 1;
    pub const BASE: u64 = 8453;
}

pub use alloy::providers::DynProvider as Provider;

// The interfaces below are small and stable so they are declared inline
// instead of vendoring ABI artifact files. Each contract is generated in a
// private module and re-exported together with an `Instance` type alias
// bound to the dynamic provider.
mod private {
    alloy::sol! {
        #[allow(missing_docs)]
        #[sol(rpc)]
        contract AuctionFactory {
            event DeployedNewAuction(address indexed auction, address indexed want);

            function getAllAuctions() external view returns (address[] memory);
            function numberOfAuctions() external view returns (uint256);
        }

        #[allow(missing_docs)]
        #[sol(rpc)]
        contract Auction {
            event AuctionKicked(address indexed from, uint256 available);
            event AuctionEnabled(address indexed from, address indexed to);
            event AuctionDisabled(address indexed from, address indexed to);

            function want() external view returns (address);
            function receiver() external view returns (address);
            function available(address from) external view returns (uint256);
            function kickable(address from) external view returns (uint256);
            function getAllEnabledAuctions() external view returns (address[] memory);
        }

        #[allow(missing_docs)]
        #[sol(rpc)]
        contract ERC20 {
            event Transfer(address indexed from, address indexed to, uint256 value);

            function symbol() external view returns (string memory);
            function decimals() external view returns (uint8);
            function balanceOf(address owner) external view returns (uint256);
        }
    }
}

#[allow(non_snake_case)]
pub mod AuctionFactory {
    pub use super::private::AuctionFactory::*;
    pub type Instance = AuctionFactoryInstance<alloy::providers::DynProvider>;
}

#[allow(non_snake_case)]
pub mod Auction {
    pub use super::private::Auction::*;
    pub type Instance = AuctionInstance<alloy::providers::DynProvider>;
}

#[allow(non_snake_case)]
pub mod ERC20 {
    pub use super::private::ERC20::*;
    pub type Instance = ERC20Instance<alloy::providers::DynProvider>;
}
