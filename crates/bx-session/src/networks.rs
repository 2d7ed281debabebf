use bx_api_types::{NativeCurrency, NetworkDescriptor};

pub const MAINNET: u64 = 1;
pub const SEPOLIA: u64 = 11155111;
pub const HARDHAT_LOCAL: u64 = 31337;

/// The chains this deployment knows how to add to a wallet.
pub fn supported_networks() -> Vec<NetworkDescriptor> {
    vec![
        NetworkDescriptor {
            chain_id: MAINNET,
            name: "Ethereum Mainnet".to_owned(),
            native_currency: ether_currency("Ether"),
            rpc_urls: vec!["https://eth.llamarpc.com".to_owned()],
            block_explorer_url: Some("https://etherscan.io".to_owned()),
        },
        NetworkDescriptor {
            chain_id: SEPOLIA,
            name: "Sepolia".to_owned(),
            native_currency: ether_currency("Sepolia Ether"),
            rpc_urls: vec!["https://rpc.sepolia.org".to_owned()],
            block_explorer_url: Some("https://sepolia.etherscan.io".to_owned()),
        },
        NetworkDescriptor {
            chain_id: HARDHAT_LOCAL,
            name: "Hardhat Local".to_owned(),
            native_currency: ether_currency("Ether"),
            rpc_urls: vec!["http://127.0.0.1:8545".to_owned()],
            block_explorer_url: None,
        },
    ]
}

pub fn find_network(chain_id: u64) -> Option<NetworkDescriptor> {
    supported_networks()
        .into_iter()
        .find(|network| network.chain_id == chain_id)
}

/// Descriptor for the given chain id, or a generic fallback for ids this
/// deployment does not declare.
pub fn network_info(chain_id: u64) -> NetworkDescriptor {
    find_network(chain_id).unwrap_or(NetworkDescriptor {
        chain_id,
        name: "Unknown Network".to_owned(),
        native_currency: ether_currency("Ether"),
        rpc_urls: Vec::new(),
        block_explorer_url: None,
    })
}

fn ether_currency(name: &str) -> NativeCurrency {
    NativeCurrency {
        name: name.to_owned(),
        symbol: "ETH".to_owned(),
        decimals: 18,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_ids_return_declared_currency() {
        for network in supported_networks() {
            let info = network_info(network.chain_id);
            assert_eq!(info, network);
            assert_eq!(info.native_currency.decimals, 18);
            assert_eq!(info.native_currency.symbol, "ETH");
        }
    }

    #[test]
    fn unknown_id_gets_generic_fallback() {
        let info = network_info(424242);
        assert_eq!(info.chain_id, 424242);
        assert_eq!(info.name, "Unknown Network");
        assert_eq!(info.native_currency.symbol, "ETH");
        assert_eq!(info.native_currency.decimals, 18);
        assert!(info.rpc_urls.is_empty());
    }
}
