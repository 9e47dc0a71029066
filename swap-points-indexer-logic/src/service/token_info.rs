use alloy::{
    primitives::{Address, Bytes},
    sol,
    sol_types::SolCall,
};
use anyhow::Context;

use crate::indexer::client::ChainClient;

sol! {
    function name() external view returns (string);
    function symbol() external view returns (string);
    function decimals() external view returns (uint8);
}

#[derive(Debug, Clone)]
pub struct OnchainTokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Reads ERC-20 metadata at a historical block via three parallel calls.
pub async fn fetch_token_info(
    client: &dyn ChainClient,
    address: Address,
    at_block: u64,
) -> anyhow::Result<OnchainTokenInfo> {
    let name = async {
        let returned = client
            .call_contract(address, Bytes::from(nameCall {}.abi_encode()), at_block)
            .await?;
        nameCall::abi_decode_returns(&returned).context("failed to decode name()")
    };
    let symbol = async {
        let returned = client
            .call_contract(address, Bytes::from(symbolCall {}.abi_encode()), at_block)
            .await?;
        symbolCall::abi_decode_returns(&returned).context("failed to decode symbol()")
    };
    let decimals = async {
        let returned = client
            .call_contract(address, Bytes::from(decimalsCall {}.abi_encode()), at_block)
            .await?;
        decimalsCall::abi_decode_returns(&returned).context("failed to decode decimals()")
    };

    let (name, symbol, decimals) = tokio::try_join!(name, symbol, decimals)?;
    Ok(OnchainTokenInfo {
        name,
        symbol,
        decimals,
    })
}
