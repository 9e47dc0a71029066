use std::str::FromStr;

use alloy::primitives::{address, Address, U256};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use super::{EventHandler, HandlerContext};
use crate::{
    indexer::Event,
    service::{address_key, NewSwapHistory, ONBOARDING_TASK_DESCRIPTION},
};

/// Uniswap V2 USDC/WETH pool; token0 = USDC, token1 = WETH.
pub const USDC_WETH_POOL: Address = address!("b4e16d0168e52d35cacd2c6185b44281ec28c9dc");
pub const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

/// Cumulative pool volume that completes the onboarding task, in USD.
const ONBOARDING_VOLUME_USD: i64 = 1000;
const ONBOARDING_POINTS: i64 = 100;

/// Converts pool `Swap` events into USD-valued swap history rows and awards
/// the one-time onboarding bonus once the sender's cumulative volume
/// crosses the threshold.
pub struct UsdcWethSwapHandler;

#[async_trait]
impl EventHandler for UsdcWethSwapHandler {
    async fn handle(&self, ctx: &HandlerContext, event: &Event) -> anyhow::Result<()> {
        let transaction = event.transaction.as_ref().ok_or_else(|| {
            anyhow!(
                "transaction {:#x} not found in block {}",
                event.transaction_hash,
                event.block_number()
            )
        })?;
        let sender = address_key(transaction.inner.signer());

        tracing::info!(
            event = %event.key(),
            tx_hash = ?event.transaction_hash,
            block_number = event.block_number(),
            sender = %sender,
            "processing swap"
        );

        // token0 decimals scale the USD value
        let usdc = ctx
            .service
            .get_or_create_token(ctx.client.as_ref(), USDC, event.block_number())
            .await?;

        let amount0_in = event.arg_uint("amount0In").context("missing amount0In")?;
        let amount0_out = event.arg_uint("amount0Out").context("missing amount0Out")?;
        let usd_value = swap_usd_value(amount0_in.max(amount0_out), usdc.decimals)?;

        let last_updated = chrono::DateTime::from_timestamp(event.block_timestamp() as i64, 0)
            .context("invalid block timestamp")?
            .naive_utc();

        let pool = address_key(USDC_WETH_POOL);
        ctx.service
            .create_swap_history(NewSwapHistory {
                token: pool.clone(),
                account: sender.clone(),
                transaction_hash: format!("{:#x}", event.transaction_hash),
                usd_value,
                last_updated,
            })
            .await?;

        if ctx.service.is_onboarding_task_completed(&sender).await? {
            return Ok(());
        }
        let total_usd = ctx.service.get_swap_total_usd(&sender, &pool).await?;
        if total_usd >= BigDecimal::from(ONBOARDING_VOLUME_USD) {
            ctx.service
                .accumulate_user_points(
                    &pool,
                    &sender,
                    ONBOARDING_TASK_DESCRIPTION,
                    BigDecimal::from(ONBOARDING_POINTS),
                )
                .await?;
            tracing::info!(account = %sender, "onboarding task completed");
        }

        Ok(())
    }
}

/// `amount / 10^decimals`, truncated to 6 decimal places.
fn swap_usd_value(amount: U256, decimals: i32) -> anyhow::Result<BigDecimal> {
    let amount = BigDecimal::from_str(&amount.to_string()).context("invalid swap amount")?;
    let scale = BigDecimal::new(BigInt::from(1), -i64::from(decimals));
    Ok((amount / scale).with_scale(6))
}
