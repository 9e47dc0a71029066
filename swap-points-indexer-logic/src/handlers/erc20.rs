use anyhow::Context;
use async_trait::async_trait;

use super::{EventHandler, HandlerContext};
use crate::{indexer::Event, service::address_key};

/// Minimal ERC-20 handler: logs Transfer / Approval activity and makes sure
/// both participant accounts exist.
pub struct Erc20ActivityHandler;

#[async_trait]
impl EventHandler for Erc20ActivityHandler {
    async fn handle(&self, ctx: &HandlerContext, event: &Event) -> anyhow::Result<()> {
        match event.event_name.as_str() {
            "Transfer" => {
                let from = event.arg_address("from").context("missing from")?;
                let to = event.arg_address("to").context("missing to")?;
                let value = event.arg_uint("value").context("missing value")?;

                ctx.service.get_or_create_account(&address_key(from)).await?;
                ctx.service.get_or_create_account(&address_key(to)).await?;

                tracing::info!(
                    event = %event.key(),
                    token = %address_key(event.contract_address),
                    from = %address_key(from),
                    to = %address_key(to),
                    value = %value,
                    "indexed transfer"
                );
            }
            "Approval" => {
                let owner = event.arg_address("owner").context("missing owner")?;
                let spender = event.arg_address("spender").context("missing spender")?;
                let value = event.arg_uint("value").context("missing value")?;

                ctx.service.get_or_create_account(&address_key(owner)).await?;
                ctx.service
                    .get_or_create_account(&address_key(spender))
                    .await?;

                tracing::info!(
                    event = %event.key(),
                    token = %address_key(event.contract_address),
                    owner = %address_key(owner),
                    spender = %address_key(spender),
                    value = %value,
                    "indexed approval"
                );
            }
            other => {
                tracing::debug!(event = other, "no action for event");
            }
        }
        Ok(())
    }
}
