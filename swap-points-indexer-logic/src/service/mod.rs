mod singleflight;
pub mod token_info;

use std::{collections::HashMap, sync::Arc};

use alloy::primitives::Address;
use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDateTime};
use sea_orm::{ActiveValue::Set, DatabaseConnection, DbErr, TransactionTrait};
use thiserror::Error;

use swap_points_indexer_entity::{accounts, points_history, swap_history, tokens};

use crate::{indexer::client::ChainClient, repository};
use singleflight::Group;

/// The description of the one-time onboarding award; `(account,
/// description)` uniqueness makes the award idempotent.
pub const ONBOARDING_TASK_DESCRIPTION: &str = "onboarding_task";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("account not found")]
    AccountNotFound,
    #[error("token not found")]
    TokenNotFound,
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("failed to read token metadata: {0}")]
    TokenMetadata(String),
    #[error(transparent)]
    Shared(Arc<ServiceError>),
}

/// The canonical persistence key for an address: lowercased 0x-prefixed hex.
pub fn address_key(address: Address) -> String {
    format!("{address:#x}")
}

#[derive(Debug, Clone)]
pub struct NewSwapHistory {
    pub token: String,
    pub account: String,
    pub transaction_hash: String,
    pub usd_value: BigDecimal,
    pub last_updated: NaiveDateTime,
}

/// One account's share of a pool's volume within a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSwapShare {
    pub account: String,
    pub total_usd: BigDecimal,
    pub percentage: BigDecimal,
}

/// Domain operations over the store. Entity materialization collapses
/// concurrent callers per key through the single-flight groups; point
/// accumulation is transactional.
#[derive(Clone)]
pub struct Service {
    db: Arc<DatabaseConnection>,
    account_flights: Arc<Group<accounts::Model>>,
    token_flights: Arc<Group<tokens::Model>>,
    points_flights: Arc<Group<()>>,
}

impl Service {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            account_flights: Arc::new(Group::new()),
            token_flights: Arc::new(Group::new()),
            points_flights: Arc::new(Group::new()),
        }
    }

    pub async fn get_account_by_address(
        &self,
        address: &str,
    ) -> Result<accounts::Model, ServiceError> {
        repository::accounts::find_by_address(self.db.as_ref(), address)
            .await?
            .ok_or(ServiceError::AccountNotFound)
    }

    /// Reads the account by address, inserting it on miss. Concurrent
    /// callers for the same address collapse to a single read+insert.
    pub async fn get_or_create_account(
        &self,
        address: &str,
    ) -> Result<accounts::Model, ServiceError> {
        self.account_flights
            .run(address, || async {
                match repository::accounts::find_by_address(self.db.as_ref(), address).await? {
                    Some(account) => Ok(account),
                    None => Ok(repository::accounts::insert(self.db.as_ref(), address).await?),
                }
            })
            .await
    }

    pub async fn get_token_by_address(&self, address: &str) -> Result<tokens::Model, ServiceError> {
        repository::tokens::find_by_address(self.db.as_ref(), address)
            .await?
            .ok_or(ServiceError::TokenNotFound)
    }

    /// Reads the token by address; on miss resolves `name`, `symbol` and
    /// `decimals` from the contract at `at_block` and inserts the row under
    /// a transaction. Single-flight per token address.
    pub async fn get_or_create_token(
        &self,
        client: &dyn ChainClient,
        address: Address,
        at_block: u64,
    ) -> Result<tokens::Model, ServiceError> {
        let id = address_key(address);
        self.token_flights
            .run(&id, || async {
                if let Some(token) =
                    repository::tokens::find_by_address(self.db.as_ref(), &id).await?
                {
                    return Ok(token);
                }

                let info = token_info::fetch_token_info(client, address, at_block)
                    .await
                    .map_err(|err| ServiceError::TokenMetadata(format!("{err:#}")))?;

                let txn = self.db.begin().await?;
                let token = repository::tokens::insert(
                    &txn,
                    tokens::ActiveModel {
                        id: Set(id.clone()),
                        name: Set(info.name),
                        symbol: Set(info.symbol),
                        decimals: Set(i32::from(info.decimals)),
                        ..Default::default()
                    },
                )
                .await?;
                txn.commit().await?;
                Ok(token)
            })
            .await
    }

    /// Append-only insert; returns the stored row with its assigned id and
    /// timestamp.
    pub async fn create_swap_history(
        &self,
        row: NewSwapHistory,
    ) -> Result<swap_history::Model, ServiceError> {
        Ok(repository::swap_history::insert(
            self.db.as_ref(),
            swap_history::ActiveModel {
                token: Set(row.token),
                account: Set(row.account),
                transaction_hash: Set(row.transaction_hash),
                usd_value: Set(row.usd_value),
                last_updated: Set(row.last_updated),
                ..Default::default()
            },
        )
        .await?)
    }

    pub async fn get_swap_total_usd(
        &self,
        account: &str,
        token: &str,
    ) -> Result<BigDecimal, ServiceError> {
        Ok(repository::swap_history::total_usd(self.db.as_ref(), account, token).await?)
    }

    pub async fn is_onboarding_task_completed(&self, account: &str) -> Result<bool, ServiceError> {
        Ok(
            repository::points_history::exists(
                self.db.as_ref(),
                account,
                ONBOARDING_TASK_DESCRIPTION,
            )
            .await?,
        )
    }

    /// Atomically appends a points row and adds the amount to the account
    /// total. A duplicate `(account, description)` award leaves both tables
    /// unchanged. Single-flight per account, one transaction per execution.
    pub async fn accumulate_user_points(
        &self,
        token: &str,
        account: &str,
        description: &str,
        points: BigDecimal,
    ) -> Result<(), ServiceError> {
        self.points_flights
            .run(account, || async {
                let txn = self.db.begin().await?;
                let inserted = repository::points_history::insert_ignore_duplicate(
                    &txn,
                    token,
                    account,
                    description,
                    points.clone(),
                )
                .await?;
                if inserted {
                    repository::accounts::add_points(&txn, account, points.clone()).await?;
                }
                txn.commit().await?;
                Ok(())
            })
            .await
    }

    pub async fn get_user_swap_summary(
        &self,
        account: &str,
    ) -> Result<HashMap<String, BigDecimal>, ServiceError> {
        Ok(
            repository::swap_history::summary_by_token(self.db.as_ref(), account)
                .await?
                .into_iter()
                .collect(),
        )
    }

    /// Per-account totals for `token` within `(reference_time - 7d,
    /// reference_time]` and their share of the window's sum, largest first.
    pub async fn get_user_swap_summary_last_7_days(
        &self,
        token: &str,
        reference_time: NaiveDateTime,
    ) -> Result<Vec<AccountSwapShare>, ServiceError> {
        let rows = repository::swap_history::window_totals(
            self.db.as_ref(),
            token,
            reference_time - Duration::days(7),
            reference_time,
        )
        .await?;

        let window_sum = rows
            .iter()
            .fold(BigDecimal::default(), |acc, (_, total)| acc + total);
        Ok(rows
            .into_iter()
            .map(|(account, total_usd)| {
                let percentage = &total_usd / &window_sum;
                AccountSwapShare {
                    account,
                    total_usd,
                    percentage,
                }
            })
            .collect())
    }

    pub async fn get_points_history(
        &self,
        account: &str,
        token: &str,
    ) -> Result<Vec<points_history::Model>, ServiceError> {
        Ok(repository::points_history::list(self.db.as_ref(), account, token).await?)
    }

    pub async fn get_leaderboard(&self) -> Result<Vec<accounts::Model>, ServiceError> {
        Ok(repository::accounts::leaderboard(self.db.as_ref()).await?)
    }
}
