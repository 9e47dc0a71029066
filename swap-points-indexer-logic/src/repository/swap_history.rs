use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use sea_orm::{
    sea_query::{Alias, Expr, SimpleExpr},
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect,
};
use swap_points_indexer_entity::swap_history::{self, Entity as SwapHistory};

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    row: swap_history::ActiveModel,
) -> Result<swap_history::Model, DbErr> {
    SwapHistory::insert(row).exec_with_returning(db).await
}

#[derive(Debug, FromQueryResult)]
struct TotalRow {
    total: Option<BigDecimal>,
}

pub async fn total_usd<C: ConnectionTrait>(
    db: &C,
    account: &str,
    token: &str,
) -> Result<BigDecimal, DbErr> {
    let row = SwapHistory::find()
        .select_only()
        .column_as(swap_history::Column::UsdValue.sum(), "total")
        .filter(swap_history::Column::Account.eq(account))
        .filter(swap_history::Column::Token.eq(token))
        .into_model::<TotalRow>()
        .one(db)
        .await?;
    Ok(row.and_then(|row| row.total).unwrap_or_default())
}

#[derive(Debug, FromQueryResult)]
struct TokenTotalRow {
    token: String,
    total: Option<BigDecimal>,
}

/// `token -> SUM(usd_value)` for one account.
pub async fn summary_by_token<C: ConnectionTrait>(
    db: &C,
    account: &str,
) -> Result<Vec<(String, BigDecimal)>, DbErr> {
    let rows = SwapHistory::find()
        .select_only()
        .column(swap_history::Column::Token)
        .column_as(swap_history::Column::UsdValue.sum(), "total")
        .filter(swap_history::Column::Account.eq(account))
        .group_by(swap_history::Column::Token)
        .into_model::<TokenTotalRow>()
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.token, row.total.unwrap_or_default()))
        .collect())
}

#[derive(Debug, FromQueryResult)]
struct AccountTotalRow {
    account: String,
    total: Option<BigDecimal>,
}

/// Per-account totals for one token with `last_updated` in `(from, to]`,
/// largest total first.
pub async fn window_totals<C: ConnectionTrait>(
    db: &C,
    token: &str,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<(String, BigDecimal)>, DbErr> {
    let rows = SwapHistory::find()
        .select_only()
        .column(swap_history::Column::Account)
        .column_as(swap_history::Column::UsdValue.sum(), "total")
        .filter(swap_history::Column::Token.eq(token))
        .filter(swap_history::Column::LastUpdated.gt(from))
        .filter(swap_history::Column::LastUpdated.lte(to))
        .group_by(swap_history::Column::Account)
        .order_by_desc(SimpleExpr::from(Expr::col(Alias::new("total"))))
        .into_model::<AccountTotalRow>()
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.account, row.total.unwrap_or_default()))
        .collect())
}
