use bigdecimal::BigDecimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use swap_points_indexer_entity::accounts::{self, Entity as Accounts};

pub async fn find_by_address<C: ConnectionTrait>(
    db: &C,
    address: &str,
) -> Result<Option<accounts::Model>, DbErr> {
    Accounts::find()
        .filter(accounts::Column::Address.eq(address))
        .one(db)
        .await
}

pub async fn insert<C: ConnectionTrait>(db: &C, address: &str) -> Result<accounts::Model, DbErr> {
    Accounts::insert(accounts::ActiveModel {
        address: Set(address.to_string()),
        ..Default::default()
    })
    .exec_with_returning(db)
    .await
}

/// Insert-or-add upsert keyed by address; touches `updated_at` on conflict.
pub async fn add_points<C: ConnectionTrait>(
    db: &C,
    address: &str,
    points: BigDecimal,
) -> Result<(), DbErr> {
    Accounts::insert(accounts::ActiveModel {
        address: Set(address.to_string()),
        total_points: Set(points.clone()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(accounts::Column::Address)
            .value(
                accounts::Column::TotalPoints,
                Expr::col((Accounts, accounts::Column::TotalPoints)).add(points),
            )
            .value(accounts::Column::UpdatedAt, Expr::current_timestamp())
            .to_owned(),
    )
    .exec(db)
    .await
    .map(|_| ())
}

pub async fn leaderboard<C: ConnectionTrait>(db: &C) -> Result<Vec<accounts::Model>, DbErr> {
    Accounts::find()
        .order_by_desc(accounts::Column::TotalPoints)
        .all(db)
        .await
}
