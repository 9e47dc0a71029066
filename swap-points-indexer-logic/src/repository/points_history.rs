use bigdecimal::BigDecimal;
use sea_orm::{
    sea_query::OnConflict, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use swap_points_indexer_entity::points_history::{self, Entity as PointsHistory};

/// Append-only insert guarded by the `(account, description)` uniqueness;
/// returns whether a row was actually inserted.
pub async fn insert_ignore_duplicate<C: ConnectionTrait>(
    db: &C,
    token: &str,
    account: &str,
    description: &str,
    points: BigDecimal,
) -> Result<bool, DbErr> {
    let result = PointsHistory::insert(points_history::ActiveModel {
        token: Set(token.to_string()),
        account: Set(account.to_string()),
        points: Set(points),
        description: Set(description.to_string()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            points_history::Column::Account,
            points_history::Column::Description,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec(db)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(err) => Err(err),
    }
}

pub async fn exists<C: ConnectionTrait>(
    db: &C,
    account: &str,
    description: &str,
) -> Result<bool, DbErr> {
    PointsHistory::find()
        .filter(points_history::Column::Account.eq(account))
        .filter(points_history::Column::Description.eq(description))
        .count(db)
        .await
        .map(|count| count > 0)
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    account: &str,
    token: &str,
) -> Result<Vec<points_history::Model>, DbErr> {
    PointsHistory::find()
        .filter(points_history::Column::Account.eq(account))
        .filter(points_history::Column::Token.eq(token))
        .order_by_desc(points_history::Column::CreatedAt)
        .all(db)
        .await
}
