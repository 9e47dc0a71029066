use sea_orm::{ConnectionTrait, DbErr, EntityTrait};
use swap_points_indexer_entity::tokens::{self, Entity as Tokens};

pub async fn find_by_address<C: ConnectionTrait>(
    db: &C,
    address: &str,
) -> Result<Option<tokens::Model>, DbErr> {
    Tokens::find_by_id(address).one(db).await
}

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    token: tokens::ActiveModel,
) -> Result<tokens::Model, DbErr> {
    Tokens::insert(token).exec_with_returning(db).await
}
