use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            CREATE INDEX "swap_history_account_token_index" ON "swap_history" ("account", "token");

            CREATE INDEX "swap_history_token_last_updated_index" ON "swap_history" ("token", "last_updated");

            CREATE INDEX "points_history_account_token_index" ON "points_history" ("account", "token");

            CREATE INDEX "accounts_total_points_index" ON "accounts" ("total_points" DESC);
        "#;
        crate::from_sql(manager, sql).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            DROP INDEX "accounts_total_points_index";

            DROP INDEX "points_history_account_token_index";

            DROP INDEX "swap_history_token_last_updated_index";

            DROP INDEX "swap_history_account_token_index";
        "#;
        crate::from_sql(manager, sql).await
    }
}
