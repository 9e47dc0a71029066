use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            CREATE TABLE "accounts" (
              "id" SERIAL PRIMARY KEY,
              "address" varchar(42) NOT NULL,
              "total_points" NUMERIC(20, 3) NOT NULL DEFAULT 0,
              "created_at" timestamp NOT NULL DEFAULT (now()),
              "updated_at" timestamp NOT NULL DEFAULT (now()),

              CONSTRAINT "accounts_address_key" UNIQUE ("address")
            );

            CREATE TABLE "tokens" (
              -- lowercased contract address
              "id" varchar(42) PRIMARY KEY,
              "name" varchar NOT NULL,
              "symbol" varchar NOT NULL,
              "decimals" int NOT NULL,
              "created_at" timestamp NOT NULL DEFAULT (now())
            );

            CREATE TABLE "swap_history" (
              "id" SERIAL PRIMARY KEY,
              "token" varchar(42) NOT NULL,
              "account" varchar(42) NOT NULL,
              "transaction_hash" varchar(66) NOT NULL,
              "usd_value" NUMERIC(28, 6) NOT NULL,
              -- block timestamp of the swap
              "last_updated" timestamp NOT NULL,
              "created_at" timestamp NOT NULL DEFAULT (now())
            );

            CREATE TABLE "points_history" (
              "id" SERIAL PRIMARY KEY,
              "token" varchar(42) NOT NULL,
              "account" varchar(42) NOT NULL,
              "points" NUMERIC(20, 3) NOT NULL,
              "description" varchar NOT NULL,
              "created_at" timestamp NOT NULL DEFAULT (now()),

              -- one row per (account, description); one-shot awards rely on
              -- ON CONFLICT DO NOTHING against this constraint
              CONSTRAINT "points_history_account_description_key" UNIQUE ("account", "description")
            );
        "#;
        crate::from_sql(manager, sql).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            DROP TABLE "points_history";

            DROP TABLE "swap_history";

            DROP TABLE "tokens";

            DROP TABLE "accounts";
        "#;
        crate::from_sql(manager, sql).await
    }
}
