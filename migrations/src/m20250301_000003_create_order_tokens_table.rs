use sea_orm_migration::prelude::*;

use super::m20250301_000002_create_orders_table::Orders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderTokens::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderTokens::OrderId).uuid().not_null())
                    .col(
                        ColumnDef::new(OrderTokens::Token)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(OrderTokens::PhoneNumber).string().null())
                    .col(
                        ColumnDef::new(OrderTokens::ClaimedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(OrderTokens::ClaimedByUserId).string().null())
                    .col(
                        ColumnDef::new(OrderTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_tokens_order_id")
                            .from(OrderTokens::Table, OrderTokens::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_tokens_order_id")
                    .table(OrderTokens::Table)
                    .col(OrderTokens::OrderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OrderTokens {
    Table,
    Id,
    OrderId,
    Token,
    PhoneNumber,
    ClaimedAt,
    ClaimedByUserId,
    ExpiresAt,
    CreatedAt,
}
