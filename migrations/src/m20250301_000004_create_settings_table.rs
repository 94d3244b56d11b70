use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Settings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settings::Id)
                            .integer()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Settings::BusinessName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Settings::BusinessLatitude)
                            .double()
                            .not_null()
                            .default(-34.6037),
                    )
                    .col(
                        ColumnDef::new(Settings::BusinessLongitude)
                            .double()
                            .not_null()
                            .default(-58.3816),
                    )
                    .col(
                        ColumnDef::new(Settings::DefaultItemWeightGrams)
                            .integer()
                            .not_null()
                            .default(500),
                    )
                    .col(
                        ColumnDef::new(Settings::DeliveryBasePrice)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(500),
                    )
                    .col(
                        ColumnDef::new(Settings::DeliveryPricePerKm)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(150),
                    )
                    .col(
                        ColumnDef::new(Settings::DeliveryPricePerKg)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(100),
                    )
                    .col(ColumnDef::new(Settings::CollectorId).string().null())
                    .col(
                        ColumnDef::new(Settings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Settings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Settings {
    Table,
    Id,
    BusinessName,
    BusinessLatitude,
    BusinessLongitude,
    DefaultItemWeightGrams,
    DeliveryBasePrice,
    DeliveryPricePerKm,
    DeliveryPricePerKg,
    CollectorId,
    UpdatedAt,
}
