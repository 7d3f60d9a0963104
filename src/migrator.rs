use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_suppliers_table::Migration),
            Box::new(m20240301_000002_create_drivers_table::Migration),
            Box::new(m20240301_000003_create_users_table::Migration),
            Box::new(m20240301_000004_create_products_table::Migration),
            Box::new(m20240301_000005_create_client_addresses_table::Migration),
            Box::new(m20240301_000006_create_purchase_orders_table::Migration),
            Box::new(m20240301_000007_create_order_items_table::Migration),
            Box::new(m20240301_000008_create_delivery_tracking_table::Migration),
            Box::new(m20240315_000009_add_order_item_line_number::Migration),
            Box::new(m20240315_000010_unique_active_delivery::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum Suppliers {
    Table,
    Id,
    Name,
    ContactName,
    Email,
    Phone,
    Address,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Drivers {
    Table,
    Id,
    Name,
    Phone,
    VehicleDescription,
    LicenseNumber,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    Name,
    PasswordHash,
    Role,
    SupplierId,
    DriverId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    SupplierId,
    Sku,
    Name,
    Description,
    Category,
    Unit,
    UnitPrice,
    StockQuantity,
    ReorderPoint,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ClientAddresses {
    Table,
    Id,
    ClientId,
    Label,
    Street,
    City,
    State,
    PostalCode,
    Latitude,
    Longitude,
    IsDefault,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PurchaseOrders {
    Table,
    Id,
    PoNumber,
    SupplierId,
    ClientId,
    DeliveryAddressId,
    Status,
    TotalAmount,
    ExpectedDeliveryDate,
    DeliveredAt,
    Notes,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    PurchaseOrderId,
    ProductId,
    Quantity,
    UnitPrice,
    LineTotal,
    LineNumber,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DeliveryTracking {
    Table,
    Id,
    PurchaseOrderId,
    DriverId,
    Status,
    CurrentLatitude,
    CurrentLongitude,
    EstimatedArrival,
    DeliveredAt,
    Notes,
    CreatedAt,
    UpdatedAt,
}

fn index(
    name: &str,
    table: impl IntoIden + 'static,
    col: impl IntoIden + 'static,
) -> IndexCreateStatement {
    Index::create()
        .if_not_exists()
        .name(name)
        .table(table)
        .col(col)
        .to_owned()
}

mod m20240301_000001_create_suppliers_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_suppliers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Suppliers::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(ColumnDef::new(Suppliers::ContactName).string().null())
                        .col(ColumnDef::new(Suppliers::Email).string().null())
                        .col(ColumnDef::new(Suppliers::Phone).string().null())
                        .col(ColumnDef::new(Suppliers::Address).text().null())
                        .col(
                            ColumnDef::new(Suppliers::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000002_create_drivers_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_drivers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Drivers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Drivers::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Drivers::Name).string().not_null())
                        .col(ColumnDef::new(Drivers::Phone).string().null())
                        .col(ColumnDef::new(Drivers::VehicleDescription).string().null())
                        .col(ColumnDef::new(Drivers::LicenseNumber).string().null())
                        .col(
                            ColumnDef::new(Drivers::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Drivers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Drivers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Drivers::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000003_create_users_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(16).not_null())
                        .col(ColumnDef::new(Users::SupplierId).uuid().null())
                        .col(ColumnDef::new(Users::DriverId).uuid().null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_users_supplier")
                                .from(Users::Table, Users::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_users_driver")
                                .from(Users::Table, Users::DriverId)
                                .to(Drivers::Table, Drivers::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(index("idx_users_role", Users::Table, Users::Role))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000004_create_products_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Products::SupplierId).uuid().not_null())
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Category).string().null())
                        .col(
                            ColumnDef::new(Products::Unit)
                                .string()
                                .not_null()
                                .default("each"),
                        )
                        .col(
                            ColumnDef::new(Products::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::ReorderPoint)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_supplier")
                                .from(Products::Table, Products::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(index(
                    "idx_products_supplier_id",
                    Products::Table,
                    Products::SupplierId,
                ))
                .await?;
            manager
                .create_index(index(
                    "idx_products_category",
                    Products::Table,
                    Products::Category,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000005_create_client_addresses_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_client_addresses_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ClientAddresses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ClientAddresses::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ClientAddresses::ClientId).uuid().not_null())
                        .col(ColumnDef::new(ClientAddresses::Label).string().not_null())
                        .col(ColumnDef::new(ClientAddresses::Street).string().not_null())
                        .col(ColumnDef::new(ClientAddresses::City).string().not_null())
                        .col(ColumnDef::new(ClientAddresses::State).string().null())
                        .col(ColumnDef::new(ClientAddresses::PostalCode).string().null())
                        .col(ColumnDef::new(ClientAddresses::Latitude).double().null())
                        .col(ColumnDef::new(ClientAddresses::Longitude).double().null())
                        .col(
                            ColumnDef::new(ClientAddresses::IsDefault)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ClientAddresses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ClientAddresses::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_client_addresses_client")
                                .from(ClientAddresses::Table, ClientAddresses::ClientId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(index(
                    "idx_client_addresses_client_id",
                    ClientAddresses::Table,
                    ClientAddresses::ClientId,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ClientAddresses::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000006_create_purchase_orders_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_purchase_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::PoNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::ClientId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrders::DeliveryAddressId).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::Status)
                                .string_len(16)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PurchaseOrders::ExpectedDeliveryDate).date().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Notes).text().null())
                        .col(ColumnDef::new(PurchaseOrders::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_supplier")
                                .from(PurchaseOrders::Table, PurchaseOrders::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_client")
                                .from(PurchaseOrders::Table, PurchaseOrders::ClientId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_address")
                                .from(PurchaseOrders::Table, PurchaseOrders::DeliveryAddressId)
                                .to(ClientAddresses::Table, ClientAddresses::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(index(
                    "idx_purchase_orders_supplier_id",
                    PurchaseOrders::Table,
                    PurchaseOrders::SupplierId,
                ))
                .await?;
            manager
                .create_index(index(
                    "idx_purchase_orders_client_id",
                    PurchaseOrders::Table,
                    PurchaseOrders::ClientId,
                ))
                .await?;
            manager
                .create_index(index(
                    "idx_purchase_orders_status",
                    PurchaseOrders::Table,
                    PurchaseOrders::Status,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000007_create_order_items_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(OrderItems::PurchaseOrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::LineTotal)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_purchase_order")
                                .from(OrderItems::Table, OrderItems::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_product")
                                .from(OrderItems::Table, OrderItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(index(
                    "idx_order_items_purchase_order_id",
                    OrderItems::Table,
                    OrderItems::PurchaseOrderId,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }
}

mod m20240301_000008_create_delivery_tracking_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000008_create_delivery_tracking_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryTracking::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryTracking::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTracking::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryTracking::DriverId).uuid().null())
                        .col(
                            ColumnDef::new(DeliveryTracking::Status)
                                .string_len(16)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(DeliveryTracking::CurrentLatitude).double().null())
                        .col(ColumnDef::new(DeliveryTracking::CurrentLongitude).double().null())
                        .col(
                            ColumnDef::new(DeliveryTracking::EstimatedArrival)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTracking::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(DeliveryTracking::Notes).text().null())
                        .col(
                            ColumnDef::new(DeliveryTracking::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTracking::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_tracking_purchase_order")
                                .from(DeliveryTracking::Table, DeliveryTracking::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_tracking_driver")
                                .from(DeliveryTracking::Table, DeliveryTracking::DriverId)
                                .to(Drivers::Table, Drivers::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(index(
                    "idx_delivery_tracking_purchase_order_id",
                    DeliveryTracking::Table,
                    DeliveryTracking::PurchaseOrderId,
                ))
                .await?;
            manager
                .create_index(index(
                    "idx_delivery_tracking_driver_id",
                    DeliveryTracking::Table,
                    DeliveryTracking::DriverId,
                ))
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryTracking::Table).to_owned())
                .await
        }
    }
}

mod m20240315_000009_add_order_item_line_number {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240315_000009_add_order_item_line_number"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            if !manager.has_column("order_items", "line_number").await? {
                let mut col = ColumnDef::new(OrderItems::LineNumber);
                col.integer().not_null().default(0);
                manager
                    .alter_table(
                        Table::alter()
                            .table(OrderItems::Table)
                            .add_column(col)
                            .to_owned(),
                    )
                    .await?;
            }
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .alter_table(
                    Table::alter()
                        .table(OrderItems::Table)
                        .drop_column(OrderItems::LineNumber)
                        .to_owned(),
                )
                .await
        }
    }
}

mod m20240315_000010_unique_active_delivery {
    use super::*;
    use sea_orm_migration::sea_orm::ConnectionTrait;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240315_000010_unique_active_delivery"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // partial index: finished deliveries may repeat per order, open ones may not
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS uq_delivery_tracking_active_order \
                     ON delivery_tracking (purchase_order_id) \
                     WHERE status IN ('pending', 'assigned', 'in_transit')",
                )
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .get_connection()
                .execute_unprepared("DROP INDEX IF EXISTS uq_delivery_tracking_active_order")
                .await?;
            Ok(())
        }
    }
}
