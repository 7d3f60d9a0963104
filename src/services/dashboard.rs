use crate::{
    auth::Scope,
    db::DbPool,
    entities::{
        delivery_tracking, driver, product, purchase_order, supplier, DeliveryStatus,
        PurchaseOrderStatus,
    },
    errors::ServiceError,
    services::{deliveries::delivery_scope_condition, orders::order_scope_condition, products::ProductService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const ORDER_STATUSES: [PurchaseOrderStatus; 5] = [
    PurchaseOrderStatus::Pending,
    PurchaseOrderStatus::Confirmed,
    PurchaseOrderStatus::Shipped,
    PurchaseOrderStatus::Delivered,
    PurchaseOrderStatus::Cancelled,
];

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub products: u64,
    pub low_stock_products: u64,
    pub suppliers: u64,
    pub drivers: u64,
    pub orders_by_status: BTreeMap<String, u64>,
    pub active_deliveries: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierDashboard {
    pub supplier_id: Uuid,
    pub orders_by_status: BTreeMap<String, u64>,
    pub low_stock_products: Vec<product::Model>,
    #[schema(value_type = String)]
    pub delivered_revenue: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DriverDashboard {
    pub driver_id: Uuid,
    pub active_deliveries: Vec<delivery_tracking::Model>,
    pub completed_today: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientDashboard {
    pub orders_by_status: BTreeMap<String, u64>,
    pub recent_orders: Vec<purchase_order::Model>,
}

/// Role-specific summary, tagged with the caller's role
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Admin(AdminDashboard),
    Supplier(SupplierDashboard),
    Driver(DriverDashboard),
    Client(ClientDashboard),
}

#[derive(Clone)]
pub struct DashboardService {
    db_pool: Arc<DbPool>,
    products: Arc<ProductService>,
}

impl DashboardService {
    pub fn new(db_pool: Arc<DbPool>, products: Arc<ProductService>) -> Self {
        Self { db_pool, products }
    }

    pub async fn summary(&self, scope: Scope) -> Result<Dashboard, ServiceError> {
        match scope {
            Scope::All => self.admin().await.map(Dashboard::Admin),
            Scope::Supplier(id) => self.supplier(id).await.map(Dashboard::Supplier),
            Scope::Driver(id) => self.driver(id).await.map(Dashboard::Driver),
            Scope::Client(id) => self.client(id).await.map(Dashboard::Client),
        }
    }

    async fn orders_by_status(&self, scope: Scope) -> Result<BTreeMap<String, u64>, ServiceError> {
        let mut counts = BTreeMap::new();
        for status in ORDER_STATUSES {
            let count = purchase_order::Entity::find()
                .filter(order_scope_condition(scope))
                .filter(purchase_order::Column::Status.eq(status))
                .count(&*self.db_pool)
                .await?;
            counts.insert(status.to_string(), count);
        }
        Ok(counts)
    }

    async fn admin(&self) -> Result<AdminDashboard, ServiceError> {
        let db = &*self.db_pool;
        Ok(AdminDashboard {
            products: product::Entity::find().count(db).await?,
            low_stock_products: self.products.low_stock(Scope::All).await?.len() as u64,
            suppliers: supplier::Entity::find().count(db).await?,
            drivers: driver::Entity::find()
                .filter(driver::Column::IsActive.eq(true))
                .count(db)
                .await?,
            orders_by_status: self.orders_by_status(Scope::All).await?,
            active_deliveries: delivery_tracking::Entity::find()
                .filter(delivery_tracking::Column::Status.is_in(DeliveryStatus::active_statuses()))
                .count(db)
                .await?,
        })
    }

    async fn supplier(&self, supplier_id: Uuid) -> Result<SupplierDashboard, ServiceError> {
        let scope = Scope::Supplier(supplier_id);
        let delivered = purchase_order::Entity::find()
            .filter(order_scope_condition(scope))
            .filter(purchase_order::Column::Status.eq(PurchaseOrderStatus::Delivered))
            .all(&*self.db_pool)
            .await?;

        Ok(SupplierDashboard {
            supplier_id,
            orders_by_status: self.orders_by_status(scope).await?,
            low_stock_products: self.products.low_stock(scope).await?,
            delivered_revenue: delivered.iter().map(|o| o.total_amount).sum(),
        })
    }

    async fn driver(&self, driver_id: Uuid) -> Result<DriverDashboard, ServiceError> {
        let db = &*self.db_pool;
        let scope = Scope::Driver(driver_id);
        let start_of_day = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or_else(Utc::now);

        Ok(DriverDashboard {
            driver_id,
            active_deliveries: delivery_tracking::Entity::find()
                .filter(delivery_scope_condition(scope))
                .filter(delivery_tracking::Column::Status.is_in(DeliveryStatus::active_statuses()))
                .order_by_asc(delivery_tracking::Column::EstimatedArrival)
                .all(db)
                .await?,
            completed_today: delivery_tracking::Entity::find()
                .filter(delivery_scope_condition(scope))
                .filter(delivery_tracking::Column::Status.eq(DeliveryStatus::Delivered))
                .filter(delivery_tracking::Column::DeliveredAt.gte(start_of_day))
                .count(db)
                .await?,
        })
    }

    async fn client(&self, user_id: Uuid) -> Result<ClientDashboard, ServiceError> {
        let scope = Scope::Client(user_id);
        Ok(ClientDashboard {
            orders_by_status: self.orders_by_status(scope).await?,
            recent_orders: purchase_order::Entity::find()
                .filter(order_scope_condition(scope))
                .order_by_desc(purchase_order::Column::CreatedAt)
                .limit(5)
                .all(&*self.db_pool)
                .await?,
        })
    }
}
