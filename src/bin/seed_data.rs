//! Seed data script - populates the database with bakery demo data
//!
//! Run with: cargo run --bin seed-data -- --database-url sqlite://bakery.db?mode=rwc
//!
//! This creates:
//! - 2 suppliers with 4 products each (a few already below their reorder point)
//! - 2 drivers
//! - one login per role
//! - client delivery addresses
//! - orders in various states, with deliveries

use chrono::{Duration, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::info;

use bakery_api::{
    auth::{AuthConfig, AuthService, AuthUser, Role, Scope},
    db::{establish_connection_with_config, run_migrations, DbConfig, DbPool},
    entities::{product, DeliveryStatus, PurchaseOrderStatus},
    events::{process_events, EventSender, EVENT_CHANNEL_CAPACITY},
    services::{
        addresses::{AddressService, CreateAddressRequest},
        deliveries::{CreateDeliveryRequest, DeliveryService, UpdateDeliveryStatusRequest},
        drivers::{CreateDriverRequest, DriverService},
        orders::{CreateOrderRequest, OrderItemRequest, OrderService, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductService},
        suppliers::{CreateSupplierRequest, SupplierService},
        users::{CreateUserRequest, UserService},
    },
};

#[derive(Debug, Parser)]
#[command(name = "seed-data", about = "Populate the bakery database with demo data")]
struct Args {
    /// Database connection URL
    #[arg(
        long,
        env = "APP__DATABASE_URL",
        default_value = "sqlite://bakery.db?mode=rwc"
    )]
    database_url: String,

    /// Password given to every demo account
    #[arg(long, default_value = "bakery-demo-pass")]
    password: String,

    /// Assume the schema already exists
    #[arg(long)]
    skip_migrations: bool,
}

struct Services {
    suppliers: SupplierService,
    products: ProductService,
    drivers: DriverService,
    users: UserService,
    addresses: AddressService,
    orders: OrderService,
    deliveries: DeliveryService,
}

impl Services {
    fn new(db: Arc<DbPool>) -> Self {
        let (events, rx) = EventSender::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(process_events(rx));
        let events = Arc::new(events);
        let auth = Arc::new(AuthService::new(
            AuthConfig::new(
                "seed-data-never-issues-tokens-000000".into(),
                "bakery-clients".into(),
                "bakery-api".into(),
                std::time::Duration::from_secs(3600),
            ),
            db.clone(),
        ));
        Self {
            suppliers: SupplierService::new(db.clone()),
            products: ProductService::new(db.clone(), events.clone()),
            drivers: DriverService::new(db.clone()),
            users: UserService::new(db.clone(), auth),
            addresses: AddressService::new(db.clone()),
            orders: OrderService::new(db.clone(), events.clone()),
            deliveries: DeliveryService::new(db, events),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    info!("=== Bakery API Seed Data ===");

    let db = establish_connection_with_config(&DbConfig {
        url: args.database_url.clone(),
        max_connections: 1,
        ..Default::default()
    })
    .await?;
    if !args.skip_migrations {
        run_migrations(&db).await?;
    }
    let svc = Services::new(Arc::new(db));

    info!("Creating suppliers and products...");
    let flour_mill = svc
        .suppliers
        .create_supplier(supplier("Stone Ground Mill", "Hannah Reed", "orders@stonegroundmill.test"))
        .await?;
    let dairy = svc
        .suppliers
        .create_supplier(supplier("Valley Dairy Co", "Marco Silva", "sales@valleydairy.test"))
        .await?;

    let mill_products = create_products(
        &svc,
        flour_mill.id,
        &[
            ("FLR-BRD-25", "Bread flour 25kg", "flour", "sack", dec!(31.50), 40, 10),
            ("FLR-RYE-10", "Dark rye flour 10kg", "flour", "sack", dec!(18.90), 4, 8),
            ("SRD-STR-1", "Sourdough starter", "starter", "jar", dec!(6.00), 12, 5),
            ("SED-MIX-5", "Seeded loaf mix 5kg", "mixes", "bag", dec!(14.25), 2, 6),
        ],
    )
    .await?;
    let dairy_products = create_products(
        &svc,
        dairy.id,
        &[
            ("BTR-UNS-5", "Unsalted butter 5kg", "dairy", "block", dec!(42.00), 15, 10),
            ("MLK-WHL-10", "Whole milk 10L", "dairy", "crate", dec!(12.80), 3, 12),
            ("CRM-DBL-2", "Double cream 2L", "dairy", "tub", dec!(9.40), 20, 6),
            ("EGG-FR-180", "Free-range eggs x180", "eggs", "tray", dec!(36.00), 9, 10),
        ],
    )
    .await?;
    info!(
        "  Created 2 suppliers and {} products",
        mill_products.len() + dairy_products.len()
    );

    info!("Creating drivers...");
    let van = svc.drivers.create_driver(driver("Sam Ortiz", "Ford Transit, white")).await?;
    let bike = svc.drivers.create_driver(driver("Priya Nair", "Cargo e-bike")).await?;

    info!("Creating one account per role...");
    let admin = svc
        .users
        .create_user(user("owner@bakery.test", "Bakery Owner", &args.password, Role::Admin, None, None))
        .await?;
    svc.users
        .create_user(user(
            "mill@bakery.test",
            "Stone Ground Mill",
            &args.password,
            Role::Supplier,
            Some(flour_mill.id),
            None,
        ))
        .await?;
    svc.users
        .create_user(user(
            "driver@bakery.test",
            "Sam Ortiz",
            &args.password,
            Role::Driver,
            None,
            Some(van.id),
        ))
        .await?;
    let client = svc
        .users
        .create_user(user("cafe@bakery.test", "Corner Cafe", &args.password, Role::Client, None, None))
        .await?;

    info!("Creating client addresses...");
    let client_scope = Scope::Client(client.id);
    let cafe = svc
        .addresses
        .create_address(
            client_scope,
            CreateAddressRequest {
                client_id: None,
                label: "Cafe".into(),
                street: "12 Market Street".into(),
                city: "Portland".into(),
                state: Some("OR".into()),
                postal_code: Some("97204".into()),
                latitude: Some(45.5202),
                longitude: Some(-122.6742),
                is_default: true,
            },
        )
        .await?;

    info!("Creating orders and deliveries...");
    let client_user = AuthUser {
        user_id: client.id,
        email: client.email.clone(),
        name: client.name.clone(),
        role: Role::Client,
        supplier_id: None,
        driver_id: None,
    };
    let admin_user = AuthUser {
        user_id: admin.id,
        email: admin.email.clone(),
        name: admin.name.clone(),
        role: Role::Admin,
        supplier_id: None,
        driver_id: None,
    };

    let pending = svc
        .orders
        .create_order(
            &client_user,
            order(flour_mill.id, &mill_products, &[(0, 2), (2, 1)], Some(cafe.id), 3),
        )
        .await?;
    let shipped = svc
        .orders
        .create_order(
            &client_user,
            order(dairy.id, &dairy_products, &[(0, 1), (3, 2)], Some(cafe.id), 1),
        )
        .await?;
    let delivered = svc
        .orders
        .create_order(
            &admin_user,
            order(flour_mill.id, &mill_products, &[(1, 5)], None, 0),
        )
        .await?;

    svc.orders
        .update_status(Scope::All, shipped.id, status(PurchaseOrderStatus::Confirmed))
        .await?;
    let in_transit = svc
        .deliveries
        .create_delivery(
            Scope::All,
            CreateDeliveryRequest {
                purchase_order_id: shipped.id,
                driver_id: Some(van.id),
                estimated_arrival: Some(Utc::now() + Duration::hours(2)),
                notes: Some("Use the side door".into()),
            },
        )
        .await?;
    svc.deliveries
        .update_status(Scope::All, in_transit.id, delivery_status(DeliveryStatus::InTransit))
        .await?;

    svc.orders
        .update_status(Scope::All, delivered.id, status(PurchaseOrderStatus::Confirmed))
        .await?;
    let done = svc
        .deliveries
        .create_delivery(
            Scope::All,
            CreateDeliveryRequest {
                purchase_order_id: delivered.id,
                driver_id: Some(bike.id),
                estimated_arrival: None,
                notes: None,
            },
        )
        .await?;
    svc.deliveries
        .update_status(Scope::All, done.id, delivery_status(DeliveryStatus::Delivered))
        .await?;

    info!(
        pending = %pending.po_number,
        shipped = %shipped.po_number,
        delivered = %delivered.po_number,
        "  Created 3 orders"
    );

    info!("=== Seed Data Complete ===");
    info!("Log in with any of owner@, mill@, driver@ or cafe@bakery.test");
    info!("  curl -X POST http://localhost:8080/auth/login -d '{{\"email\":\"owner@bakery.test\",\"password\":\"...\"}}'");

    Ok(())
}

fn supplier(name: &str, contact: &str, email: &str) -> CreateSupplierRequest {
    CreateSupplierRequest {
        name: name.into(),
        contact_name: Some(contact.into()),
        email: Some(email.into()),
        phone: None,
        address: None,
    }
}

fn driver(name: &str, vehicle: &str) -> CreateDriverRequest {
    CreateDriverRequest {
        name: name.into(),
        phone: None,
        vehicle_description: Some(vehicle.into()),
        license_number: None,
    }
}

fn user(
    email: &str,
    name: &str,
    password: &str,
    role: Role,
    supplier_id: Option<uuid::Uuid>,
    driver_id: Option<uuid::Uuid>,
) -> CreateUserRequest {
    CreateUserRequest {
        email: email.into(),
        name: name.into(),
        password: password.into(),
        role,
        supplier_id,
        driver_id,
    }
}

type ProductRow<'a> = (&'a str, &'a str, &'a str, &'a str, Decimal, i32, i32);

async fn create_products(
    svc: &Services,
    supplier_id: uuid::Uuid,
    rows: &[ProductRow<'_>],
) -> anyhow::Result<Vec<product::Model>> {
    let mut created = Vec::with_capacity(rows.len());
    for (sku, name, category, unit, price, stock, reorder) in rows {
        let model = svc
            .products
            .create_product(
                Scope::All,
                CreateProductRequest {
                    supplier_id: Some(supplier_id),
                    sku: (*sku).into(),
                    name: (*name).into(),
                    description: None,
                    category: Some((*category).into()),
                    unit: Some((*unit).into()),
                    unit_price: *price,
                    stock_quantity: *stock,
                    reorder_point: *reorder,
                },
            )
            .await?;
        created.push(model);
    }
    Ok(created)
}

fn order(
    supplier_id: uuid::Uuid,
    products: &[product::Model],
    lines: &[(usize, i32)],
    delivery_address_id: Option<uuid::Uuid>,
    days_out: i64,
) -> CreateOrderRequest {
    CreateOrderRequest {
        supplier_id,
        items: lines
            .iter()
            .filter_map(|(idx, quantity)| {
                products.get(*idx).map(|p| OrderItemRequest {
                    product_id: p.id,
                    quantity: *quantity,
                })
            })
            .collect(),
        delivery_address_id,
        expected_delivery_date: Some((Utc::now() + Duration::days(days_out)).date_naive()),
        notes: None,
    }
}

fn status(status: PurchaseOrderStatus) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status,
        notes: None,
    }
}

fn delivery_status(status: DeliveryStatus) -> UpdateDeliveryStatusRequest {
    UpdateDeliveryStatusRequest {
        status,
        notes: None,
    }
}
