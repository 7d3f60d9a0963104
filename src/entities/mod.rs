pub mod client_address;
pub mod delivery_tracking;
pub mod driver;
pub mod order_item;
pub mod product;
pub mod purchase_order;
pub mod supplier;
pub mod user;

pub use delivery_tracking::DeliveryStatus;
pub use purchase_order::PurchaseOrderStatus;
