use crate::{
    agents::persona::Persona,
    auth::Scope,
    entities::DeliveryStatus,
    errors::ServiceError,
    services::{
        deliveries::{DeliveryFilter, DeliveryService, UpdateDeliveryStatusRequest},
        orders::{OrderFilter, OrderService},
        products::{ProductFilter, ProductService},
        PageRequest,
    },
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumString};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Rows handed to the model per tool call
const TOOL_RESULT_LIMIT: u64 = 25;

lazy_static! {
    static ref UUID_RE: Regex = Regex::new(
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"
    )
    .unwrap_or_else(|e| panic!("invalid uuid pattern: {}", e));
    static ref DELIVERY_WORDS_RE: Regex = Regex::new(r"\b(deliver\w*|drivers?|routes?|eta)\b")
        .unwrap_or_else(|e| panic!("invalid delivery pattern: {}", e));
    static ref PRODUCT_WORDS_RE: Regex = Regex::new(r"\b(products?|menu|breads?|prices?|pricing)\b")
        .unwrap_or_else(|e| panic!("invalid product pattern: {}", e));
    static ref ORDER_WORDS_RE: Regex = Regex::new(r"\b(orders?|ordered|purchases?)\b")
        .unwrap_or_else(|e| panic!("invalid order pattern: {}", e));
    static ref LOW_STOCK_WORDS_RE: Regex = Regex::new(r"\b(low[ -]stock|reorder\w*|running out)\b")
        .unwrap_or_else(|e| panic!("invalid low stock pattern: {}", e));
    static ref UPDATE_WORDS_RE: Regex = Regex::new(r"\b(update|mark)\b")
        .unwrap_or_else(|e| panic!("invalid update pattern: {}", e));
    // an optional negation in front of the status phrase
    static ref STATUS_WORDS_RE: Regex = Regex::new(
        r"\b(?:(not|never|\w+n't)\s+)?(in[ _]transit|on the way|picked up|delivered|failed)\b"
    )
    .unwrap_or_else(|e| panic!("invalid status pattern: {}", e));
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentTool {
    GetOrders,
    GetDeliveries,
    GetLowStock,
    GetProducts,
    UpdateDeliveryStatus,
}

impl AgentTool {
    pub fn description(self) -> &'static str {
        match self {
            AgentTool::GetOrders => "List the purchase orders visible to you",
            AgentTool::GetDeliveries => "List deliveries with their status and ETA",
            AgentTool::GetLowStock => "Products whose stock is below the reorder point",
            AgentTool::GetProducts => "Browse products and prices",
            AgentTool::UpdateDeliveryStatus => {
                "Record a delivery status, e.g. \"mark <delivery id> delivered\""
            }
        }
    }
}

/// A selected tool together with the arguments parsed out of the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCall {
    GetOrders,
    GetDeliveries,
    GetLowStock,
    GetProducts,
    UpdateDeliveryStatus {
        delivery_id: Uuid,
        status: DeliveryStatus,
    },
}

impl ToolCall {
    pub fn tool(&self) -> AgentTool {
        match self {
            ToolCall::GetOrders => AgentTool::GetOrders,
            ToolCall::GetDeliveries => AgentTool::GetDeliveries,
            ToolCall::GetLowStock => AgentTool::GetLowStock,
            ToolCall::GetProducts => AgentTool::GetProducts,
            ToolCall::UpdateDeliveryStatus { .. } => AgentTool::UpdateDeliveryStatus,
        }
    }
}

/// The last status phrase that is not negated wins
fn status_word(message: &str) -> Option<DeliveryStatus> {
    STATUS_WORDS_RE
        .captures_iter(message)
        .filter(|caps| caps.get(1).is_none())
        .filter_map(|caps| match caps.get(2)?.as_str() {
            "delivered" => Some(DeliveryStatus::Delivered),
            "failed" => Some(DeliveryStatus::Failed),
            _ => Some(DeliveryStatus::InTransit),
        })
        .last()
}

fn delivery_update(message: &str) -> Option<ToolCall> {
    if !UPDATE_WORDS_RE.is_match(message) {
        return None;
    }
    let delivery_id = UUID_RE
        .find(message)
        .and_then(|m| Uuid::from_str(m.as_str()).ok())?;
    let status = status_word(message)?;
    Some(ToolCall::UpdateDeliveryStatus {
        delivery_id,
        status,
    })
}

/// Keyword dispatch, in priority order. Tools the persona lacks are skipped.
pub fn select_tool(persona: Persona, message: &str) -> Option<ToolCall> {
    let message = message.to_lowercase();

    let candidates = [
        delivery_update(&message),
        LOW_STOCK_WORDS_RE
            .is_match(&message)
            .then_some(ToolCall::GetLowStock),
        DELIVERY_WORDS_RE
            .is_match(&message)
            .then_some(ToolCall::GetDeliveries),
        ORDER_WORDS_RE.is_match(&message).then_some(ToolCall::GetOrders),
        PRODUCT_WORDS_RE
            .is_match(&message)
            .then_some(ToolCall::GetProducts),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|call| persona.has_tool(call.tool()))
}

/// Runs tool calls against the regular services with the caller's scope
#[derive(Clone)]
pub struct ToolExecutor {
    orders: Arc<OrderService>,
    deliveries: Arc<DeliveryService>,
    products: Arc<ProductService>,
}

impl ToolExecutor {
    pub fn new(
        orders: Arc<OrderService>,
        deliveries: Arc<DeliveryService>,
        products: Arc<ProductService>,
    ) -> Self {
        Self {
            orders,
            deliveries,
            products,
        }
    }

    /// Client-side failures (missing delivery, bad transition) are returned
    /// as an `error` object so the model can explain them; server failures
    /// propagate.
    #[instrument(skip(self), fields(tool = %call.tool()))]
    pub async fn execute(&self, scope: Scope, call: ToolCall) -> Result<Value, ServiceError> {
        match self.run(scope, call).await {
            Ok(value) => Ok(value),
            Err(err) if err.status_code().is_client_error() => {
                warn!(error = %err, "agent tool rejected");
                Ok(json!({ "error": err.response_message() }))
            }
            Err(err) => Err(err),
        }
    }

    async fn run(&self, scope: Scope, call: ToolCall) -> Result<Value, ServiceError> {
        let page = PageRequest::new(1, TOOL_RESULT_LIMIT);
        let value = match call {
            ToolCall::GetOrders => {
                let orders = self
                    .orders
                    .list_orders(scope, OrderFilter::default(), page)
                    .await?;
                json!({ "total": orders.total, "orders": orders.items })
            }
            ToolCall::GetDeliveries => {
                let deliveries = self
                    .deliveries
                    .list_deliveries(scope, DeliveryFilter::default(), page)
                    .await?;
                json!({ "total": deliveries.total, "deliveries": deliveries.items })
            }
            ToolCall::GetLowStock => {
                let products = self.products.low_stock(scope).await?;
                json!({ "total": products.len(), "products": products })
            }
            ToolCall::GetProducts => {
                let products = self
                    .products
                    .list_products(scope, ProductFilter::default(), page)
                    .await?;
                json!({ "total": products.total, "products": products.items })
            }
            ToolCall::UpdateDeliveryStatus {
                delivery_id,
                status,
            } => {
                let delivery = self
                    .deliveries
                    .update_status(
                        scope,
                        delivery_id,
                        UpdateDeliveryStatusRequest {
                            status,
                            notes: None,
                        },
                    )
                    .await?;
                info!(delivery_id = %delivery_id, status = %status, "delivery updated by agent");
                json!({ "updated": delivery })
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DELIVERY_ID: &str = "6f1c2d3e-4b5a-4c6d-8e7f-90a1b2c3d4e5";

    #[rstest]
    #[case(Persona::Owner, "Which products are running out?", Some(AgentTool::GetLowStock))]
    #[case(Persona::Owner, "what needs a reorder this week", Some(AgentTool::GetLowStock))]
    #[case(Persona::Owner, "Where is the driver on route 4?", Some(AgentTool::GetDeliveries))]
    #[case(Persona::Owner, "show me today's orders", Some(AgentTool::GetOrders))]
    #[case(Persona::Customer, "what bread do you have?", Some(AgentTool::GetProducts))]
    #[case(Persona::Customer, "what's the ETA?", Some(AgentTool::GetDeliveries))]
    #[case(Persona::Supplier, "any low stock items?", Some(AgentTool::GetLowStock))]
    #[case(Persona::Supplier, "when is my delivery?", None)]
    #[case(Persona::Customer, "anything low stock?", None)]
    #[case(Persona::Driver, "how many orders today", None)]
    #[case(Persona::Owner, "hello there", None)]
    #[case(Persona::Owner, "show me the details", None)]
    fn keyword_dispatch(
        #[case] persona: Persona,
        #[case] message: &str,
        #[case] expected: Option<AgentTool>,
    ) {
        assert_eq!(select_tool(persona, message).map(|c| c.tool()), expected);
    }

    #[test]
    fn delivery_update_parses_id_and_status() {
        let message = format!("Please mark {} as DELIVERED", DELIVERY_ID.to_uppercase());
        let call = select_tool(Persona::Driver, &message);
        assert_eq!(
            call,
            Some(ToolCall::UpdateDeliveryStatus {
                delivery_id: Uuid::parse_str(DELIVERY_ID).unwrap(),
                status: DeliveryStatus::Delivered,
            })
        );
    }

    #[test]
    fn delivery_update_needs_a_status_word() {
        let message = format!("update {} please", DELIVERY_ID);
        assert_eq!(select_tool(Persona::Driver, &message), None);
        assert_eq!(
            select_tool(Persona::Owner, &format!("mark {} in transit", DELIVERY_ID)),
            Some(ToolCall::UpdateDeliveryStatus {
                delivery_id: Uuid::parse_str(DELIVERY_ID).unwrap(),
                status: DeliveryStatus::InTransit,
            })
        );
    }

    #[rstest]
    #[case("not delivered yet, it failed", Some(DeliveryStatus::Failed))]
    #[case("failed this morning, delivered on the second try", Some(DeliveryStatus::Delivered))]
    #[case("it wasn't delivered", None)]
    #[case("picked up from the bakery", Some(DeliveryStatus::InTransit))]
    #[case("undelivered", None)]
    fn status_words_respect_negation_and_order(
        #[case] message: &str,
        #[case] expected: Option<DeliveryStatus>,
    ) {
        assert_eq!(status_word(message), expected);
    }

    #[test]
    fn update_words_must_stand_alone() {
        let bookmark = format!("bookmark {} delivered", DELIVERY_ID);
        assert_eq!(
            select_tool(Persona::Driver, &bookmark).map(|c| c.tool()),
            Some(AgentTool::GetDeliveries)
        );
        let market = format!("the market run for {} delivered", DELIVERY_ID);
        assert_ne!(
            select_tool(Persona::Driver, &market).map(|c| c.tool()),
            Some(AgentTool::UpdateDeliveryStatus)
        );
        let failed = format!("update {}: not delivered yet, it failed", DELIVERY_ID);
        assert_eq!(
            select_tool(Persona::Driver, &failed),
            Some(ToolCall::UpdateDeliveryStatus {
                delivery_id: Uuid::parse_str(DELIVERY_ID).unwrap(),
                status: DeliveryStatus::Failed,
            })
        );
    }

    #[test]
    fn update_skipped_for_personas_without_the_tool() {
        let message = format!("mark {} delivered", DELIVERY_ID);
        // falls through to the delivery listing, which suppliers lack as well
        assert_eq!(select_tool(Persona::Supplier, &message), None);
        assert_eq!(
            select_tool(Persona::Customer, &message).map(|c| c.tool()),
            Some(AgentTool::GetDeliveries)
        );
    }

    #[test]
    fn tool_names_are_snake_case() {
        assert_eq!(AgentTool::UpdateDeliveryStatus.to_string(), "update_delivery_status");
        assert_eq!(
            serde_json::to_value(AgentTool::GetLowStock).unwrap(),
            json!("get_low_stock")
        );
    }
}
