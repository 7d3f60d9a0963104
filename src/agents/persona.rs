use crate::agents::tools::AgentTool;
use crate::auth::Role;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Persona {
    Owner,
    Supplier,
    Customer,
    Driver,
}

const OWNER_TOOLS: &[AgentTool] = &[
    AgentTool::GetOrders,
    AgentTool::GetDeliveries,
    AgentTool::GetLowStock,
    AgentTool::GetProducts,
    AgentTool::UpdateDeliveryStatus,
];

const SUPPLIER_TOOLS: &[AgentTool] = &[
    AgentTool::GetOrders,
    AgentTool::GetLowStock,
    AgentTool::GetProducts,
];

const CUSTOMER_TOOLS: &[AgentTool] = &[
    AgentTool::GetOrders,
    AgentTool::GetDeliveries,
    AgentTool::GetProducts,
];

const DRIVER_TOOLS: &[AgentTool] = &[AgentTool::GetDeliveries, AgentTool::UpdateDeliveryStatus];

impl Persona {
    /// The persona the unified chat endpoint picks for a role
    pub fn from_role(role: Role) -> Self {
        match role {
            Role::Admin => Persona::Owner,
            Role::Supplier => Persona::Supplier,
            Role::Driver => Persona::Driver,
            Role::Client => Persona::Customer,
        }
    }

    /// Roles allowed to talk to this persona directly
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Persona::Owner => &[Role::Admin],
            Persona::Supplier => &[Role::Supplier, Role::Admin],
            Persona::Customer => &[Role::Client, Role::Admin],
            Persona::Driver => &[Role::Driver, Role::Admin],
        }
    }

    pub fn tools(self) -> &'static [AgentTool] {
        match self {
            Persona::Owner => OWNER_TOOLS,
            Persona::Supplier => SUPPLIER_TOOLS,
            Persona::Customer => CUSTOMER_TOOLS,
            Persona::Driver => DRIVER_TOOLS,
        }
    }

    pub fn has_tool(self, tool: AgentTool) -> bool {
        self.tools().contains(&tool)
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Persona::Owner => {
                "You are the operations assistant for the bakery owner. You can see every \
                 supplier, product, purchase order and delivery. Answer with concrete numbers \
                 from the provided data, flag products that need reordering and deliveries \
                 that look late. Keep answers short and actionable."
            }
            Persona::Supplier => {
                "You are an assistant for a bakery supplier. You only know about this \
                 supplier's products and purchase orders. Help them plan production, spot \
                 low stock and keep track of open orders. Never guess about other suppliers."
            }
            Persona::Customer => {
                "You are a friendly assistant for a bakery customer. Help them browse the \
                 menu, check on their orders and follow their deliveries. Only discuss the \
                 customer's own orders. Be warm and brief."
            }
            Persona::Driver => {
                "You are a dispatch assistant for a delivery driver. Summarise the driver's \
                 assigned deliveries, addresses and ETAs. When the driver reports a status \
                 change, confirm what was recorded. Keep replies short enough to read at a \
                 glance."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(Role::Admin, Persona::Owner)]
    #[case(Role::Supplier, Persona::Supplier)]
    #[case(Role::Driver, Persona::Driver)]
    #[case(Role::Client, Persona::Customer)]
    fn persona_follows_role(#[case] role: Role, #[case] expected: Persona) {
        assert_eq!(Persona::from_role(role), expected);
        assert!(expected.allowed_roles().contains(&role));
    }

    #[test]
    fn owner_is_admin_only() {
        assert_eq!(Persona::Owner.allowed_roles(), &[Role::Admin]);
    }

    #[test]
    fn tool_sets() {
        assert_eq!(Persona::Owner.tools().len(), 5);
        assert!(!Persona::Supplier.has_tool(AgentTool::GetDeliveries));
        assert!(!Persona::Customer.has_tool(AgentTool::GetLowStock));
        assert!(Persona::Driver.has_tool(AgentTool::UpdateDeliveryStatus));
        assert!(!Persona::Driver.has_tool(AgentTool::GetOrders));
    }

    #[test]
    fn parses_path_segment() {
        assert_eq!(Persona::from_str("Customer").ok(), Some(Persona::Customer));
        assert!(Persona::from_str("baker").is_err());
    }
}
