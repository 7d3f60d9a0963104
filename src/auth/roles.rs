use crate::errors::ServiceError;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account role. Stored lower-case, parsed case-insensitively.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "supplier")]
    Supplier,
    #[sea_orm(string_value = "driver")]
    Driver,
    #[sea_orm(string_value = "client")]
    Client,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Supplier, Role::Driver, Role::Client];
}

/// True when `role` is one of `allowed`.
pub fn role_allowed(role: Role, allowed: &[Role]) -> bool {
    allowed.contains(&role)
}

/// Tenant filter derived from the caller. Every list query narrows by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Supplier(Uuid),
    Driver(Uuid),
    Client(Uuid),
}

impl Scope {
    /// Builds the scope for a role and its tenant ids.
    ///
    /// Supplier and driver accounts without their tenant id have no scope at all.
    pub fn for_role(
        role: Role,
        user_id: Uuid,
        supplier_id: Option<Uuid>,
        driver_id: Option<Uuid>,
    ) -> Result<Self, ServiceError> {
        match role {
            Role::Admin => Ok(Scope::All),
            Role::Client => Ok(Scope::Client(user_id)),
            Role::Supplier => supplier_id.map(Scope::Supplier).ok_or_else(|| {
                ServiceError::Forbidden("supplier account is not linked to a supplier".into())
            }),
            Role::Driver => driver_id.map(Scope::Driver).ok_or_else(|| {
                ServiceError::Forbidden("driver account is not linked to a driver".into())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::str::FromStr;

    #[test]
    fn parses_roles_case_insensitively() {
        assert_eq!(Role::from_str("ADMIN").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("Driver").unwrap(), Role::Driver);
        assert!(Role::from_str("baker").is_err());
        assert_eq!(Role::Client.to_string(), "client");
    }

    #[test]
    fn role_allowed_checks_membership() {
        assert!(role_allowed(Role::Admin, &[Role::Admin, Role::Supplier]));
        assert!(!role_allowed(Role::Client, &[Role::Admin, Role::Supplier]));
        assert!(!role_allowed(Role::Driver, &[]));
    }

    #[test]
    fn scope_requires_tenant_ids() {
        let user = Uuid::new_v4();
        let supplier = Uuid::new_v4();
        assert_eq!(
            Scope::for_role(Role::Supplier, user, Some(supplier), None).unwrap(),
            Scope::Supplier(supplier)
        );
        assert_matches!(
            Scope::for_role(Role::Supplier, user, None, None),
            Err(ServiceError::Forbidden(_))
        );
        assert_matches!(
            Scope::for_role(Role::Driver, user, None, None),
            Err(ServiceError::Forbidden(_))
        );
        assert_eq!(
            Scope::for_role(Role::Client, user, None, None).unwrap(),
            Scope::Client(user)
        );
        assert_eq!(
            Scope::for_role(Role::Admin, user, None, None).unwrap(),
            Scope::All
        );
    }
}
