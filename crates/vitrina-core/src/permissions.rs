//! # Permissions
//!
//! Role permission maps, built-in role templates and the permission-gated
//! menu visibility.
//!
//! ## Effective Permissions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Role.permissions  ∪  User.extra_permissions  =  effective set         │
//! │                                                                         │
//! │   effective set ──► require(Permission)        (endpoint gate)          │
//! │                 ──► visible_sections()         (menu the client shows)  │
//! │                 ──► can_access_store()         (store scoping)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Permission
// =============================================================================

/// A single capability that can be granted to a role or a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageUsers,
    ManageRoles,
    ManageStores,
    ManageProducts,
    AdjustStock,
    ReceiveInvoices,
    Sell,
    SellOnline,
    SellLayaway,
    VoidSales,
    OpenRegister,
    CloseRegister,
    CreateTransfers,
    ValidateTransfers,
    ViewReports,
    /// Act on any store instead of only the assigned one.
    AllStores,
}

impl Permission {
    /// Every permission, in declaration order.
    pub const ALL: [Permission; 16] = [
        Permission::ManageUsers,
        Permission::ManageRoles,
        Permission::ManageStores,
        Permission::ManageProducts,
        Permission::AdjustStock,
        Permission::ReceiveInvoices,
        Permission::Sell,
        Permission::SellOnline,
        Permission::SellLayaway,
        Permission::VoidSales,
        Permission::OpenRegister,
        Permission::CloseRegister,
        Permission::CreateTransfers,
        Permission::ValidateTransfers,
        Permission::ViewReports,
        Permission::AllStores,
    ];

    /// The wire name (`snake_case`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ManageRoles => "manage_roles",
            Permission::ManageStores => "manage_stores",
            Permission::ManageProducts => "manage_products",
            Permission::AdjustStock => "adjust_stock",
            Permission::ReceiveInvoices => "receive_invoices",
            Permission::Sell => "sell",
            Permission::SellOnline => "sell_online",
            Permission::SellLayaway => "sell_layaway",
            Permission::VoidSales => "void_sales",
            Permission::OpenRegister => "open_register",
            Permission::CloseRegister => "close_register",
            Permission::CreateTransfers => "create_transfers",
            Permission::ValidateTransfers => "validate_transfers",
            Permission::ViewReports => "view_reports",
            Permission::AllStores => "all_stores",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Permission Set
// =============================================================================

/// An ordered set of permissions.
///
/// Serialized as a JSON array of permission names, which is also how the
/// database stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        PermissionSet(BTreeSet::new())
    }

    /// A set holding every permission.
    pub fn all() -> Self {
        Permission::ALL.iter().copied().collect()
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn grant(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    pub fn revoke(&mut self, permission: Permission) {
        self.0.remove(&permission);
    }

    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        PermissionSet(self.0.union(&other.0).copied().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Permission> {
        self.0.iter().copied().collect()
    }

    /// Fails with `PermissionDenied` unless the permission is held.
    pub fn require(&self, permission: Permission) -> CoreResult<()> {
        if self.contains(permission) {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied(permission))
        }
    }

    /// Fails unless at least one of the permissions is held.
    pub fn require_any(&self, permissions: &[Permission]) -> CoreResult<()> {
        match permissions.iter().find(|p| self.contains(**p)) {
            Some(_) => Ok(()),
            None => Err(CoreError::PermissionDenied(
                permissions.first().copied().unwrap_or(Permission::AllStores),
            )),
        }
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        PermissionSet(iter.into_iter().collect())
    }
}

impl From<Vec<Permission>> for PermissionSet {
    fn from(permissions: Vec<Permission>) -> Self {
        permissions.into_iter().collect()
    }
}

// =============================================================================
// Built-in Roles
// =============================================================================

/// Role templates seeded on a fresh database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTemplate {
    Administrator,
    Manager,
    Cashier,
}

impl RoleTemplate {
    pub const ALL: [RoleTemplate; 3] = [
        RoleTemplate::Administrator,
        RoleTemplate::Manager,
        RoleTemplate::Cashier,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RoleTemplate::Administrator => "administrator",
            RoleTemplate::Manager => "manager",
            RoleTemplate::Cashier => "cashier",
        }
    }

    pub fn permissions(&self) -> PermissionSet {
        match self {
            RoleTemplate::Administrator => PermissionSet::all(),
            RoleTemplate::Manager => Permission::ALL
                .iter()
                .copied()
                .filter(|p| {
                    !matches!(
                        p,
                        Permission::ManageUsers | Permission::ManageRoles | Permission::ManageStores
                    )
                })
                .collect(),
            RoleTemplate::Cashier => [
                Permission::Sell,
                Permission::SellOnline,
                Permission::SellLayaway,
                Permission::OpenRegister,
                Permission::CloseRegister,
                Permission::ValidateTransfers,
            ]
            .into_iter()
            .collect(),
        }
    }
}

// =============================================================================
// Menu Visibility
// =============================================================================

/// A section of the client's navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Sales,
    Register,
    Inventory,
    Invoices,
    Transfers,
    Reports,
    Users,
    Roles,
    Stores,
}

impl Section {
    /// Permissions of which at least one unlocks the section.
    fn unlocked_by(&self) -> &'static [Permission] {
        match self {
            Section::Sales => &[Permission::Sell, Permission::SellOnline, Permission::SellLayaway],
            Section::Register => &[Permission::OpenRegister, Permission::CloseRegister],
            Section::Inventory => &[Permission::ManageProducts, Permission::AdjustStock],
            Section::Invoices => &[Permission::ReceiveInvoices],
            Section::Transfers => &[Permission::CreateTransfers, Permission::ValidateTransfers],
            Section::Reports => &[Permission::ViewReports],
            Section::Users => &[Permission::ManageUsers],
            Section::Roles => &[Permission::ManageRoles],
            Section::Stores => &[Permission::ManageStores],
        }
    }
}

/// Returns the menu sections visible to a permission set.
pub fn visible_sections(permissions: &PermissionSet) -> Vec<Section> {
    [
        Section::Sales,
        Section::Register,
        Section::Inventory,
        Section::Invoices,
        Section::Transfers,
        Section::Reports,
        Section::Users,
        Section::Roles,
        Section::Stores,
    ]
    .into_iter()
    .filter(|s| s.unlocked_by().iter().any(|p| permissions.contains(*p)))
    .collect()
}

// =============================================================================
// Store Scoping
// =============================================================================

/// Whether a user may act on `store_id`.
///
/// Users holding `all_stores` may act anywhere; everyone else only on the
/// store they are assigned to.
pub fn can_access_store(
    permissions: &PermissionSet,
    assigned_store: Option<&str>,
    store_id: &str,
) -> bool {
    permissions.contains(Permission::AllStores) || assigned_store == Some(store_id)
}

/// Like [`can_access_store`] but returns `StoreAccessDenied`.
pub fn ensure_store_access(
    permissions: &PermissionSet,
    assigned_store: Option<&str>,
    store_id: &str,
) -> CoreResult<()> {
    if can_access_store(permissions, assigned_store, store_id) {
        Ok(())
    } else {
        Err(CoreError::StoreAccessDenied {
            store_id: store_id.to_string(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_administrator_sees_everything() {
        let perms = RoleTemplate::Administrator.permissions();
        assert_eq!(perms.len(), Permission::ALL.len());
        assert_eq!(visible_sections(&perms).len(), 9);
    }

    #[test]
    fn test_cashier_menu() {
        let perms = RoleTemplate::Cashier.permissions();
        assert_eq!(
            visible_sections(&perms),
            vec![Section::Sales, Section::Register, Section::Transfers]
        );
        assert!(perms.require(Permission::ViewReports).is_err());
        assert!(perms.require(Permission::Sell).is_ok());
    }

    #[test]
    fn test_manager_cannot_manage_users() {
        let perms = RoleTemplate::Manager.permissions();
        assert!(!perms.contains(Permission::ManageUsers));
        assert!(!perms.contains(Permission::ManageRoles));
        assert!(perms.contains(Permission::ViewReports));
        assert!(!visible_sections(&perms).contains(&Section::Users));
    }

    #[test]
    fn test_union_with_extra_flags() {
        let role = RoleTemplate::Cashier.permissions();
        let extra: PermissionSet = vec![Permission::ViewReports].into();
        let effective = role.union(&extra);

        assert!(effective.contains(Permission::ViewReports));
        assert!(visible_sections(&effective).contains(&Section::Reports));
    }

    #[test]
    fn test_empty_set_sees_nothing() {
        assert!(visible_sections(&PermissionSet::new()).is_empty());
    }

    #[test]
    fn test_store_scoping() {
        let cashier = RoleTemplate::Cashier.permissions();
        assert!(can_access_store(&cashier, Some("s1"), "s1"));
        assert!(!can_access_store(&cashier, Some("s1"), "s2"));
        assert!(!can_access_store(&cashier, None, "s1"));
        assert!(ensure_store_access(&cashier, Some("s1"), "s2").is_err());

        let admin = RoleTemplate::Administrator.permissions();
        assert!(can_access_store(&admin, None, "s2"));
    }

    #[test]
    fn test_serializes_as_name_list() {
        let set: PermissionSet = vec![Permission::Sell, Permission::AllStores].into();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["sell","all_stores"]"#);

        let back: PermissionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut set = PermissionSet::new();
        set.grant(Permission::Sell);
        assert!(set.contains(Permission::Sell));
        set.revoke(Permission::Sell);
        assert!(set.is_empty());
    }
}
