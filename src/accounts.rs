use dashmap::DashMap;
use serde::{Serialize, Deserialize};
use vfs_lib::ids;

use crate::config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Anonymous,
    User,
    TenantAdmin,
    SuperAdmin,
}

#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: ids::UserId,
    pub tenant_id: ids::TenantId,
    /// None falls back to the tenant default
    pub space_limit: Option<u64>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct TenantAccount {
    pub id: ids::TenantId,
    /// cap on the corporate storage and on the sum of user limits. 0 is
    /// unlimited
    pub space_limit: u64,
    /// default limit for users that do not specify one. 0 is unlimited
    pub user_space_limit: u64,
}

/// identity and tenant lookups used for resolving storage roots and limits
pub trait Accounts: Send + Sync {
    fn user(&self, id: &ids::UserId) -> Option<UserAccount>;

    fn tenant(&self, id: &ids::TenantId) -> Option<TenantAccount>;

    fn users_in_tenant(&self, id: &ids::TenantId) -> Vec<UserAccount>;

    /// returns false if the user does not exist
    fn set_user_limit(&self, id: &ids::UserId, limit: u64) -> bool;

    /// limits changed after the accounts were loaded
    fn changed_limits(&self) -> Vec<UserLimit> {
        Vec::new()
    }
}

/// a user limit set at runtime. stored so it outlives the process and is
/// applied over the limits from the settings files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLimit {
    pub user_id: ids::UserId,
    pub space_limit: u64,
}

/// accounts loaded from the settings files
#[derive(Debug, Default)]
pub struct ConfigAccounts {
    users: DashMap<ids::UserId, UserAccount>,
    tenants: DashMap<ids::TenantId, TenantAccount>,
    changed: DashMap<ids::UserId, u64>,
}

impl ConfigAccounts {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_settings(settings: &config::Settings) -> Self {
        let rtn = ConfigAccounts::new();

        for tenant in settings.tenants.values() {
            rtn.add_tenant(TenantAccount {
                id: tenant.id,
                space_limit: tenant.space_limit,
                user_space_limit: tenant.user_space_limit,
            });
        }

        for user in settings.users.values() {
            rtn.add_user(UserAccount {
                id: user.id,
                tenant_id: user.tenant,
                space_limit: user.space_limit,
                role: user.role,
            });
        }

        rtn
    }

    /// users referencing an unknown tenant get an unlimited one created
    pub fn add_user(&self, user: UserAccount) {
        if !self.tenants.contains_key(&user.tenant_id) {
            self.add_tenant(TenantAccount {
                id: user.tenant_id,
                space_limit: 0,
                user_space_limit: 0,
            });
        }

        self.users.insert(user.id, user);
    }

    pub fn add_tenant(&self, tenant: TenantAccount) {
        self.tenants.insert(tenant.id, tenant);
    }
}

impl Accounts for ConfigAccounts {
    fn user(&self, id: &ids::UserId) -> Option<UserAccount> {
        self.users.get(id).map(|found| found.value().clone())
    }

    fn tenant(&self, id: &ids::TenantId) -> Option<TenantAccount> {
        self.tenants.get(id).map(|found| found.value().clone())
    }

    fn users_in_tenant(&self, id: &ids::TenantId) -> Vec<UserAccount> {
        self.users.iter()
            .filter(|entry| entry.tenant_id == *id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn set_user_limit(&self, id: &ids::UserId, limit: u64) -> bool {
        if let Some(mut found) = self.users.get_mut(id) {
            found.space_limit = Some(limit);

            self.changed.insert(*id, limit);

            true
        } else {
            false
        }
    }

    fn changed_limits(&self) -> Vec<UserLimit> {
        let mut rtn: Vec<UserLimit> = self.changed.iter()
            .map(|entry| UserLimit {
                user_id: *entry.key(),
                space_limit: *entry.value(),
            })
            .collect();

        rtn.sort_by_key(|limit| limit.user_id);
        rtn
    }
}
