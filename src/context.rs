use vfs_lib::ids;

use crate::accounts::{Accounts, Role, UserAccount};
use crate::error::{Er, ErrorKind, OpResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ability {
    Read,
    Write,
    /// changing limits for other users
    Admin,
}

/// the identity an operation runs as. passed explicitly to every operation.
#[derive(Debug, Clone)]
pub struct Context {
    pub user_id: ids::UserId,
    pub tenant_id: ids::TenantId,
    pub role: Role,
}

impl Context {
    pub fn anonymous() -> Self {
        Context {
            user_id: 0,
            tenant_id: 0,
            role: Role::Anonymous,
        }
    }

    /// unknown users are treated as anonymous
    pub fn lookup(accounts: &dyn Accounts, user_id: &ids::UserId) -> Self {
        if !ids::user_id_valid(user_id) {
            return Context::anonymous();
        }

        match accounts.user(user_id) {
            Some(account) => Context::from(&account),
            None => Context::anonymous(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.role == Role::Anonymous || !ids::user_id_valid(&self.user_id)
    }

    pub fn can(&self, ability: Ability) -> bool {
        if self.is_anonymous() {
            return false;
        }

        match ability {
            Ability::Read |
            Ability::Write => true,
            Ability::Admin => matches!(self.role, Role::TenantAdmin | Role::SuperAdmin),
        }
    }

    pub fn ensure(&self, ability: Ability) -> OpResult<()> {
        if self.can(ability) {
            Ok(())
        } else {
            Err(Er::new(ErrorKind::PermissionDenied)
                .context(format!("user {} cannot {ability:?}", self.user_id)))
        }
    }

    /// admin rights over the given tenant
    pub fn ensure_tenant_admin(&self, tenant_id: &ids::TenantId) -> OpResult<()> {
        self.ensure(Ability::Admin)?;

        if self.role == Role::TenantAdmin && self.tenant_id != *tenant_id {
            return Err(Er::new(ErrorKind::PermissionDenied)
                .context(format!("user {} does not administer tenant {tenant_id}", self.user_id)));
        }

        Ok(())
    }
}

impl From<&UserAccount> for Context {
    fn from(account: &UserAccount) -> Self {
        Context {
            user_id: account.id,
            tenant_id: account.tenant_id,
            role: account.role,
        }
    }
}
