use std::path::PathBuf;

use serde::Serialize;
use vfs_lib::ids;
use vfs_lib::storage::StorageType;
use walkdir::WalkDir;

use crate::accounts::Accounts;
use crate::context::Context;
use crate::error::{Er, ErrorKind, OpResult};
use crate::state::Shared;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quota {
    pub used: u64,
    /// 0 is unlimited
    pub limit: u64,
}

/// true if `incoming` more bytes stay within `limit`. a limit of 0 always
/// fits.
pub fn fits(used: u64, incoming: u64, limit: u64) -> bool {
    limit == 0 || used.saturating_add(incoming) <= limit
}

/// total size of the files below `root`. symlinks are not followed and a
/// missing root is empty.
pub async fn dir_size(root: PathBuf) -> OpResult<u64> {
    let total = tokio::task::spawn_blocking(move || -> OpResult<u64> {
        if !root.exists() {
            return Ok(0);
        }

        let mut total = 0u64;

        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = entry?;

            if entry.file_type().is_file() {
                total = total.saturating_add(entry.metadata()?.len());
            }
        }

        Ok(total)
    }).await??;

    Ok(total)
}

/// bytes used across the given storage types of a user
pub async fn used(shared: &Shared, user_id: &ids::UserId, types: &[StorageType]) -> OpResult<u64> {
    let mut total = 0u64;

    for storage_type in types {
        let root = shared.resolver().root(shared.accounts(), user_id, storage_type)?;

        total = total.saturating_add(dir_size(root).await?);
    }

    Ok(total)
}

/// the limit that applies to writes into the storage type. personal and
/// shared storage use the user limit, falling back to the tenant default.
/// corporate storage uses the tenant limit.
pub fn limit_for(accounts: &dyn Accounts, user_id: &ids::UserId, storage_type: &StorageType) -> OpResult<u64> {
    let Some(user) = accounts.user(user_id) else {
        return Err(Er::new(ErrorKind::NotFound)
            .context(format!("user {user_id} was not found")));
    };
    let tenant = accounts.tenant(&user.tenant_id);

    if storage_type.is_tenant_scoped() {
        Ok(tenant.map(|t| t.space_limit).unwrap_or(0))
    } else {
        Ok(user.space_limit
            .or_else(|| tenant.map(|t| t.user_space_limit))
            .unwrap_or(0))
    }
}

/// storage types counted against a limit. corporate storage is shared by
/// the tenant so only it is counted, everything else counts together.
fn counted_types(storage_type: &StorageType) -> Vec<StorageType> {
    if storage_type.is_tenant_scoped() {
        vec![storage_type.clone()]
    } else {
        vec![StorageType::Personal, StorageType::Shared]
    }
}

/// rejects with QuotaExceeded if writing `incoming` bytes would go past the
/// limit for the storage type
pub async fn check_quota(
    shared: &Shared,
    user_id: &ids::UserId,
    storage_type: &StorageType,
    incoming: u64,
) -> OpResult<()> {
    let limit = limit_for(shared.accounts(), user_id, storage_type)?;

    if limit == 0 {
        return Ok(());
    }

    let used = used(shared, user_id, &counted_types(storage_type)).await?;

    if fits(used, incoming, limit) {
        Ok(())
    } else {
        tracing::info!("quota exceeded for user {user_id}. used: {used} incoming: {incoming} limit: {limit}");

        Err(Er::new(ErrorKind::QuotaExceeded)
            .context(format!("{used} + {incoming} bytes is over the limit of {limit} bytes")))
    }
}

/// rejects with OverQuota if giving `user_id` the `new_limit` makes the sum
/// of user limits in the tenant larger than the tenant cap
pub fn check_allocated_space(
    accounts: &dyn Accounts,
    tenant_id: &ids::TenantId,
    user_id: &ids::UserId,
    new_limit: u64,
) -> OpResult<()> {
    let Some(tenant) = accounts.tenant(tenant_id) else {
        return Err(Er::new(ErrorKind::NotFound)
            .context(format!("tenant {tenant_id} was not found")));
    };

    if tenant.space_limit == 0 {
        return Ok(());
    }

    let mut allocated = new_limit;

    for user in accounts.users_in_tenant(tenant_id) {
        if user.id == *user_id {
            continue;
        }

        allocated = allocated.saturating_add(user.space_limit.unwrap_or(0));
    }

    if allocated > tenant.space_limit {
        Err(Er::new(ErrorKind::OverQuota)
            .context(format!(
                "{allocated} bytes allocated to users is over the tenant limit of {} bytes",
                tenant.space_limit
            )))
    } else {
        Ok(())
    }
}

/// changes the limit of another user. requires admin rights over the
/// tenant of that user.
pub async fn set_user_limit(
    shared: &Shared,
    ctx: &Context,
    user_id: &ids::UserId,
    new_limit: u64,
) -> OpResult<()> {
    let accounts = shared.accounts();
    let Some(user) = accounts.user(user_id) else {
        return Err(Er::new(ErrorKind::NotFound)
            .context(format!("user {user_id} was not found")));
    };

    ctx.ensure_tenant_admin(&user.tenant_id)?;

    check_allocated_space(accounts, &user.tenant_id, user_id, new_limit)?;

    if !accounts.set_user_limit(user_id, new_limit) {
        return Err(Er::new(ErrorKind::NotFound)
            .context(format!("user {user_id} was not found")));
    }

    tracing::info!("user {} set limit of user {user_id} to {new_limit}", ctx.user_id);

    shared.persist_limits().await
}

/// used and limit of the personal storage for display
pub async fn quota(shared: &Shared, ctx: &Context) -> OpResult<Quota> {
    ctx.ensure(crate::context::Ability::Read)?;

    let storage_type = StorageType::Personal;
    let limit = limit_for(shared.accounts(), &ctx.user_id, &storage_type)?;
    let used = used(shared, &ctx.user_id, &counted_types(&storage_type)).await?;

    Ok(Quota { used, limit })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::accounts::{ConfigAccounts, Role, TenantAccount, UserAccount};
    use crate::config::MB;

    #[test]
    fn fits_boundary() {
        let limit = 100 * MB;
        let used = 99 * MB;

        assert!(!fits(used, 2 * MB, limit));
        assert!(fits(used, MB, limit));
        assert!(fits(used, 0, limit));
        assert!(fits(u64::MAX, u64::MAX, 0));
    }

    fn accounts() -> ConfigAccounts {
        let accounts = ConfigAccounts::new();

        accounts.add_tenant(TenantAccount {
            id: 1,
            space_limit: 100 * MB,
            user_space_limit: 10 * MB,
        });
        accounts.add_user(UserAccount {
            id: 1,
            tenant_id: 1,
            space_limit: Some(60 * MB),
            role: Role::TenantAdmin,
        });
        accounts.add_user(UserAccount {
            id: 2,
            tenant_id: 1,
            space_limit: None,
            role: Role::User,
        });

        accounts
    }

    #[test]
    fn limits() {
        let accounts = accounts();

        assert_eq!(limit_for(&accounts, &1, &StorageType::Personal).ok(), Some(60 * MB));
        assert_eq!(limit_for(&accounts, &2, &StorageType::Shared).ok(), Some(10 * MB));
        assert_eq!(limit_for(&accounts, &2, &StorageType::Corporate).ok(), Some(100 * MB));
        assert!(limit_for(&accounts, &3, &StorageType::Personal).is_err());
    }

    #[test]
    fn allocated_space() {
        let accounts = accounts();

        assert!(check_allocated_space(&accounts, &1, &2, 40 * MB).is_ok());

        match check_allocated_space(&accounts, &1, &2, 41 * MB) {
            Ok(()) => panic!("allocation over the tenant limit was accepted"),
            Err(err) => assert_eq!(err.kind(), &ErrorKind::OverQuota),
        }

        // the user being changed does not count its old limit
        assert!(check_allocated_space(&accounts, &1, &1, 100 * MB).is_ok());
    }
}
