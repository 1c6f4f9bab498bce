#![allow(dead_code)]

use tempfile::TempDir;
use vfs::accounts::{ConfigAccounts, Role, TenantAccount, UserAccount};
use vfs::context::Context;
use vfs::error::{ErrorKind, OpResult};
use vfs::item::FileItem;
use vfs::ops::{self, Upload, WriteOptions};
use vfs::state::Shared;
use vfs_lib::storage::StorageType;

pub const USER: i64 = 1;
pub const ADMIN: i64 = 2;
/// user with a 10 byte limit
pub const LIMITED: i64 = 3;

pub struct Env {
    pub dir: TempDir,
    pub shared: Shared,
}

impl Env {
    pub fn ctx(&self, user_id: i64) -> Context {
        self.shared.context(&user_id)
    }

    pub async fn write(&self, ctx: &Context, path: &str, name: &str, contents: &str) -> FileItem {
        ops::create_file(
            &self.shared,
            ctx,
            &StorageType::Personal,
            path,
            name,
            Upload::from_bytes(contents),
            WriteOptions::default(),
        ).await.expect("failed to write file")
    }

    pub async fn mkdir(&self, ctx: &Context, path: &str, name: &str) -> FileItem {
        ops::create_folder(&self.shared, ctx, &StorageType::Personal, path, name)
            .await
            .expect("failed to create folder")
    }

    pub async fn names(&self, ctx: &Context, path: &str) -> Vec<String> {
        ops::list(&self.shared, ctx, &StorageType::Personal, path, &Default::default())
            .await
            .expect("failed to list folder")
            .into_iter()
            .map(|item| item.name)
            .collect()
    }
}

pub fn accounts() -> ConfigAccounts {
    let accounts = ConfigAccounts::new();

    accounts.add_tenant(TenantAccount {
        id: 1,
        space_limit: 0,
        user_space_limit: 0,
    });
    accounts.add_tenant(TenantAccount {
        id: 2,
        space_limit: 1000,
        user_space_limit: 10,
    });
    accounts.add_user(UserAccount {
        id: USER,
        tenant_id: 1,
        space_limit: None,
        role: Role::User,
    });
    accounts.add_user(UserAccount {
        id: ADMIN,
        tenant_id: 1,
        space_limit: None,
        role: Role::TenantAdmin,
    });
    accounts.add_user(UserAccount {
        id: LIMITED,
        tenant_id: 2,
        space_limit: None,
        role: Role::User,
    });

    accounts
}

pub fn env() -> Env {
    let dir = tempfile::tempdir().expect("failed to create tmp dir");
    let shared = Shared::new(dir.path(), [7u8; vfs_lib::token::KEY_LEN], accounts())
        .with_public_url("https://files.example.com");

    Env { dir, shared }
}

pub fn kind_of<T>(result: OpResult<T>) -> ErrorKind
where
    T: std::fmt::Debug
{
    match result {
        Ok(value) => panic!("expected an error, received {value:?}"),
        Err(err) => err.into_inner(),
    }
}
