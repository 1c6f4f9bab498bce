use std::path::{Path, PathBuf};

use vfs_lib::ids;
use vfs_lib::fs::basename_valid;
use vfs_lib::path as logical;
use vfs_lib::storage::StorageType;

use crate::accounts::Accounts;
use crate::error::{Er, ErrorKind, OpResult};

/// maps (user, storage type, logical path) onto directories under the data
/// directory
#[derive(Debug, Clone)]
pub struct Resolver {
    data: PathBuf,
}

/// a resolved logical directory
#[derive(Debug, Clone)]
pub struct Location {
    pub user_id: ids::UserId,
    pub storage_type: StorageType,
    /// physical root of the storage, nothing outside of it is addressable
    pub root: PathBuf,
    /// normalized logical path, empty for the root
    pub path: String,
    /// physical directory for `path`
    pub dir: PathBuf,
}

impl Resolver {
    pub fn new<P>(data: P) -> Self
    where
        P: Into<PathBuf>
    {
        Resolver { data: data.into() }
    }

    pub fn data(&self) -> &Path {
        &self.data
    }

    /// physical root for the user and storage type. fails closed for the
    /// anonymous user.
    pub fn root(
        &self,
        accounts: &dyn Accounts,
        user_id: &ids::UserId,
        storage_type: &StorageType,
    ) -> OpResult<PathBuf> {
        if !ids::user_id_valid(user_id) {
            return Err(Er::new(ErrorKind::PermissionDenied)
                .context("no storage root for the anonymous user"));
        }

        let Some(user) = accounts.user(user_id) else {
            return Err(Er::new(ErrorKind::NotFound)
                .context(format!("user {user_id} was not found")));
        };

        let rtn = match storage_type {
            StorageType::Personal => self.data.join("personal").join(user.id.to_string()),
            StorageType::Shared => self.data.join("shared").join(user.id.to_string()),
            StorageType::Corporate => self.data.join("corporate").join(user.tenant_id.to_string()),
            StorageType::Custom(name) => self.data.join("custom")
                .join(name)
                .join(user.id.to_string()),
        };

        Ok(rtn)
    }

    pub async fn resolve(
        &self,
        accounts: &dyn Accounts,
        user_id: &ids::UserId,
        storage_type: &StorageType,
        path: &str,
    ) -> OpResult<Location> {
        let root = self.root(accounts, user_id, storage_type)?;
        let normalized = logical::normalize(path)?;
        let mut dir = root.clone();

        for segment in logical::segments(&normalized)? {
            dir.push(segment);
        }

        tracing::debug!("resolved {user_id}:{storage_type}:\"{normalized}\" -> \"{}\"", dir.display());

        let location = Location {
            user_id: *user_id,
            storage_type: storage_type.clone(),
            root,
            path: normalized,
            dir,
        };

        location.check_contained().await?;

        Ok(location)
    }
}

impl Location {
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// physical path of a direct child
    pub fn child(&self, name: &str) -> OpResult<PathBuf> {
        if !basename_valid(name) {
            return Err(Er::new(ErrorKind::InvalidInput)
                .context(format!("invalid name: \"{name}\"")));
        }

        Ok(self.dir.join(name))
    }

    /// logical full path of a direct child
    pub fn logical_child(&self, name: &str) -> String {
        logical::join(&self.path, name)
    }

    /// location of another logical directory in the same storage. the path
    /// must already be normalized.
    pub fn at(&self, path: &str) -> OpResult<Location> {
        let mut dir = self.root.clone();

        for segment in logical::segments(path)? {
            dir.push(segment);
        }

        Ok(Location {
            user_id: self.user_id,
            storage_type: self.storage_type.clone(),
            root: self.root.clone(),
            path: path.to_owned(),
            dir,
        })
    }

    /// translates a physical path under the root back into its logical path
    pub fn logical_of(&self, physical: &Path) -> Option<String> {
        let relative = physical.strip_prefix(&self.root).ok()?;
        let mut rtn = String::new();

        for comp in relative.components() {
            rtn.push(logical::SEPARATOR);
            rtn.push_str(comp.as_os_str().to_str()?);
        }

        Some(rtn)
    }

    /// creates the storage root if it does not exist yet
    pub async fn ensure_root(&self) -> OpResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;

        Ok(())
    }

    /// directories that exist must not resolve outside of the root, which
    /// can happen through symlinks placed in the storage
    async fn check_contained(&self) -> OpResult<()> {
        if self.is_root() {
            return Ok(());
        }

        let Ok(dir) = tokio::fs::canonicalize(&self.dir).await else {
            return Ok(());
        };
        let root = tokio::fs::canonicalize(&self.root).await?;

        if dir.starts_with(&root) {
            Ok(())
        } else {
            tracing::warn!("\"{}\" resolved outside of root \"{}\"", self.dir.display(), root.display());

            Err(Er::new(ErrorKind::PermissionDenied)
                .context("path resolves outside of the storage root"))
        }
    }
}
