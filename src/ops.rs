//! storage operations. every operation takes the shared state and the
//! context of the caller, checks permissions, resolves paths, applies the
//! change to the backing directories and then brings the link and favorite
//! tables in line with it.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use vfs_lib::ids;
use vfs_lib::path as logical;
use vfs_lib::storage::StorageType;
use walkdir::WalkDir;

use crate::error::{Er, ErrorKind, OpError, OpResult};
use crate::hooks::{Event, Outcome};
use crate::links::{link_key, LinkRecord};
use crate::resolve::Location;
use crate::state::Shared;

pub mod read;
pub mod write;
pub mod modify;
pub mod share;

pub use read::{list, info, read_range, resolve_token, read_token, public_item, read_public, ListOptions, Reader};
pub use write::{create_file, create_folder, create_link, RangeType, Upload, WriteOptions};
pub use modify::{
    rename,
    non_existent_name,
    move_items,
    move_item,
    copy_items,
    copy_item,
    delete_items,
    delete,
    Transfer,
};
pub use share::{
    create_public_link,
    delete_public_link,
    public_links,
    add_to_favorites,
    remove_from_favorites,
    favorites,
};

/// an entry of a directory addressed by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub name: String,
    pub is_folder: bool,
}

impl ItemRef {
    pub fn file<N>(name: N) -> Self
    where
        N: Into<String>
    {
        ItemRef { name: name.into(), is_folder: false }
    }

    pub fn folder<N>(name: N) -> Self
    where
        N: Into<String>
    {
        ItemRef { name: name.into(), is_folder: true }
    }
}

/// outcome of one item in a batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub name: String,
    /// the name the item ended up with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchEntry {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn push(&mut self, name: &str, result: OpResult<Option<String>>) {
        let entry = match result {
            Ok(target) => BatchEntry {
                name: name.to_owned(),
                target,
                error: None,
                message: None,
            },
            Err(err) => BatchEntry {
                name: name.to_owned(),
                target: None,
                message: err.get_context().map(ToOwned::to_owned),
                error: Some(err.into_inner()),
            },
        };

        self.entries.push(entry);
    }

    /// result of the last item only. an empty batch is not ok.
    pub fn last_ok(&self) -> bool {
        self.entries.last()
            .map(BatchEntry::is_ok)
            .unwrap_or(false)
    }

    pub fn all_ok(&self) -> bool {
        self.entries.iter().all(BatchEntry::is_ok)
    }

    pub fn get(&self, name: &str) -> Option<&BatchEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) async fn locate(
    shared: &Shared,
    user_id: &ids::UserId,
    storage_type: &StorageType,
    path: &str,
) -> OpResult<Location> {
    shared.resolver().resolve(shared.accounts(), user_id, storage_type, path).await
}

pub(crate) fn check_name(name: &str) -> OpResult<()> {
    if vfs_lib::fs::basename_valid(name) {
        Ok(())
    } else {
        Err(Er::new(ErrorKind::InvalidInput)
            .context(format!("invalid name: \"{name}\"")))
    }
}

/// directories other than the root must exist before anything is put into
/// them. the root is created on demand.
pub(crate) async fn ensure_dir(location: &Location) -> OpResult<()> {
    if location.is_root() {
        return location.ensure_root().await;
    }

    match crate::path::async_metadata(&location.dir).await? {
        Some(meta) if meta.is_dir() => Ok(()),
        Some(_) => Err(Er::new(ErrorKind::InvalidInput)
            .context(format!("\"{}\" is not a folder", location.path))),
        None => Err(Er::new(ErrorKind::NotFound)
            .context(format!("folder \"{}\" was not found", location.path))),
    }
}

pub(crate) async fn entry_metadata(location: &Location, name: &str) -> OpResult<std::fs::Metadata> {
    let physical = location.child(name)?;

    match tokio::fs::symlink_metadata(&physical).await {
        Ok(meta) => Ok(meta),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Er::new(ErrorKind::NotFound)
            .context(format!("\"{}\" was not found", location.logical_child(name)))),
        Err(err) => Err(err.into()),
    }
}

/// what to do after the before hooks of an operation ran
pub(crate) enum Proceed {
    Apply,
    /// a hook did the work
    Skip(Value),
}

pub(crate) fn before_hooks(shared: &Shared, event: Event, args: &Value) -> OpResult<Proceed> {
    let mut result = Value::Null;

    match shared.hooks().before(event, args, &mut result) {
        Outcome::Pass => Ok(Proceed::Apply),
        Outcome::Handled(true) => Ok(Proceed::Skip(result)),
        Outcome::Handled(false) => Err(Er::new(ErrorKind::Vetoed)
            .context(format!("{} was stopped by a hook", event.as_ref()))),
    }
}

pub(crate) fn after_hooks(shared: &Shared, event: Event, args: &Value) {
    shared.hooks().after(event, args);
}

/// every entry below `dir` as (path relative to dir, is folder, size).
/// symlinks are not followed.
pub(crate) async fn walk(dir: PathBuf) -> OpResult<Vec<(PathBuf, bool, u64)>> {
    let rtn = tokio::task::spawn_blocking(move || -> OpResult<Vec<(PathBuf, bool, u64)>> {
        let mut rtn = Vec::new();

        for entry in WalkDir::new(&dir).min_depth(1).follow_links(false) {
            let entry = entry?;
            let is_dir = entry.file_type().is_dir();
            let size = if is_dir { 0 } else { entry.metadata()?.len() };
            let Ok(relative) = entry.path().strip_prefix(&dir) else {
                continue;
            };

            rtn.push((relative.to_owned(), is_dir, size));
        }

        Ok(rtn)
    }).await??;

    Ok(rtn)
}

fn relative_logical(relative: &Path) -> Option<String> {
    let mut rtn = String::new();

    for comp in relative.components() {
        rtn.push(logical::SEPARATOR);
        rtn.push_str(comp.as_os_str().to_str()?);
    }

    Some(rtn)
}

/// an item moved from one place to another
pub(crate) struct Moved<'a> {
    pub user_id: ids::UserId,
    pub from_type: &'a StorageType,
    pub from_path: &'a str,
    pub from_name: &'a str,
    pub to: &'a Location,
    pub to_name: &'a str,
    pub is_folder: bool,
    pub size: u64,
}

fn rekey_one(shared: &Shared, old_key: &str, record: LinkRecord) {
    let new_key = record.key();

    match shared.links().rekey(old_key, record, new_key) {
        Ok(()) => tracing::debug!("rekeyed link \"{old_key}\""),
        Err(err) => tracing::warn!("failed to rekey link \"{old_key}\": {err}"),
    }
}

/// moves link records and favorites of the moved item and everything below
/// it. failures are logged and never undo the move.
pub(crate) async fn reconcile_moved(shared: &Shared, moved: Moved<'_>) {
    let old_full = logical::join(moved.from_path, moved.from_name);
    let new_full = moved.to.logical_child(moved.to_name);
    let new_record = |path: &str, name: &str, is_folder: bool, size: u64| LinkRecord {
        user_id: moved.user_id,
        storage_type: moved.to.storage_type.clone(),
        path: path.to_owned(),
        name: name.to_owned(),
        size,
        is_folder,
        public_hash: String::new(),
        created: chrono::Utc::now(),
    };

    let old_key = link_key(&moved.user_id, moved.from_type, moved.from_path, moved.from_name);

    if shared.links().get_by_key(&old_key).is_some() {
        rekey_one(shared, &old_key, new_record(&moved.to.path, moved.to_name, moved.is_folder, moved.size));
    }

    if moved.is_folder && shared.links().has_within(&moved.user_id, moved.from_type, &old_full) {
        match walk(moved.to.dir.join(moved.to_name)).await {
            Ok(entries) => for (relative, is_dir, size) in entries {
                let Some(relative) = relative_logical(&relative) else {
                    continue;
                };
                let (new_parent, name) = logical::split_full(&relative);
                let new_parent = format!("{new_full}{new_parent}");
                let Some(old_parent) = logical::rebase(&new_parent, &new_full, &old_full) else {
                    continue;
                };
                let old_key = link_key(&moved.user_id, moved.from_type, &old_parent, name);

                if shared.links().get_by_key(&old_key).is_some() {
                    rekey_one(shared, &old_key, new_record(&new_parent, name, is_dir, size));
                }
            },
            Err(err) => tracing::warn!("failed to walk \"{new_full}\" for link records: {err}"),
        }
    }

    let favorites = shared.favorites().move_within(
        &moved.user_id,
        moved.from_type,
        &old_full,
        &moved.to.storage_type,
        &new_full,
    );

    if favorites > 0 {
        tracing::debug!("moved {favorites} favorites to \"{new_full}\"");
    }

    persist(shared).await;
}

/// drops link records and favorites of the deleted item and everything
/// below it
pub(crate) async fn reconcile_deleted(
    shared: &Shared,
    user_id: &ids::UserId,
    storage_type: &StorageType,
    full_path: &str,
) {
    let mut changed = 0;

    for key in shared.links().keys_within(user_id, storage_type, full_path) {
        if shared.links().delete(&key).is_some() {
            changed += 1;
        }
    }

    changed += shared.favorites().remove_within(user_id, storage_type, full_path);

    if changed > 0 {
        tracing::debug!("dropped {changed} links and favorites for \"{full_path}\"");

        persist(shared).await;
    }
}

pub(crate) async fn persist(shared: &Shared) {
    if let Err(err) = shared.links().persist().await {
        tracing::warn!("failed to save link records: {err}");
    }

    if let Err(err) = shared.favorites().persist().await {
        tracing::warn!("failed to save favorites: {err}");
    }
}

pub(crate) fn not_found<S>(msg: S) -> OpError
where
    S: Into<String>
{
    Er::new(ErrorKind::NotFound).context(msg)
}
