use std::path::PathBuf;

use serde_json::json;
use vfs_lib::fs::{first_free_name, link_name};
use vfs_lib::path as logical;
use vfs_lib::storage::StorageType;
use walkdir::WalkDir;

use crate::context::{Ability, Context};
use crate::error::{Er, ErrorKind, OpResult};
use crate::hooks::Event;
use crate::item::{self, FileItem};
use crate::quota;
use crate::resolve::Location;
use crate::state::Shared;

use super::{
    after_hooks,
    before_hooks,
    check_name,
    ensure_dir,
    entry_metadata,
    locate,
    reconcile_deleted,
    reconcile_moved,
    BatchReport,
    ItemRef,
    Moved,
    Proceed,
};

/// source and destination of a move or copy
#[derive(Debug, Clone)]
pub struct Transfer {
    pub from_type: StorageType,
    pub from_path: String,
    pub to_type: StorageType,
    pub to_path: String,
}

impl Transfer {
    /// a transfer inside a single storage
    pub fn within<F, T>(storage_type: StorageType, from_path: F, to_path: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        Transfer {
            from_type: storage_type.clone(),
            from_path: from_path.into(),
            to_type: storage_type,
            to_path: to_path.into(),
        }
    }
}

/// renames an entry inside its folder. link files keep their extension.
pub async fn rename(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
    new_name: &str,
    is_link: bool,
) -> OpResult<FileItem> {
    ctx.ensure(Ability::Write)?;

    let new_name = new_name.trim();

    if new_name.is_empty() {
        return Err(Er::new(ErrorKind::InvalidInput)
            .context("new name is empty"));
    }

    let new_name = if is_link {
        link_name(new_name)
    } else {
        new_name.to_owned()
    };

    check_name(name)?;
    check_name(&new_name)?;

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;
    let meta = entry_metadata(&location, name).await?;

    if new_name == name {
        return item::project(shared, &location, name, &meta).await;
    }

    let target = location.child(&new_name)?;

    match tokio::fs::symlink_metadata(&target).await {
        // a case only rename on a case insensitive filesystem finds the
        // entry itself
        Ok(existing) if crate::path::same_entry(&existing, &meta) => {}
        Ok(_) => return Err(Er::new(ErrorKind::AlreadyExists)
            .context(format!("\"{}\" already exists", location.logical_child(&new_name)))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let args = json!({
        "user_id": ctx.user_id,
        "storage_type": storage_type,
        "path": location.path,
        "name": name,
        "new_name": new_name,
    });

    if let Proceed::Skip(_) = before_hooks(shared, Event::Rename, &args)? {
        let meta = entry_metadata(&location, &new_name).await?;

        return item::project(shared, &location, &new_name, &meta).await;
    }

    tokio::fs::rename(location.child(name)?, &target).await?;

    tracing::info!(
        "user {} renamed {storage_type}:\"{}\" to \"{new_name}\"",
        ctx.user_id,
        location.logical_child(name)
    );

    reconcile_moved(shared, Moved {
        user_id: ctx.user_id,
        from_type: storage_type,
        from_path: &location.path,
        from_name: name,
        to: &location,
        to_name: &new_name,
        is_folder: meta.is_dir(),
        size: meta.len(),
    }).await;

    after_hooks(shared, Event::Rename, &args);

    let meta = entry_metadata(&location, &new_name).await?;

    item::project(shared, &location, &new_name, &meta).await
}

async fn free_name_in(dir: PathBuf, name: String) -> OpResult<String> {
    let rtn = tokio::task::spawn_blocking(move || {
        first_free_name(&name, |candidate| dir.join(candidate).exists())
    }).await?;

    Ok(rtn)
}

/// the first of `name`, `stem_1.ext`, `stem_2.ext`, ... that is not taken in
/// the folder at `path`
pub async fn non_existent_name(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
) -> OpResult<String> {
    ctx.ensure(Ability::Read)?;
    check_name(name)?;

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;

    free_name_in(location.dir.clone(), name.to_owned()).await
}

/// recursive copy of a file or folder. symlinks are not followed and are
/// skipped.
async fn copy_tree(from: PathBuf, to: PathBuf) -> OpResult<()> {
    tokio::task::spawn_blocking(move || -> OpResult<()> {
        for entry in WalkDir::new(&from).follow_links(false) {
            let entry = entry?;
            let Ok(relative) = entry.path().strip_prefix(&from) else {
                continue;
            };
            let dest = if relative.as_os_str().is_empty() {
                to.clone()
            } else {
                to.join(relative)
            };
            let file_type = entry.file_type();

            if file_type.is_dir() {
                std::fs::create_dir(&dest)?;
            } else if file_type.is_file() {
                std::fs::copy(entry.path(), &dest)?;
            } else {
                tracing::debug!("skipping \"{}\" while copying", entry.path().display());
            }
        }

        Ok(())
    }).await?
}

async fn remove_entry(physical: &std::path::Path, is_folder: bool) -> OpResult<()> {
    if is_folder {
        tokio::fs::remove_dir_all(physical).await?;
    } else {
        tokio::fs::remove_file(physical).await?;
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Move,
    Copy,
}

impl Mode {
    fn event(&self) -> Event {
        match self {
            Mode::Move => Event::Move,
            Mode::Copy => Event::Copy,
        }
    }
}

struct Endpoints {
    from: Location,
    to: Location,
}

async fn endpoints(shared: &Shared, ctx: &Context, transfer: &Transfer) -> OpResult<Endpoints> {
    ctx.ensure(Ability::Write)?;

    let from = locate(shared, &ctx.user_id, &transfer.from_type, &transfer.from_path).await?;
    let to = locate(shared, &ctx.user_id, &transfer.to_type, &transfer.to_path).await?;

    ensure_dir(&to).await?;

    Ok(Endpoints { from, to })
}

async fn transfer_one(
    shared: &Shared,
    ctx: &Context,
    ends: &Endpoints,
    item: &ItemRef,
    mode: Mode,
) -> OpResult<Option<String>> {
    let Endpoints { from, to } = ends;
    let same_storage = from.storage_type == to.storage_type;
    let from_full = from.logical_child(&item.name);

    let meta = entry_metadata(from, &item.name).await?;
    let is_folder = meta.is_dir();

    if same_storage && (is_folder || item.is_folder) && logical::is_within(&from_full, &to.path) {
        return Err(Er::new(ErrorKind::CannotCopyOrMoveItemToItself)
            .context(format!("\"{from_full}\" can not be put inside of itself")));
    }

    if same_storage && from.path == to.path && mode == Mode::Move {
        return Ok(Some(item.name.clone()));
    }

    let args = json!({
        "user_id": ctx.user_id,
        "from_type": from.storage_type,
        "from_path": from.path,
        "to_type": to.storage_type,
        "to_path": to.path,
        "name": item.name,
    });

    if mode == Mode::Move {
        if let Proceed::Skip(_) = before_hooks(shared, Event::Move, &args)? {
            return Ok(None);
        }
    }

    let size = if is_folder {
        quota::dir_size(from.child(&item.name)?).await?
    } else {
        meta.len()
    };

    if mode == Mode::Copy || from.storage_type.is_tenant_scoped() != to.storage_type.is_tenant_scoped() {
        quota::check_quota(shared, &ctx.user_id, &to.storage_type, size).await?;
    }

    let to_name = free_name_in(to.dir.clone(), item.name.clone()).await?;
    let source = from.child(&item.name)?;
    let dest = to.child(&to_name)?;

    match mode {
        Mode::Copy => {
            copy_tree(source, dest).await?;
        },
        Mode::Move => {
            let renamed = if same_storage {
                tokio::fs::rename(&source, &dest).await.is_ok()
            } else {
                false
            };

            if !renamed {
                copy_tree(source.clone(), dest).await?;
            }

            reconcile_moved(shared, Moved {
                user_id: ctx.user_id,
                from_type: &from.storage_type,
                from_path: &from.path,
                from_name: &item.name,
                to,
                to_name: &to_name,
                is_folder,
                size,
            }).await;

            if !renamed {
                remove_entry(&source, is_folder).await?;
            }
        }
    }

    tracing::info!(
        "user {} {} {}:\"{from_full}\" to {}:\"{}\"",
        ctx.user_id,
        if mode == Mode::Move { "moved" } else { "copied" },
        from.storage_type,
        to.storage_type,
        to.logical_child(&to_name),
    );

    after_hooks(shared, mode.event(), &args);

    Ok(Some(to_name))
}

async fn transfer_batch(
    shared: &Shared,
    ctx: &Context,
    transfer: &Transfer,
    items: &[ItemRef],
    mode: Mode,
) -> OpResult<BatchReport> {
    for item in items {
        check_name(&item.name)?;
    }

    let ends = endpoints(shared, ctx, transfer).await?;
    let mut report = BatchReport::default();

    for item in items {
        let result = transfer_one(shared, ctx, &ends, item, mode).await;

        if let Err(err) = &result {
            tracing::debug!("{:?} of \"{}\" failed: {err}", mode, item.name);
        }

        report.push(&item.name, result);
    }

    Ok(report)
}

/// moves every item. each item is reported on its own, only invalid names
/// and missing permissions fail the whole call.
pub async fn move_items(
    shared: &Shared,
    ctx: &Context,
    transfer: &Transfer,
    items: &[ItemRef],
) -> OpResult<BatchReport> {
    transfer_batch(shared, ctx, transfer, items, Mode::Move).await
}

pub async fn copy_items(
    shared: &Shared,
    ctx: &Context,
    transfer: &Transfer,
    items: &[ItemRef],
) -> OpResult<BatchReport> {
    transfer_batch(shared, ctx, transfer, items, Mode::Copy).await
}

/// moves a single item, returning the name it has at the destination
pub async fn move_item(
    shared: &Shared,
    ctx: &Context,
    transfer: &Transfer,
    item: &ItemRef,
) -> OpResult<String> {
    check_name(&item.name)?;

    let ends = endpoints(shared, ctx, transfer).await?;

    transfer_one(shared, ctx, &ends, item, Mode::Move).await
        .map(|name| name.unwrap_or_else(|| item.name.clone()))
}

pub async fn copy_item(
    shared: &Shared,
    ctx: &Context,
    transfer: &Transfer,
    item: &ItemRef,
) -> OpResult<String> {
    check_name(&item.name)?;

    let ends = endpoints(shared, ctx, transfer).await?;

    transfer_one(shared, ctx, &ends, item, Mode::Copy).await
        .map(|name| name.unwrap_or_else(|| item.name.clone()))
}

async fn delete_one(shared: &Shared, ctx: &Context, location: &Location, name: &str) -> OpResult<()> {
    if item::is_received_share(&location.storage_type, &location.path) {
        return Err(Er::new(ErrorKind::CantDeleteSharedItem)
            .context(format!("\"{name}\" was shared with you and can not be deleted")));
    }

    let meta = entry_metadata(location, name).await?;
    let full_path = location.logical_child(name);

    let args = json!({
        "user_id": ctx.user_id,
        "storage_type": location.storage_type,
        "path": location.path,
        "name": name,
    });

    if let Proceed::Skip(_) = before_hooks(shared, Event::Delete, &args)? {
        return Ok(());
    }

    remove_entry(&location.child(name)?, meta.is_dir()).await?;

    tracing::info!("user {} deleted {}:\"{full_path}\"", ctx.user_id, location.storage_type);

    reconcile_deleted(shared, &ctx.user_id, &location.storage_type, &full_path).await;

    after_hooks(shared, Event::Delete, &args);

    Ok(())
}

/// deletes every item. received shares are refused per item without
/// touching anything.
pub async fn delete_items(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    items: &[ItemRef],
) -> OpResult<BatchReport> {
    ctx.ensure(Ability::Write)?;

    for item in items {
        check_name(&item.name)?;
    }

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;
    let mut report = BatchReport::default();

    for item in items {
        let result = delete_one(shared, ctx, &location, &item.name).await;

        report.push(&item.name, result.map(|_| None));
    }

    Ok(report)
}

pub async fn delete(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
) -> OpResult<()> {
    ctx.ensure(Ability::Write)?;
    check_name(name)?;

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;

    delete_one(shared, ctx, &location, name).await
}
