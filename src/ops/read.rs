use std::io::SeekFrom;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use vfs_lib::path as logical;
use vfs_lib::storage::StorageType;
use vfs_lib::token;

use crate::context::{Ability, Context};
use crate::error::{Er, ErrorKind, OpResult};
use crate::hooks::Event;
use crate::item::{self, FileItem};
use crate::links::LinkRecord;
use crate::resolve::Location;
use crate::state::Shared;

use super::{before_hooks, entry_metadata, locate, not_found, walk, Proceed};

/// a ranged view of a file. may be dropped at any point.
pub type Reader = tokio::io::Take<tokio::fs::File>;

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// case insensitive substring of entry names. searches every folder
    /// below the path.
    pub pattern: Option<String>,
    /// list inside the published folder with this hash instead of the
    /// storage of the caller. the path is relative to the published folder.
    pub public_hash: Option<String>,
}

fn sort_items(items: &mut [FileItem]) {
    items.sort_by(|a, b| {
        b.is_folder.cmp(&a.is_folder)
            .then_with(|| a.full_path.cmp(&b.full_path))
    });
}

async fn list_dir(shared: &Shared, location: &Location) -> OpResult<Vec<FileItem>> {
    let mut rtn = Vec::new();
    let mut read_dir = match tokio::fs::read_dir(&location.dir).await {
        Ok(read_dir) => read_dir,
        Err(err) => return match err.kind() {
            std::io::ErrorKind::NotFound => Ok(rtn),
            _ => Err(err.into()),
        }
    };

    while let Some(entry) = read_dir.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!("skipping non utf-8 entry in \"{}\"", location.dir.display());
            continue;
        };
        let meta = entry.metadata().await?;

        rtn.push(item::project(shared, location, &name, &meta).await?);
    }

    Ok(rtn)
}

async fn search(shared: &Shared, location: &Location, pattern: &str) -> OpResult<Vec<FileItem>> {
    let pattern = pattern.to_lowercase();
    let mut rtn = Vec::new();

    for (relative, _, _) in walk(location.dir.clone()).await? {
        let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if !name.to_lowercase().contains(&pattern) {
            continue;
        }

        let Some(full) = location.logical_of(&location.dir.join(&relative)) else {
            continue;
        };
        let (parent, name) = logical::split_full(&full);
        let parent = location.at(parent)?;
        let meta = entry_metadata(&parent, name).await?;

        rtn.push(item::project(shared, &parent, name, &meta).await?);
    }

    Ok(rtn)
}

/// the storage location of a published folder, descended into `path`
async fn published_location(shared: &Shared, public_hash: &str, path: &str) -> OpResult<(LinkRecord, Location)> {
    if !vfs_lib::ids::public_hash_valid(public_hash) {
        return Err(not_found("public link was not found"));
    }

    let Some(record) = shared.links().get_by_public_hash(public_hash) else {
        return Err(not_found("public link was not found"));
    };

    let base = locate(shared, &record.user_id, &record.storage_type, &record.full_path()).await?;
    let normalized = logical::normalize(path)?;

    let location = if normalized.is_empty() {
        base
    } else {
        let joined = format!("{}{normalized}", base.path);

        locate(shared, &record.user_id, &record.storage_type, &joined).await?
    };

    Ok((record, location))
}

/// entries of the folder at `path`, folders first. a missing folder lists
/// as empty.
pub async fn list(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    options: &ListOptions,
) -> OpResult<Vec<FileItem>> {
    let location = if let Some(hash) = &options.public_hash {
        let (record, location) = published_location(shared, hash, path).await?;

        if !record.is_folder {
            return Err(Er::new(ErrorKind::InvalidInput)
                .context("public link is not a folder"));
        }

        location
    } else {
        ctx.ensure(Ability::Read)?;

        locate(shared, &ctx.user_id, storage_type, path).await?
    };

    let mut rtn = match &options.pattern {
        Some(pattern) if !pattern.is_empty() => search(shared, &location, pattern).await?,
        _ => list_dir(shared, &location).await?,
    };

    sort_items(&mut rtn);

    tracing::debug!("listed {} items in \"{}\"", rtn.len(), location.path);

    Ok(rtn)
}

/// a single item. an empty name returns the folder at `path`.
pub async fn info(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
) -> OpResult<FileItem> {
    ctx.ensure(Ability::Read)?;

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;

    project_at(shared, &location, name).await
}

async fn project_at(shared: &Shared, location: &Location, name: &str) -> OpResult<FileItem> {
    if name.is_empty() {
        let Some(meta) = crate::path::async_metadata(&location.dir).await? else {
            return Err(not_found(format!("\"{}\" was not found", location.path)));
        };

        item::project(shared, location, "", &meta).await
    } else {
        let meta = entry_metadata(location, name).await?;

        item::project(shared, location, name, &meta).await
    }
}

async fn open_range(
    shared: &Shared,
    location: &Location,
    name: &str,
    offset: u64,
    length: Option<u64>,
) -> OpResult<(FileItem, Reader)> {
    let found = project_at(shared, location, name).await?;

    if found.is_folder {
        return Err(Er::new(ErrorKind::InvalidInput)
            .context(format!("\"{}\" is a folder", found.full_path)));
    }

    let args = json!({
        "user_id": location.user_id,
        "storage_type": location.storage_type,
        "path": found.path,
        "name": found.name,
        "offset": offset,
        "length": length,
    });

    if let Proceed::Skip(_) = before_hooks(shared, Event::GetFile, &args)? {
        return Err(Er::new(ErrorKind::Vetoed)
            .context("file was served by a hook"));
    }

    let mut file = tokio::fs::File::open(location.child(name)?).await?;

    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }

    let remaining = found.size.saturating_sub(offset);
    let take = length.map(|len| len.min(remaining)).unwrap_or(remaining);

    Ok((found, file.take(take)))
}

/// the file contents starting at `offset`, at most `length` bytes
pub async fn read_range(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
    offset: u64,
    length: Option<u64>,
) -> OpResult<(FileItem, Reader)> {
    ctx.ensure(Ability::Read)?;

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;

    open_range(shared, &location, name, offset, length).await
}

/// location of the item a token points at. tokens of other users are only
/// accepted while the item they name is published.
async fn token_location(shared: &Shared, ctx: &Context, token: &str) -> OpResult<(token::Fields, Location)> {
    let fields = match token::decode(shared.token_key(), token) {
        Ok(fields) => fields,
        Err(err) => {
            tracing::debug!("rejected token: {err}");

            return Err(not_found("item was not found").source(err));
        }
    };

    let owner = ctx.user_id == fields.user_id && !ctx.is_anonymous();

    if !owner {
        let published = fields.public_hash.as_deref()
            .and_then(|hash| shared.links().get_by_public_hash(hash))
            .map(|record| {
                record.user_id == fields.user_id
                    && record.storage_type == fields.storage_type
                    && logical::is_within(&record.full_path(), &logical::join(&fields.path, &fields.name))
            })
            .unwrap_or(false);

        if !published {
            return Err(Er::new(ErrorKind::PermissionDenied)
                .context("token does not belong to the caller"));
        }
    }

    let location = locate(shared, &fields.user_id, &fields.storage_type, &fields.path).await?;

    Ok((fields, location))
}

/// re-resolves the item a token was handed out for
pub async fn resolve_token(shared: &Shared, ctx: &Context, token: &str) -> OpResult<FileItem> {
    let (fields, location) = token_location(shared, ctx, token).await?;

    project_at(shared, &location, &fields.name).await
}

pub async fn read_token(
    shared: &Shared,
    ctx: &Context,
    token: &str,
    offset: u64,
    length: Option<u64>,
) -> OpResult<(FileItem, Reader)> {
    let (fields, location) = token_location(shared, ctx, token).await?;

    open_range(shared, &location, &fields.name, offset, length).await
}

/// the item published under `public_hash`. needs no identity.
pub async fn public_item(shared: &Shared, public_hash: &str) -> OpResult<FileItem> {
    let (record, _) = published_location(shared, public_hash, "").await?;
    let parent = locate(shared, &record.user_id, &record.storage_type, &record.path).await?;

    project_at(shared, &parent, &record.name).await
}

/// reads a published file, or a file below a published folder
pub async fn read_public(
    shared: &Shared,
    public_hash: &str,
    path: &str,
    name: &str,
    offset: u64,
    length: Option<u64>,
) -> OpResult<(FileItem, Reader)> {
    let (record, location) = published_location(shared, public_hash, path).await?;

    if record.is_folder {
        open_range(shared, &location, name, offset, length).await
    } else {
        let parent = locate(shared, &record.user_id, &record.storage_type, &record.path).await?;

        open_range(shared, &parent, &record.name, offset, length).await
    }
}
