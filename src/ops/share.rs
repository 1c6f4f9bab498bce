use chrono::Utc;
use serde_json::json;
use vfs_lib::ids;
use vfs_lib::storage::StorageType;

use crate::context::{Ability, Context};
use crate::error::OpResult;
use crate::favorites::FavoriteEntry;
use crate::hooks::Event;
use crate::links::{link_key, LinkRecord};
use crate::state::Shared;

use super::{after_hooks, check_name, entry_metadata, locate, persist};

/// publishes an item. publishing an item twice returns the existing record.
pub async fn create_public_link(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
) -> OpResult<LinkRecord> {
    ctx.ensure(Ability::Write)?;
    check_name(name)?;

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;
    let meta = entry_metadata(&location, name).await?;
    let key = link_key(&ctx.user_id, storage_type, &location.path, name);

    if let Some(existing) = shared.links().get_by_key(&key) {
        return Ok(existing);
    }

    let record = LinkRecord {
        user_id: ctx.user_id,
        storage_type: storage_type.clone(),
        path: location.path.clone(),
        name: name.to_owned(),
        size: if meta.is_dir() { 0 } else { meta.len() },
        is_folder: meta.is_dir(),
        public_hash: ids::create_public_hash(),
        created: Utc::now(),
    };

    shared.links().put(key, record.clone());

    tracing::info!("user {} published {storage_type}:\"{}\"", ctx.user_id, record.full_path());

    persist(shared).await;

    after_hooks(shared, Event::CreatePublicLink, &json!({
        "user_id": ctx.user_id,
        "storage_type": storage_type,
        "path": record.path,
        "name": record.name,
        "public_hash": record.public_hash,
    }));

    Ok(record)
}

/// succeeds whether or not the item was published
pub async fn delete_public_link(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
) -> OpResult<()> {
    ctx.ensure(Ability::Write)?;
    check_name(name)?;

    let normalized = vfs_lib::path::normalize(path)?;
    let key = link_key(&ctx.user_id, storage_type, &normalized, name);

    if shared.links().delete(&key).is_some() {
        tracing::info!("user {} unpublished {storage_type}:\"{}\"", ctx.user_id, vfs_lib::path::join(&normalized, name));

        persist(shared).await;
    }

    Ok(())
}

pub fn public_links(shared: &Shared, ctx: &Context) -> OpResult<Vec<LinkRecord>> {
    ctx.ensure(Ability::Read)?;

    Ok(shared.links().records_for_user(&ctx.user_id))
}

/// returns None when the item does not exist
pub async fn add_to_favorites(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
) -> OpResult<Option<FavoriteEntry>> {
    ctx.ensure(Ability::Write)?;
    check_name(name)?;

    let location = match locate(shared, &ctx.user_id, storage_type, path).await {
        Ok(location) => location,
        Err(err) if !matches!(err.kind(), crate::error::ErrorKind::PermissionDenied) => {
            tracing::debug!("favorite skipped, path did not resolve: {err}");

            return Ok(None);
        },
        Err(err) => return Err(err),
    };

    if entry_metadata(&location, name).await.is_err() {
        tracing::debug!("favorite skipped, \"{}\" was not found", location.logical_child(name));

        return Ok(None);
    }

    let entry = shared.favorites().add(&ctx.user_id, storage_type, &location.logical_child(name), name);

    persist(shared).await;

    Ok(Some(entry))
}

/// true if there was a favorite to remove
pub async fn remove_from_favorites(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    full_path: &str,
) -> OpResult<bool> {
    ctx.ensure(Ability::Write)?;

    let normalized = vfs_lib::path::normalize(full_path)?;
    let removed = shared.favorites().remove(&ctx.user_id, storage_type, &normalized).is_some();

    if removed {
        persist(shared).await;
    }

    Ok(removed)
}

pub fn favorites(shared: &Shared, ctx: &Context) -> OpResult<Vec<FavoriteEntry>> {
    ctx.ensure(Ability::Read)?;

    Ok(shared.favorites().for_user(&ctx.user_id))
}
