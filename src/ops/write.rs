use std::io::SeekFrom;

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use vfs_lib::fs::{first_free_name, link_name};
use vfs_lib::storage::StorageType;

use crate::context::{Ability, Context};
use crate::error::{Er, ErrorKind, OpResult};
use crate::hooks::Event;
use crate::item::{self, FileItem};
use crate::quota;
use crate::resolve::Location;
use crate::state::Shared;

use super::{after_hooks, before_hooks, check_name, ensure_dir, entry_metadata, locate, Proceed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeType {
    /// replace the whole file
    Overwrite,
    /// add to the end. the first chunk has an offset of 0
    Append,
    /// write starting at `offset` bytes from the start
    FromStart,
    /// write starting at `offset` bytes before the end
    FromEnd,
}

impl TryFrom<u8> for RangeType {
    type Error = ErrorKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RangeType::Overwrite),
            1 => Ok(RangeType::Append),
            2 => Ok(RangeType::FromStart),
            3 => Ok(RangeType::FromEnd),
            _ => Err(ErrorKind::InvalidInput),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub range_type: RangeType,
    pub offset: u64,
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            range_type: RangeType::Overwrite,
            offset: 0,
            overwrite: false,
        }
    }
}

/// the incoming bytes of a write
pub struct Upload<R> {
    pub reader: R,
    /// number of bytes the reader will produce
    pub length: u64,
}

impl<R> Upload<R> {
    pub fn new(reader: R, length: u64) -> Self {
        Upload { reader, length }
    }
}

impl Upload<std::io::Cursor<Vec<u8>>> {
    pub fn from_bytes<B>(bytes: B) -> Self
    where
        B: Into<Vec<u8>>
    {
        let bytes = bytes.into();
        let length = bytes.len() as u64;

        Upload::new(std::io::Cursor::new(bytes), length)
    }
}

async fn free_name(location: &Location, name: &str) -> OpResult<String> {
    let dir = location.dir.clone();
    let name = name.to_owned();

    let rtn = tokio::task::spawn_blocking(move || {
        first_free_name(&name, |candidate| dir.join(candidate).exists())
    }).await?;

    Ok(rtn)
}

async fn exists(location: &Location, name: &str) -> OpResult<bool> {
    Ok(crate::path::async_metadata(location.child(name)?).await?.is_some())
}

/// writes the reader to a tmp file next to the target and renames it into
/// place once complete
async fn write_replace<R>(location: &Location, name: &str, upload: &mut Upload<R>) -> OpResult<u64>
where
    R: AsyncRead + Unpin
{
    let target = location.child(name)?;
    let tmp = location.dir.join(format!(".{name}.upload"));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        let written = tokio::io::copy(&mut (&mut upload.reader).take(upload.length), &mut file).await?;

        file.flush().await?;

        drop(file);

        tokio::fs::rename(&tmp, &target).await?;

        OpResult::Ok(written)
    }.await;

    match result {
        Ok(written) => Ok(written),
        Err(err) => {
            if let Err(rm_err) = tokio::fs::remove_file(&tmp).await {
                tracing::warn!("failed to remove upload tmp file \"{}\": {rm_err}", tmp.display());
            }

            Err(err)
        }
    }
}

async fn write_at<R>(
    location: &Location,
    name: &str,
    upload: &mut Upload<R>,
    options: &WriteOptions,
) -> OpResult<u64>
where
    R: AsyncRead + Unpin
{
    let target = location.child(name)?;
    let present = exists(location, name).await?;

    let mut file = match options.range_type {
        RangeType::Append => {
            if options.offset == 0 {
                if present && !options.overwrite {
                    return Err(Er::new(ErrorKind::AlreadyExists)
                        .context(format!("\"{}\" already exists", location.logical_child(name))));
                }

                tokio::fs::File::create(&target).await?
            } else {
                if !present {
                    return Err(Er::new(ErrorKind::NotFound)
                        .context(format!("\"{}\" was not found to append to", location.logical_child(name))));
                }

                tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(&target)
                    .await?
            }
        },
        RangeType::FromStart | RangeType::FromEnd => {
            if !present {
                return Err(Er::new(ErrorKind::NotFound)
                    .context(format!("\"{}\" was not found to update", location.logical_child(name))));
            }

            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .open(&target)
                .await?;

            let pos = if options.range_type == RangeType::FromStart {
                SeekFrom::Start(options.offset)
            } else {
                let back = i64::try_from(options.offset).map_err(|_| {
                    Er::new(ErrorKind::InvalidInput).context("offset is too large")
                })?;

                SeekFrom::End(-back)
            };

            file.seek(pos).await?;
            file
        },
        RangeType::Overwrite => return write_replace(location, name, upload).await,
    };

    let written = tokio::io::copy(&mut (&mut upload.reader).take(upload.length), &mut file).await?;

    file.flush().await?;

    Ok(written)
}

/// writes an uploaded file into the folder at `path`. the upload size limit
/// and quota are checked before anything is written.
pub async fn create_file<R>(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
    mut upload: Upload<R>,
    options: WriteOptions,
) -> OpResult<FileItem>
where
    R: AsyncRead + Unpin
{
    ctx.ensure(Ability::Write)?;
    check_name(name)?;

    let limit = shared.upload_limit();

    if limit > 0 && upload.length > limit {
        return Err(Er::new(ErrorKind::MaxSize)
            .context(format!("upload of {} bytes is over the limit of {limit} bytes", upload.length)));
    }

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;

    ensure_dir(&location).await?;

    let args = json!({
        "user_id": ctx.user_id,
        "storage_type": storage_type,
        "path": location.path,
        "name": name,
        "length": upload.length,
        "offset": options.offset,
    });

    let mut name = name.to_owned();

    if let Proceed::Skip(result) = before_hooks(shared, Event::CreateFile, &args)? {
        if let Some(stored) = result.get("name").and_then(Value::as_str) {
            name = stored.to_owned();
        }

        let meta = entry_metadata(&location, &name).await?;

        return item::project(shared, &location, &name, &meta).await;
    }

    quota::check_quota(shared, &ctx.user_id, storage_type, upload.length).await?;

    let written = if options.range_type == RangeType::Overwrite {
        if !options.overwrite && exists(&location, &name).await? {
            name = free_name(&location, &name).await?;
        }

        write_replace(&location, &name, &mut upload).await?
    } else {
        write_at(&location, &name, &mut upload, &options).await?
    };

    tracing::info!(
        "user {} wrote {written} bytes to {storage_type}:\"{}\"",
        ctx.user_id,
        location.logical_child(&name)
    );

    let meta = entry_metadata(&location, &name).await?;
    let rtn = item::project(shared, &location, &name, &meta).await?;

    after_hooks(shared, Event::CreateFile, &json!({
        "user_id": ctx.user_id,
        "storage_type": storage_type,
        "path": rtn.path,
        "name": rtn.name,
        "size": rtn.size,
    }));

    Ok(rtn)
}

pub async fn create_folder(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: &str,
) -> OpResult<FileItem> {
    ctx.ensure(Ability::Write)?;
    check_name(name)?;

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;

    ensure_dir(&location).await?;

    tokio::fs::create_dir(location.child(name)?).await.map_err(|err| {
        let kind = ErrorKind::from(err.kind());

        Er::new(kind)
            .context(format!("failed to create \"{}\"", location.logical_child(name)))
            .source(err)
    })?;

    tracing::info!("user {} created folder {storage_type}:\"{}\"", ctx.user_id, location.logical_child(name));

    let meta = entry_metadata(&location, name).await?;
    let rtn = item::project(shared, &location, name, &meta).await?;

    after_hooks(shared, Event::CreateFolder, &json!({
        "user_id": ctx.user_id,
        "storage_type": storage_type,
        "path": rtn.path,
        "name": rtn.name,
    }));

    Ok(rtn)
}

fn check_link_url(given: &str) -> OpResult<url::Url> {
    let url = url::Url::parse(given.trim()).map_err(|err| {
        Er::new(ErrorKind::InvalidInput)
            .context(format!("\"{given}\" is not a valid url"))
            .source(err)
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Er::new(ErrorKind::InvalidInput)
            .context(format!("links must be http or https urls, given \"{scheme}\""))),
    }
}

fn name_from_url(url: &url::Url) -> String {
    let last = url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .filter(|s| vfs_lib::fs::basename_valid(s));

    match (url.host_str(), last) {
        (_, Some(last)) => last.to_owned(),
        (Some(host), None) => host.to_owned(),
        (None, None) => String::from("link"),
    }
}

/// creates an internet shortcut pointing at `url`. without a name the
/// CheckUrl hooks are asked for one, falling back to a name taken from the
/// url itself.
pub async fn create_link(
    shared: &Shared,
    ctx: &Context,
    storage_type: &StorageType,
    path: &str,
    name: Option<&str>,
    url: &str,
) -> OpResult<FileItem> {
    ctx.ensure(Ability::Write)?;

    let url = check_link_url(url)?;

    let mut hook_result = Value::Null;
    let hook_name = match shared.hooks().before(Event::CheckUrl, &json!({ "url": url.as_str() }), &mut hook_result) {
        crate::hooks::Outcome::Handled(false) => return Err(Er::new(ErrorKind::Vetoed)
            .context(format!("url \"{url}\" was rejected"))),
        crate::hooks::Outcome::Handled(true) => hook_result.get("name")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        crate::hooks::Outcome::Pass => None,
    };

    let base = match (name, hook_name) {
        (Some(given), _) if !given.trim().is_empty() => given.trim().to_owned(),
        (_, Some(from_hook)) => from_hook,
        _ => name_from_url(&url),
    };
    let name = link_name(&base);

    check_name(&name)?;

    let location = locate(shared, &ctx.user_id, storage_type, path).await?;

    ensure_dir(&location).await?;

    if exists(&location, &name).await? {
        return Err(Er::new(ErrorKind::AlreadyExists)
            .context(format!("\"{}\" already exists", location.logical_child(&name))));
    }

    let contents = item::link_contents(url.as_str());

    quota::check_quota(shared, &ctx.user_id, storage_type, contents.len() as u64).await?;

    tokio::fs::write(location.child(&name)?, contents).await?;

    tracing::info!("user {} created link {storage_type}:\"{}\" -> {url}", ctx.user_id, location.logical_child(&name));

    let meta = entry_metadata(&location, &name).await?;

    item::project(shared, &location, &name, &meta).await
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn range_types() {
        assert_eq!(RangeType::try_from(0), Ok(RangeType::Overwrite));
        assert_eq!(RangeType::try_from(3), Ok(RangeType::FromEnd));
        assert_eq!(RangeType::try_from(4), Err(ErrorKind::InvalidInput));
    }

    #[test]
    fn link_urls() {
        assert!(check_link_url("https://example.com/a").is_ok());
        assert!(check_link_url("ftp://example.com/a").is_err());
        assert!(check_link_url("not a url").is_err());

        let url = check_link_url("https://example.com/docs/guide/").unwrap();
        assert_eq!(name_from_url(&url), "guide");

        let url = check_link_url("https://example.com").unwrap();
        assert_eq!(name_from_url(&url), "example.com");
    }
}
