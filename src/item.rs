use std::collections::BTreeMap;
use std::fs::Metadata;

use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use vfs_lib::fs::is_link_name;
use vfs_lib::ids;
use vfs_lib::path as logical;
use vfs_lib::storage::StorageType;
use vfs_lib::token;

use crate::error::{ErrorKind, OpResult};
use crate::error::op::Kind;
use crate::links::link_key;
use crate::path::mtime_secs;
use crate::resolve::Location;
use crate::state::Shared;

/// link files larger than this are not parsed for their url
pub const MAX_LINK_FILE: u64 = 8 * 1024;

const LINK_HEADER: &str = "[InternetShortcut]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub name: String,
    pub url: String,
}

/// view of a single storage entry as returned by listings
#[derive(Debug, Clone, Serialize)]
pub struct FileItem {
    pub id: String,
    pub name: String,
    /// logical path of the parent
    pub path: String,
    pub full_path: String,
    pub storage_type: StorageType,
    pub size: u64,
    pub is_folder: bool,
    pub is_link: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    /// seconds since the unix epoch
    pub last_modified: i64,
    pub content_type: String,
    pub owner: ids::UserId,
    /// the entry was received from another user
    pub shared: bool,
    /// the first action is the primary one
    pub actions: Vec<Action>,
    pub extended_props: BTreeMap<String, Value>,
    pub etag: String,
    pub hash: String,
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_hash: Option<ids::PublicHash>,
    pub is_favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_name: Option<String>,
}

impl FileItem {
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|action| action.name == name)
    }

    pub fn primary_action(&self) -> Option<&Action> {
        self.actions.first()
    }
}

/// contents of an internet shortcut file pointing at `url`
pub fn link_contents(url: &str) -> String {
    format!("{LINK_HEADER}\r\nURL={url}\r\n")
}

/// finds the url of an internet shortcut
pub fn parse_link(contents: &str) -> Option<String> {
    contents.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("URL="))
        .map(|url| url.trim().to_owned())
        .filter(|url| !url.is_empty())
}

pub async fn read_link(physical: &std::path::Path, size: u64) -> OpResult<Option<String>> {
    if size > MAX_LINK_FILE {
        return Ok(None);
    }

    let mut contents = Vec::new();
    let file = tokio::fs::File::open(physical).await?;

    file.take(MAX_LINK_FILE).read_to_end(&mut contents).await?;

    // uploads may carry anything in a .url file
    Ok(parse_link(&String::from_utf8_lossy(&contents)))
}

pub fn content_type(name: &str, is_folder: bool) -> String {
    if is_folder {
        return String::from("inode/directory");
    }

    let guess: mime::Mime = mime_guess::from_path(name).first_or_octet_stream();

    guess.essence_str().to_owned()
}

pub fn etag(size: u64, modified: i64) -> String {
    format!("W/\"{modified:x}-{size:x}\"")
}

/// true for entries at the top of a user's shared storage. these were put
/// there by another user and can not be deleted by the receiver.
pub fn is_received_share(storage_type: &StorageType, parent: &str) -> bool {
    *storage_type == StorageType::Shared && logical::is_root(parent)
}

fn action_url(shared: &Shared, action: &str, hash: &str) -> String {
    format!("{}/{action}?token={hash}", shared.public_url())
}

/// projects the entry `name` of the location. an empty name projects the
/// location itself.
pub async fn project(
    shared: &Shared,
    location: &Location,
    name: &str,
    meta: &Metadata,
) -> OpResult<FileItem> {
    let (path, name) = if name.is_empty() {
        let (parent, name) = logical::split_full(&location.path);

        (parent.to_owned(), name.to_owned())
    } else {
        (location.path.clone(), name.to_owned())
    };
    let full_path = logical::join(&path, &name);
    let physical = location.root.join(full_path.trim_start_matches(logical::SEPARATOR));

    let is_folder = meta.is_dir();
    let size = if is_folder { 0 } else { meta.len() };
    let last_modified = mtime_secs(meta);
    let is_link = !is_folder && is_link_name(&name);
    let link_url = if is_link {
        read_link(&physical, size).await?
    } else {
        None
    };

    let received = !name.is_empty() && is_received_share(&location.storage_type, &path);
    let record = shared.links().get_by_key(&link_key(
        &location.user_id,
        &location.storage_type,
        &path,
        &name,
    ));
    let favorite = shared.favorites().get(&location.user_id, &location.storage_type, &full_path);

    let mut fields = token::Fields::new(
        location.user_id,
        location.storage_type.clone(),
        path.clone(),
        name.clone(),
    );

    if received {
        fields.shared = Some(true);
    }

    if let Some(record) = &record {
        fields.public_hash = Some(record.public_hash.clone());
    }

    let hash = token::encode(shared.token_key(), &fields)
        .kind(ErrorKind::InternalFailure)?;

    let mut actions = Vec::new();

    if is_folder {
        actions.push(Action {
            name: "list".into(),
            url: action_url(shared, "list", &hash),
        });
    } else if let Some(url) = &link_url {
        actions.push(Action {
            name: "open".into(),
            url: url.clone(),
        });
    } else {
        actions.push(Action {
            name: "view".into(),
            url: action_url(shared, "view", &hash),
        });
        actions.push(Action {
            name: "download".into(),
            url: action_url(shared, "download", &hash),
        });
    }

    Ok(FileItem {
        id: name.clone(),
        content_type: content_type(&name, is_folder),
        name,
        path,
        full_path,
        storage_type: location.storage_type.clone(),
        size,
        is_folder,
        is_link,
        link_url,
        last_modified,
        owner: location.user_id,
        shared: received,
        actions,
        extended_props: BTreeMap::new(),
        etag: etag(size, last_modified),
        hash,
        published: record.is_some(),
        public_hash: record.map(|r| r.public_hash),
        is_favorite: favorite.is_some(),
        favorite_name: favorite.map(|f| f.display_name),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn link_file_contents() {
        let contents = link_contents("https://example.com/page?q=1");

        assert_eq!(contents, "[InternetShortcut]\r\nURL=https://example.com/page?q=1\r\n");
        assert_eq!(parse_link(&contents).as_deref(), Some("https://example.com/page?q=1"));
        assert_eq!(parse_link("[InternetShortcut]\r\n"), None);
        assert_eq!(parse_link("URL=\r\n"), None);
    }

    #[test]
    fn received_shares() {
        assert!(is_received_share(&StorageType::Shared, ""));
        assert!(!is_received_share(&StorageType::Shared, "/from_bob"));
        assert!(!is_received_share(&StorageType::Personal, ""));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type("report.pdf", false), mime::APPLICATION_PDF.essence_str());
        assert_eq!(content_type("unknown.zzzz", false), "application/octet-stream");
        assert_eq!(content_type("docs", true), "inode/directory");
    }
}
