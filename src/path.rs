use std::path::{PathBuf, Path, Component};
use std::fs::Metadata;
use std::io::ErrorKind;

use chrono::{DateTime, Utc};

pub fn metadata<P>(path: P) -> Result<Option<Metadata>, std::io::Error>
where
    P: AsRef<Path>
{
    match path.as_ref().metadata() {
        Ok(m) => Ok(Some(m)),
        Err(err) => match err.kind() {
            ErrorKind::NotFound => Ok(None),
            _ => Err(err)
        }
    }
}

pub async fn async_metadata<P>(path: P) -> Result<Option<Metadata>, std::io::Error>
where
    P: AsRef<Path>
{
    match tokio::fs::metadata(path).await {
        Ok(m) => Ok(Some(m)),
        Err(err) => match err.kind() {
            ErrorKind::NotFound => Ok(None),
            _ => Err(err)
        }
    }
}

/// lexically resolves `.` and `..` components without touching the
/// filesystem
pub fn normalize<P>(path: P) -> PathBuf
where
    P: AsRef<Path>
{
    let mut rtn = PathBuf::new();

    for comp in path.as_ref().components() {
        match comp {
            Component::ParentDir => {
                rtn.pop();
            }
            Component::CurDir => {}
            Component::Prefix(_) |
            Component::RootDir |
            Component::Normal(_) => {
                rtn.push(comp.as_os_str());
            }
        }
    }

    rtn
}

/// last modified time as epoch seconds, 0 if the platform does not report
/// one
pub fn mtime_secs(meta: &Metadata) -> i64 {
    meta.modified()
        .map(|time| DateTime::<Utc>::from(time).timestamp())
        .unwrap_or(0)
}

/// true when both metadata describe the same entry on disk, e.g. two names
/// that differ only by case on a case insensitive filesystem
#[cfg(unix)]
pub fn same_entry(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;

    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
pub fn same_entry(_a: &Metadata, _b: &Metadata) -> bool {
    false
}
