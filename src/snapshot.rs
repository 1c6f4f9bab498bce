use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{self, Context, OpResult};

/// json file holding every record of an in memory table. written whole
/// after each change.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Snapshot {
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>
    {
        Snapshot {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// a missing file is an empty table
    pub fn load<T>(&self) -> error::Result<Vec<T>>
    where
        T: DeserializeOwned
    {
        let result = std::fs::OpenOptions::new()
            .read(true)
            .open(&self.path);

        match result {
            Ok(file) => serde_json::from_reader(std::io::BufReader::new(file))
                .context(format!("failed to read snapshot \"{}\"", self.path.display())),
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Ok(Vec::new()),
                _ => Err(err.into()),
            }
        }
    }

    /// writes to a sibling tmp file then renames it over the snapshot so a
    /// crash never leaves a partial file behind. `collect` runs once the
    /// file lock is held so the last write always carries the newest state.
    pub async fn save<T, F>(&self, collect: F) -> OpResult<()>
    where
        T: Serialize,
        F: FnOnce() -> Vec<T>,
    {
        let _guard = self.lock.lock().await;
        let records = collect();
        let json_buffer = serde_json::to_vec(&records)
            .map_err(std::io::Error::from)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");

        let mut file = tokio::fs::File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .await?;

        file.write_all(&json_buffer).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("saved {} records to \"{}\"", records.len(), self.path.display());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn collects_after_waiting_on_lock() {
        let dir = tempfile::tempdir().expect("failed to create tmp dir");
        let snapshot = Arc::new(Snapshot::new(dir.path().join("records.json")));
        let table = Arc::new(std::sync::Mutex::new(vec![1u32]));

        let guard = snapshot.lock.lock().await;

        let pending = {
            let snapshot = snapshot.clone();
            let table = table.clone();

            tokio::spawn(async move {
                snapshot.save(|| table.lock().expect("table lock poisoned").clone()).await
            })
        };

        tokio::task::yield_now().await;

        table.lock().expect("table lock poisoned").push(2);

        drop(guard);

        pending.await
            .expect("save task panicked")
            .expect("failed to save snapshot");

        let saved: Vec<u32> = snapshot.load().expect("failed to load snapshot");

        assert_eq!(saved, vec![1, 2]);
    }
}
