//! the public link table. each record is keyed by the user, storage type and
//! location of the item it publishes and carries the public hash handed out
//! to anonymous visitors. the key changes whenever the item moves, the
//! public hash never does.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Serialize, Deserialize};
use vfs_lib::ids;
use vfs_lib::path as logical;
use vfs_lib::storage::StorageType;

use crate::error::{self, OpResult};
use crate::snapshot::Snapshot;

pub const KEY_SEPARATOR: char = '|';

pub fn link_key(
    user_id: &ids::UserId,
    storage_type: &StorageType,
    path: &str,
    name: &str,
) -> String {
    format!("{user_id}{KEY_SEPARATOR}{storage_type}{KEY_SEPARATOR}{path}{KEY_SEPARATOR}{name}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub user_id: ids::UserId,
    pub storage_type: StorageType,
    pub path: String,
    pub name: String,
    pub size: u64,
    pub is_folder: bool,
    pub public_hash: ids::PublicHash,
    pub created: DateTime<Utc>,
}

impl LinkRecord {
    pub fn key(&self) -> String {
        link_key(&self.user_id, &self.storage_type, &self.path, &self.name)
    }

    pub fn full_path(&self) -> String {
        logical::join(&self.path, &self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("no record for key \"{0}\"")]
    NotFound(String),

    #[error("key \"{0}\" already holds a different record")]
    KeyInUse(String),
}

#[derive(Debug, Default)]
pub struct LinkIndex {
    records: DashMap<String, LinkRecord>,
    by_hash: DashMap<ids::PublicHash, String>,
    snapshot: Option<Snapshot>,
}

impl LinkIndex {
    /// an index that lives only in memory
    pub fn new() -> Self {
        Default::default()
    }

    /// loads the index from a snapshot file, which is rewritten by
    /// [`LinkIndex::persist`]
    pub fn open<P>(path: P) -> error::Result<Self>
    where
        P: Into<PathBuf>
    {
        let snapshot = Snapshot::new(path);
        let loaded: Vec<LinkRecord> = snapshot.load()?;
        let rtn = LinkIndex {
            records: DashMap::with_capacity(loaded.len()),
            by_hash: DashMap::with_capacity(loaded.len()),
            snapshot: None,
        };

        for record in loaded {
            rtn.put(record.key(), record);
        }

        tracing::debug!("loaded {} link records from \"{}\"", rtn.len(), snapshot.path().display());

        Ok(LinkIndex {
            snapshot: Some(snapshot),
            ..rtn
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn put(&self, key: String, record: LinkRecord) {
        let hash = record.public_hash.clone();

        if let Some(replaced) = self.records.insert(key.clone(), record) {
            if replaced.public_hash != hash {
                self.by_hash.remove(&replaced.public_hash);
            }
        }

        self.by_hash.insert(hash, key);
    }

    pub fn get_by_key(&self, key: &str) -> Option<LinkRecord> {
        self.records.get(key).map(|found| found.value().clone())
    }

    pub fn get_by_public_hash(&self, hash: &str) -> Option<LinkRecord> {
        let key = self.by_hash.get(hash)?.value().clone();

        self.get_by_key(&key)
    }

    /// moves the record under `old_key` to `new_key`. the public hash of
    /// the old record is kept regardless of what `new_record` carries.
    pub fn rekey(&self, old_key: &str, mut new_record: LinkRecord, new_key: String) -> Result<(), IndexError> {
        if new_key != old_key {
            if self.records.contains_key(&new_key) {
                return Err(IndexError::KeyInUse(new_key));
            }
        }

        let Some((_, old)) = self.records.remove(old_key) else {
            return Err(IndexError::NotFound(old_key.to_owned()));
        };

        new_record.public_hash = old.public_hash;
        new_record.created = old.created;

        self.by_hash.insert(new_record.public_hash.clone(), new_key.clone());
        self.records.insert(new_key, new_record);

        Ok(())
    }

    pub fn delete(&self, key: &str) -> Option<LinkRecord> {
        let (_, removed) = self.records.remove(key)?;

        self.by_hash.remove_if(&removed.public_hash, |_, mapped| mapped == key);

        Some(removed)
    }

    fn within<'a>(
        &'a self,
        user_id: &'a ids::UserId,
        storage_type: &'a StorageType,
        full_path: &'a str,
    ) -> impl Iterator<Item = String> + 'a {
        self.records.iter()
            .filter(move |entry| {
                entry.user_id == *user_id
                    && entry.storage_type == *storage_type
                    && logical::is_within(full_path, &entry.full_path())
            })
            .map(|entry| entry.key().clone())
    }

    /// true if the item at `full_path` or anything below it is published
    pub fn has_within(&self, user_id: &ids::UserId, storage_type: &StorageType, full_path: &str) -> bool {
        self.within(user_id, storage_type, full_path).next().is_some()
    }

    /// keys of the item at `full_path` and everything below it
    pub fn keys_within(&self, user_id: &ids::UserId, storage_type: &StorageType, full_path: &str) -> Vec<String> {
        self.within(user_id, storage_type, full_path).collect()
    }

    pub fn records_for_user(&self, user_id: &ids::UserId) -> Vec<LinkRecord> {
        let mut rtn: Vec<LinkRecord> = self.records.iter()
            .filter(|entry| entry.user_id == *user_id)
            .map(|entry| entry.value().clone())
            .collect();

        rtn.sort_by(|a, b| a.created.cmp(&b.created));
        rtn
    }

    /// writes the snapshot if the index was opened from one
    pub async fn persist(&self) -> OpResult<()> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };

        snapshot.save(|| {
            self.records.iter()
                .map(|entry| entry.value().clone())
                .collect::<Vec<LinkRecord>>()
        }).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(path: &str, name: &str, hash: &str) -> LinkRecord {
        LinkRecord {
            user_id: 1,
            storage_type: StorageType::Personal,
            path: path.into(),
            name: name.into(),
            size: 10,
            is_folder: false,
            public_hash: hash.into(),
            created: Utc::now(),
        }
    }

    #[test]
    fn put_get_delete() {
        let index = LinkIndex::new();
        let rec = record("/docs", "a.txt", "hash_a");
        let key = rec.key();

        assert_eq!(key, "1|personal|/docs|a.txt");

        index.put(key.clone(), rec.clone());

        assert_eq!(index.get_by_key(&key), Some(rec.clone()));
        assert_eq!(index.get_by_public_hash("hash_a"), Some(rec.clone()));

        assert_eq!(index.delete(&key), Some(rec));
        assert!(index.get_by_key(&key).is_none());
        assert!(index.get_by_public_hash("hash_a").is_none());
        assert!(index.delete(&key).is_none());
    }

    #[test]
    fn rekey_keeps_hash() {
        let index = LinkIndex::new();
        let rec = record("/docs", "a.txt", "hash_a");
        let old_key = rec.key();

        index.put(old_key.clone(), rec);

        let moved = record("/docs", "b.txt", "ignored");
        let new_key = moved.key();

        if let Err(err) = index.rekey(&old_key, moved, new_key.clone()) {
            panic!("rekey failed: {err}");
        }

        assert!(index.get_by_key(&old_key).is_none());

        let found = index.get_by_public_hash("hash_a")
            .expect("record missing after rekey");

        assert_eq!(found.name, "b.txt");
        assert_eq!(found.public_hash, "hash_a");
        assert_eq!(found.key(), new_key);
        assert!(index.get_by_public_hash("ignored").is_none());
    }

    #[test]
    fn rekey_failures() {
        let index = LinkIndex::new();
        let a = record("/docs", "a.txt", "hash_a");
        let b = record("/docs", "b.txt", "hash_b");

        index.put(a.key(), a.clone());
        index.put(b.key(), b.clone());

        assert!(matches!(
            index.rekey(&a.key(), b.clone(), b.key()),
            Err(IndexError::KeyInUse(_))
        ));
        assert!(index.get_by_key(&a.key()).is_some(), "failed rekey removed the old record");

        assert!(matches!(
            index.rekey("1|personal|/docs|missing", a.clone(), String::from("1|personal|/x|y")),
            Err(IndexError::NotFound(_))
        ));
    }

    #[test]
    fn within_prefix() {
        let index = LinkIndex::new();

        for rec in [
            record("/docs", "a.txt", "h1"),
            record("/docs/sub", "b.txt", "h2"),
            record("", "docs", "h3"),
            record("/docs2", "c.txt", "h4"),
        ] {
            index.put(rec.key(), rec);
        }

        let mut keys = index.keys_within(&1, &StorageType::Personal, "/docs");
        keys.sort();

        assert_eq!(keys, vec![
            String::from("1|personal|/docs/sub|b.txt"),
            String::from("1|personal|/docs|a.txt"),
            String::from("1|personal||docs"),
        ]);
        assert!(!index.has_within(&1, &StorageType::Corporate, "/docs"));
        assert!(!index.has_within(&2, &StorageType::Personal, "/docs"));
    }

    #[tokio::test]
    async fn snapshot_reopen() {
        let dir = tempfile::tempdir().expect("failed to create tmp dir");
        let path = dir.path().join("links.json");

        let index = LinkIndex::open(&path).expect("failed to open empty index");
        let rec = record("/docs", "a.txt", "hash_a");

        index.put(rec.key(), rec.clone());
        index.persist().await.expect("failed to persist index");

        let reopened = LinkIndex::open(&path).expect("failed to reopen index");

        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get_by_public_hash("hash_a"), Some(rec));
    }
}
