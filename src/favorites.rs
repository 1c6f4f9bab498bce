use std::collections::HashSet;
use std::path::PathBuf;

use dashmap::DashMap;
use serde::{Serialize, Deserialize};
use vfs_lib::fs::display_name;
use vfs_lib::ids;
use vfs_lib::path as logical;
use vfs_lib::storage::StorageType;

use crate::error::{self, OpResult};
use crate::snapshot::Snapshot;

type FavoriteKey = (ids::UserId, StorageType, String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub user_id: ids::UserId,
    pub storage_type: StorageType,
    pub full_path: String,
    /// unique across all favorites of the user
    pub display_name: String,
}

impl FavoriteEntry {
    fn key(&self) -> FavoriteKey {
        (self.user_id, self.storage_type.clone(), self.full_path.clone())
    }
}

#[derive(Debug, Default)]
pub struct Favorites {
    entries: DashMap<FavoriteKey, FavoriteEntry>,
    snapshot: Option<Snapshot>,
}

impl Favorites {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn open<P>(path: P) -> error::Result<Self>
    where
        P: Into<PathBuf>
    {
        let snapshot = Snapshot::new(path);
        let loaded: Vec<FavoriteEntry> = snapshot.load()?;
        let entries = DashMap::with_capacity(loaded.len());

        for entry in loaded {
            entries.insert(entry.key(), entry);
        }

        tracing::debug!("loaded {} favorites from \"{}\"", entries.len(), snapshot.path().display());

        Ok(Favorites {
            entries,
            snapshot: Some(snapshot),
        })
    }

    fn names_for(&self, user_id: &ids::UserId) -> HashSet<String> {
        self.entries.iter()
            .filter(|entry| entry.user_id == *user_id)
            .map(|entry| entry.display_name.clone())
            .collect()
    }

    /// adds the item under `name`, or under `name (n)` when the user already
    /// has a favorite with that name. adding an existing favorite returns it
    /// unchanged.
    pub fn add(
        &self,
        user_id: &ids::UserId,
        storage_type: &StorageType,
        full_path: &str,
        name: &str,
    ) -> FavoriteEntry {
        let key = (*user_id, storage_type.clone(), full_path.to_owned());

        if let Some(existing) = self.entries.get(&key) {
            return existing.value().clone();
        }

        let taken = self.names_for(user_id);
        let mut candidate = name.to_owned();
        let mut n = 1;

        while taken.contains(&candidate) {
            candidate = display_name(name, n);
            n += 1;
        }

        let entry = FavoriteEntry {
            user_id: *user_id,
            storage_type: storage_type.clone(),
            full_path: full_path.to_owned(),
            display_name: candidate,
        };

        self.entries.insert(key, entry.clone());

        entry
    }

    pub fn remove(&self, user_id: &ids::UserId, storage_type: &StorageType, full_path: &str) -> Option<FavoriteEntry> {
        self.entries.remove(&(*user_id, storage_type.clone(), full_path.to_owned()))
            .map(|(_, entry)| entry)
    }

    pub fn get(&self, user_id: &ids::UserId, storage_type: &StorageType, full_path: &str) -> Option<FavoriteEntry> {
        self.entries.get(&(*user_id, storage_type.clone(), full_path.to_owned()))
            .map(|found| found.value().clone())
    }

    pub fn for_user(&self, user_id: &ids::UserId) -> Vec<FavoriteEntry> {
        let mut rtn: Vec<FavoriteEntry> = self.entries.iter()
            .filter(|entry| entry.user_id == *user_id)
            .map(|entry| entry.value().clone())
            .collect();

        rtn.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        rtn
    }

    fn keys_within(&self, user_id: &ids::UserId, storage_type: &StorageType, full_path: &str) -> Vec<FavoriteKey> {
        self.entries.iter()
            .filter(|entry| {
                entry.user_id == *user_id
                    && entry.storage_type == *storage_type
                    && logical::is_within(full_path, &entry.full_path)
            })
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// points favorites at or below `old_full` to the matching path below
    /// `new_full`. returns the number of entries moved.
    pub fn move_within(
        &self,
        user_id: &ids::UserId,
        old_type: &StorageType,
        old_full: &str,
        new_type: &StorageType,
        new_full: &str,
    ) -> usize {
        let mut moved = 0;

        for key in self.keys_within(user_id, old_type, old_full) {
            let Some((_, mut entry)) = self.entries.remove(&key) else {
                continue;
            };

            if let Some(rebased) = logical::rebase(&entry.full_path, old_full, new_full) {
                entry.storage_type = new_type.clone();
                entry.full_path = rebased;
                moved += 1;
            }

            self.entries.insert(entry.key(), entry);
        }

        moved
    }

    /// drops favorites at or below `full_path`. returns the number removed.
    pub fn remove_within(&self, user_id: &ids::UserId, storage_type: &StorageType, full_path: &str) -> usize {
        let mut removed = 0;

        for key in self.keys_within(user_id, storage_type, full_path) {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }

        removed
    }

    pub async fn persist(&self) -> OpResult<()> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };

        snapshot.save(|| {
            self.entries.iter()
                .map(|entry| entry.value().clone())
                .collect::<Vec<FavoriteEntry>>()
        }).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unique_display_names() {
        let favorites = Favorites::new();
        let first = favorites.add(&1, &StorageType::Personal, "/a/report.pdf", "report.pdf");
        let second = favorites.add(&1, &StorageType::Personal, "/b/report.pdf", "report.pdf");
        let third = favorites.add(&1, &StorageType::Corporate, "/report.pdf", "report.pdf");
        let other_user = favorites.add(&2, &StorageType::Personal, "/a/report.pdf", "report.pdf");

        assert_eq!(first.display_name, "report.pdf");
        assert_eq!(second.display_name, "report (1).pdf");
        assert_eq!(third.display_name, "report (2).pdf");
        assert_eq!(other_user.display_name, "report.pdf");

        let again = favorites.add(&1, &StorageType::Personal, "/b/report.pdf", "ignored");

        assert_eq!(again, second);
        assert_eq!(favorites.for_user(&1).len(), 3);
    }

    #[test]
    fn follows_moves() {
        let favorites = Favorites::new();

        favorites.add(&1, &StorageType::Personal, "/docs/a.txt", "a.txt");
        favorites.add(&1, &StorageType::Personal, "/docs/sub/b.txt", "b.txt");
        favorites.add(&1, &StorageType::Personal, "/docs2/c.txt", "c.txt");

        assert_eq!(favorites.move_within(&1, &StorageType::Personal, "/docs", &StorageType::Personal, "/archive/docs"), 2);

        assert!(favorites.get(&1, &StorageType::Personal, "/archive/docs/a.txt").is_some());
        assert!(favorites.get(&1, &StorageType::Personal, "/archive/docs/sub/b.txt").is_some());
        assert!(favorites.get(&1, &StorageType::Personal, "/docs2/c.txt").is_some());

        assert_eq!(favorites.remove_within(&1, &StorageType::Personal, "/archive"), 2);
        assert_eq!(favorites.for_user(&1).len(), 1);
    }
}
