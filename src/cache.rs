//! Read-through cache in front of user-by-id lookups.
//!
//! Entries are copied in on [`UserCache::set`] and copied out on
//! [`UserCache::get`], so nothing a caller does to a returned `User` can leak
//! back into the cache. Writers invalidate with [`UserCache::delete`] instead of
//! updating in place; the next read goes to the database.
//!
//! A loader that raced a writer must not put the pre-write row back: it takes
//! [`UserCache::generation`] before reading the database and stores through
//! [`UserCache::set_if_unchanged`], which refuses once a delete has happened
//! in between.
//!
//! Expired entries are treated as absent on read and removed by a background
//! sweeper thread that lives as long as the cache.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::models::user::User;

struct Entry {
    user: User,
    expires_at: Instant,
}

struct Entries {
    map: DashMap<i64, Entry>,
    /// Bumped by every delete of an id. One counter per id ever invalidated.
    invalidations: DashMap<i64, u64>,
    ttl: Duration,
}

impl Entries {
    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.map.len())
    }
}

struct Sweeper {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct UserCache {
    entries: Arc<Entries>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl UserCache {
    /// Creates a cache whose entries live for `ttl` and starts a sweeper that
    /// drops expired entries every `sweep_interval`.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> UserCache {
        let entries = Arc::new(Entries {
            map: DashMap::new(),
            invalidations: DashMap::new(),
            ttl,
        });
        let sweeper = spawn_sweeper(Arc::clone(&entries), sweep_interval);
        UserCache {
            entries,
            sweeper: Mutex::new(sweeper),
        }
    }

    pub fn get(&self, user_id: i64) -> Option<User> {
        let now = Instant::now();
        {
            let entry = self.entries.map.get(&user_id)?;
            if entry.expires_at > now {
                return Some(entry.user.clone());
            }
        }
        // The shard guard is released above; removing while holding it deadlocks.
        self.entries
            .map
            .remove_if(&user_id, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn set(&self, user_id: i64, user: &User) {
        self.entries.map.insert(user_id, self.entry(user));
    }

    /// Invalidation count of `user_id`, to be passed to
    /// [`set_if_unchanged`](Self::set_if_unchanged) after loading the row.
    pub fn generation(&self, user_id: i64) -> u64 {
        self.entries
            .invalidations
            .get(&user_id)
            .map_or(0, |generation| *generation)
    }

    /// Stores `user` only if `user_id` was not deleted since `generation` was
    /// read. Returns whether it was stored.
    pub fn set_if_unchanged(&self, user_id: i64, generation: u64, user: &User) -> bool {
        // Holding the counter's shard keeps a concurrent delete out until the insert is done.
        let current = self.entries.invalidations.entry(user_id).or_insert(0);
        if *current != generation {
            trace!(user_id, "skipped caching a row loaded before an invalidation");
            return false;
        }
        self.entries.map.insert(user_id, self.entry(user));
        true
    }

    pub fn delete(&self, user_id: i64) {
        let mut generation = self.entries.invalidations.entry(user_id).or_insert(0);
        *generation += 1;
        self.entries.map.remove(&user_id);
    }

    fn entry(&self, user: &User) -> Entry {
        Entry {
            user: user.clone(),
            expires_at: Instant::now() + self.entries.ttl,
        }
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.map.is_empty()
    }

    /// Drops every expired entry now and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.entries.purge_expired()
    }

    /// Stops the sweeper and waits for it to exit. Idempotent.
    pub fn close(&self) {
        let sweeper = match self.sweeper.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(Sweeper { stop, handle }) = sweeper {
            // A send error only means the thread is already gone.
            let _ = stop.send(());
            if handle.join().is_err() {
                warn!("user cache sweeper panicked");
            }
            debug!("user cache sweeper stopped");
        }
    }
}

impl Drop for UserCache {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_sweeper(entries: Arc<Entries>, interval: Duration) -> Option<Sweeper> {
    let (stop, stopped) = mpsc::channel::<()>();
    let spawned = thread::Builder::new()
        .name("user-cache-sweeper".into())
        .spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let removed = entries.purge_expired();
                    trace!(removed, "swept user cache");
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

    match spawned {
        Ok(handle) => Some(Sweeper { stop, handle }),
        Err(err) => {
            warn!(error = %err, "could not start user cache sweeper, relying on expiry at read time");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, bio: &str) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password_hash: "hash".to_owned(),
            bio: bio.to_owned(),
            image: String::new(),
            version: 1,
        }
    }

    fn long_lived() -> UserCache {
        UserCache::new(Duration::from_secs(60), Duration::from_secs(60))
    }

    #[test]
    fn miss_then_hit() {
        let cache = long_lived();
        assert_eq!(cache.get(1), None);

        cache.set(1, &user(1, "hello"));
        assert_eq!(cache.get(1), Some(user(1, "hello")));
    }

    #[test]
    fn returned_copies_do_not_alias_the_entry() {
        let cache = long_lived();
        let mut original = user(1, "original");
        cache.set(1, &original);

        original.bio = "changed after set".to_owned();
        let mut fetched = cache.get(1).unwrap();
        assert_eq!(fetched.bio, "original");

        fetched.bio = "changed after get".to_owned();
        assert_eq!(cache.get(1).unwrap().bio, "original");
    }

    #[test]
    fn delete_invalidates() {
        let cache = long_lived();
        cache.set(1, &user(1, "old"));
        cache.delete(1);
        assert_eq!(cache.get(1), None);

        // deleting an absent entry is a no-op
        cache.delete(1);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_if_unchanged_refuses_rows_loaded_before_a_delete() {
        let cache = long_lived();
        let before = cache.generation(1);
        cache.set(1, &user(1, "old"));
        cache.delete(1);

        assert!(!cache.set_if_unchanged(1, before, &user(1, "old")));
        assert_eq!(cache.get(1), None);

        let after = cache.generation(1);
        assert_ne!(before, after);
        assert!(cache.set_if_unchanged(1, after, &user(1, "new")));
        assert_eq!(cache.get(1).map(|u| u.bio), Some("new".to_owned()));
    }

    #[test]
    fn generations_are_per_user() {
        let cache = long_lived();
        let first = cache.generation(1);
        cache.delete(2);

        assert_eq!(cache.generation(1), first);
        assert!(cache.set_if_unchanged(1, first, &user(1, "unaffected")));
    }

    #[test]
    fn expired_entries_read_as_absent() {
        let cache = UserCache::new(Duration::from_millis(20), Duration::from_secs(60));
        cache.set(1, &user(1, "short lived"));
        thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get(1), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let cache = UserCache::new(Duration::from_millis(20), Duration::from_secs(60));
        cache.set(1, &user(1, "stale"));
        thread::sleep(Duration::from_millis(40));
        cache.set(2, &user(2, "fresh"));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn sweeper_runs_in_background() {
        let cache = UserCache::new(Duration::from_millis(10), Duration::from_millis(10));
        cache.set(1, &user(1, "stale"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !cache.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn close_is_idempotent_and_cache_still_serves_reads() {
        let cache = long_lived();
        cache.set(1, &user(1, "kept"));
        cache.close();
        cache.close();
        assert_eq!(cache.get(1).map(|u| u.bio), Some("kept".to_owned()));
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache = Arc::new(long_lived());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for n in 0..200 {
                        let id = (i * 200 + n) % 50;
                        cache.set(id, &user(id, "x"));
                        if let Some(found) = cache.get(id) {
                            assert_eq!(found.id, id);
                        }
                        if n % 7 == 0 {
                            cache.delete(id);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 50);
    }
}
