//! In-memory tiered balance caches.
//!
//! Snapshot rows carry wall-clock timestamps rather than `Instant` so
//! staleness can also be judged against indexed-activity watermarks.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use veilpay_core::types::{AccountAddress, AddressBalanceCache, Chain, UserBalanceSummary};

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG & TIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// How recently an address saw activity, which decides its snapshot TTL.
/// Busy addresses go stale fast; dormant ones can coast on old snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTier {
    /// Activity within the hot window.
    Hot,
    /// Activity within the warm window.
    Warm,
    /// Dormant or never-seen.
    Cold,
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for hot addresses, in seconds.
    pub hot_ttl_seconds: i64,
    /// TTL for warm addresses, in seconds.
    pub warm_ttl_seconds: i64,
    /// TTL for cold addresses, in seconds.
    pub cold_ttl_seconds: i64,
    /// Activity younger than this is hot, in seconds.
    pub hot_window_seconds: i64,
    /// Activity younger than this (but not hot) is warm, in seconds.
    pub warm_window_seconds: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_ttl_seconds: 30,
            warm_ttl_seconds: 300,
            cold_ttl_seconds: 3_600,
            hot_window_seconds: 3_600,
            warm_window_seconds: 86_400,
        }
    }
}

impl CacheConfig {
    /// Classifies an address by its last observed activity.
    pub fn tier_of(&self, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ActivityTier {
        match last_activity {
            Some(at) if now - at <= Duration::seconds(self.hot_window_seconds) => ActivityTier::Hot,
            Some(at) if now - at <= Duration::seconds(self.warm_window_seconds) => {
                ActivityTier::Warm
            }
            _ => ActivityTier::Cold,
        }
    }

    /// The snapshot TTL for a tier.
    pub fn ttl_of(&self, tier: ActivityTier) -> Duration {
        let seconds = match tier {
            ActivityTier::Hot => self.hot_ttl_seconds,
            ActivityTier::Warm => self.warm_ttl_seconds,
            ActivityTier::Cold => self.cold_ttl_seconds,
        };
        Duration::seconds(seconds)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS SNAPSHOTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache of per-address RPC snapshots with activity-tiered TTLs.
#[derive(Debug, Default)]
pub struct AddressBalanceStore {
    entries: DashMap<(AccountAddress, Chain), AddressBalanceCache>,
    config: CacheConfig,
}

impl AddressBalanceStore {
    /// Creates a cache with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache with custom TTL tiers.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Returns the fresh snapshot for an address, if one exists. Snapshots
    /// past their tier TTL are treated as misses (but kept for [`peek`]).
    ///
    /// [`peek`]: AddressBalanceStore::peek
    pub fn get(&self, address: &AccountAddress, chain: Chain) -> Option<AddressBalanceCache> {
        let now = Utc::now();
        self.entries.get(&(*address, chain)).and_then(|entry| {
            let tier = self.config.tier_of(entry.last_activity, now);
            if entry.is_stale(self.config.ttl_of(tier), now) {
                None
            } else {
                Some(entry.clone())
            }
        })
    }

    /// Returns the snapshot regardless of staleness. Used by the last-resort
    /// read path, where an old number beats no number.
    pub fn peek(&self, address: &AccountAddress, chain: Chain) -> Option<AddressBalanceCache> {
        self.entries.get(&(*address, chain)).map(|e| e.clone())
    }

    /// Creates or replaces the snapshot for its address.
    pub fn upsert(&self, snapshot: AddressBalanceCache) {
        self.entries
            .insert((snapshot.address, snapshot.chain), snapshot);
    }

    /// Removes the snapshot for an address.
    pub fn remove(&self, address: &AccountAddress, chain: Chain) {
        self.entries.remove(&(*address, chain));
    }

    /// Removes every snapshot past its tier TTL. Returns how many were
    /// dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            let tier = self.config.tier_of(entry.last_activity, now);
            !entry.is_stale(self.config.ttl_of(tier), now)
        });
        before - self.entries.len()
    }

    /// Addresses whose snapshot is past its tier TTL, for refresh scheduling.
    pub fn stale_addresses(&self) -> Vec<(AccountAddress, Chain)> {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|entry| {
                let tier = self.config.tier_of(entry.last_activity, now);
                entry.is_stale(self.config.ttl_of(tier), now)
            })
            .map(|entry| *entry.key())
            .collect()
    }

    /// Returns the number of cached snapshots, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clears all snapshots.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// USER SUMMARIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache of per-(user, chain) balance summaries with activity watermarks.
#[derive(Debug, Default)]
pub struct UserSummaryStore {
    entries: DashMap<(Uuid, Chain), UserBalanceSummary>,
    config: CacheConfig,
}

impl UserSummaryStore {
    /// Creates a cache with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache with custom TTL tiers.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Returns the summary if it is fresh by both age and watermark.
    pub fn get(&self, user_id: Uuid, chain: Chain) -> Option<UserBalanceSummary> {
        let now = Utc::now();
        self.entries.get(&(user_id, chain)).and_then(|entry| {
            let tier = self.config.tier_of(entry.last_activity, now);
            if entry.is_stale(self.config.ttl_of(tier), now) {
                None
            } else {
                Some(entry.clone())
            }
        })
    }

    /// Creates or replaces a user's summary.
    pub fn upsert(&self, summary: UserBalanceSummary) {
        self.entries.insert((summary.user_id, summary.chain), summary);
    }

    /// Removes a user's summary.
    pub fn remove(&self, user_id: Uuid, chain: Chain) {
        self.entries.remove(&(user_id, chain));
    }

    /// Marks new activity for a user without recomputing the summary. The
    /// watermark makes the cached row stale immediately.
    pub fn mark_activity(&self, user_id: Uuid, chain: Chain, at: DateTime<Utc>) {
        if let Some(mut entry) = self.entries.get_mut(&(user_id, chain)) {
            entry.last_activity = Some(at);
        }
    }

    /// Removes every summary past its TTL or watermark. Returns how many
    /// were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            let tier = self.config.tier_of(entry.last_activity, now);
            !entry.is_stale(self.config.ttl_of(tier), now)
        });
        before - self.entries.len()
    }

    /// Returns the number of cached summaries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clears all summaries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
