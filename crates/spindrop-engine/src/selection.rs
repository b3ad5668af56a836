//! The core selection algorithm.
//!
//! One selection draws a fresh uniform seed in `[0, 1)` and scans the pool's
//! `random_seed` axis ascending from there, taking the first record that
//! passes the owner/seen filters. If the whole ascending batch is filtered
//! out (or empty), a second scan runs descending below the seed. Because
//! record seeds are themselves uniform, repeated selections spread
//! uniformly over the pool.
//!
//! After a device resets its history, a freshness window takes priority:
//! records uploaded since the reset are filtered and one is picked uniformly
//! at random, so new content surfaces before old unseen content does.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use spindrop_shared::constants::{FRESH_WINDOW_LIMIT, SAMPLE_BATCH_SIZE};
use spindrop_shared::photo::PhotoRecord;
use spindrop_shared::types::{AccountId, PhotoId, ScanDirection, Scope, SelectionRequest};
use spindrop_store::Database;

use crate::error::{EngineError, Result};

/// Stateless selection logic over a shared store handle.
///
/// The engine holds no per-device state; everything request-specific
/// arrives in the [`SelectionRequest`].
#[derive(Clone)]
pub struct SelectionEngine {
    store: Arc<Mutex<Database>>,
}

fn eligible(
    record: &PhotoRecord,
    excluded_owner: Option<AccountId>,
    excluded: &HashSet<PhotoId>,
) -> bool {
    if excluded.contains(&record.id) {
        return false;
    }
    match excluded_owner {
        Some(owner) => record.owner != owner,
        None => true,
    }
}

impl SelectionEngine {
    pub fn new(store: Arc<Mutex<Database>>) -> Self {
        Self { store }
    }

    /// Serve one selection request: freshness window first when a reset
    /// timestamp is present, seeded scan otherwise.
    pub fn select(&self, request: &SelectionRequest) -> Result<Option<PhotoRecord>> {
        let excluded: HashSet<PhotoId> = request.excluded_ids.iter().copied().collect();

        if let Some(reset_at) = request.last_reset_at {
            if let Some(record) = self.select_after_reset(
                reset_at,
                &request.scope,
                request.excluded_owner,
                &excluded,
            )? {
                return Ok(Some(record));
            }
        }

        self.select_one(&request.scope, request.excluded_owner, &excluded)
    }

    /// Seeded selection with a fresh random draw.
    pub fn select_one(
        &self,
        scope: &Scope,
        excluded_owner: Option<AccountId>,
        excluded: &HashSet<PhotoId>,
    ) -> Result<Option<PhotoRecord>> {
        let seed = rand::thread_rng().gen::<f64>();
        self.select_one_at(seed, scope, excluded_owner, excluded)
    }

    /// Seeded selection at an explicit draw. Deterministic given the pool;
    /// the public entry point above supplies the randomness.
    pub fn select_one_at(
        &self,
        seed: f64,
        scope: &Scope,
        excluded_owner: Option<AccountId>,
        excluded: &HashSet<PhotoId>,
    ) -> Result<Option<PhotoRecord>> {
        let store = self.store.lock().map_err(|_| EngineError::LockPoisoned)?;

        let ascending = store.sample_near(seed, scope, SAMPLE_BATCH_SIZE, ScanDirection::Ascending)?;
        if let Some(record) = ascending
            .into_iter()
            .find(|r| eligible(r, excluded_owner, excluded))
        {
            return Ok(Some(record));
        }

        // Wraparound: nothing usable at or above the seed, take the nearest
        // record below it.
        let descending =
            store.sample_near(seed, scope, SAMPLE_BATCH_SIZE, ScanDirection::Descending)?;
        if let Some(record) = descending
            .into_iter()
            .find(|r| eligible(r, excluded_owner, excluded))
        {
            return Ok(Some(record));
        }

        tracing::debug!(seed, ?scope, excluded = excluded.len(), "no candidate");
        Ok(None)
    }

    /// Freshness-priority variant: uniform pick among records created after
    /// `reset_at` that pass the filters. `Ok(None)` means the window is
    /// empty and the caller should fall back to the seeded scan.
    ///
    /// The window is capped at [`FRESH_WINDOW_LIMIT`] so a reset during a
    /// busy period still behaves like a random draw rather than a feed.
    pub fn select_after_reset(
        &self,
        reset_at: DateTime<Utc>,
        scope: &Scope,
        excluded_owner: Option<AccountId>,
        excluded: &HashSet<PhotoId>,
    ) -> Result<Option<PhotoRecord>> {
        let window = {
            let store = self.store.lock().map_err(|_| EngineError::LockPoisoned)?;
            store.recent_since(reset_at, scope, FRESH_WINDOW_LIMIT)?
        };

        let candidates: Vec<PhotoRecord> = window
            .into_iter()
            .filter(|r| eligible(r, excluded_owner, excluded))
            .collect();

        Ok(candidates.choose(&mut rand::thread_rng()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;

    fn engine_with(photos: &[PhotoRecord]) -> SelectionEngine {
        let db = Database::open_in_memory().unwrap();
        for p in photos {
            db.create_photo(p).unwrap();
        }
        SelectionEngine::new(Arc::new(Mutex::new(db)))
    }

    fn photo(owner: AccountId, seed: f64) -> PhotoRecord {
        let mut rec = PhotoRecord::new(owner, format!("blobs/{seed}.jpg"), None);
        rec.random_seed = seed;
        rec
    }

    #[test]
    fn worked_example_ascending_then_filtered() {
        // Pool = {A(0.1, U1), B(0.5, U2), C(0.9, U3)}; caller is U1.
        let (u1, u2, u3) = (AccountId::new(), AccountId::new(), AccountId::new());
        let a = photo(u1, 0.1);
        let b = photo(u2, 0.5);
        let c = photo(u3, 0.9);
        let engine = engine_with(&[a.clone(), b.clone(), c.clone()]);

        // Draw 0.4: ascending scan finds B first.
        let got = engine
            .select_one_at(0.4, &Scope::Global, Some(u1), &HashSet::new())
            .unwrap()
            .unwrap();
        assert_eq!(got.id, b.id);

        // Same draw with B seen: C is next on the ascending side.
        let seen: HashSet<PhotoId> = [b.id].into_iter().collect();
        let got = engine
            .select_one_at(0.4, &Scope::Global, Some(u1), &seen)
            .unwrap()
            .unwrap();
        assert_eq!(got.id, c.id);
    }

    #[test]
    fn wraps_to_descending_side() {
        let owner = AccountId::new();
        let a = photo(owner, 0.2);
        let engine = engine_with(&[a.clone()]);

        // Draw above every seed: nothing ascending, nearest below wins.
        let got = engine
            .select_one_at(0.95, &Scope::Global, None, &HashSet::new())
            .unwrap()
            .unwrap();
        assert_eq!(got.id, a.id);
    }

    #[test]
    fn never_returns_excluded_owner_or_seen_ids() {
        let me = AccountId::new();
        let other = AccountId::new();
        let mine = photo(me, 0.3);
        let theirs = photo(other, 0.6);
        let engine = engine_with(&[mine.clone(), theirs.clone()]);

        for _ in 0..50 {
            let got = engine
                .select_one(&Scope::Global, Some(me), &HashSet::new())
                .unwrap()
                .unwrap();
            assert_eq!(got.id, theirs.id);
        }

        // Excluding the only remaining record leaves no candidate, however
        // often we ask.
        let seen: HashSet<PhotoId> = [theirs.id].into_iter().collect();
        for _ in 0..20 {
            assert!(engine
                .select_one(&Scope::Global, Some(me), &seen)
                .unwrap()
                .is_none());
        }
    }

    #[test]
    fn exclusion_is_idempotent() {
        let owner = AccountId::new();
        let a = photo(owner, 0.2);
        let b = photo(owner, 0.7);
        let engine = engine_with(&[a.clone(), b.clone()]);

        // The request carries a duplicated ID; behaviour matches a single
        // exclusion.
        let request = SelectionRequest {
            scope: Scope::Global,
            excluded_owner: None,
            excluded_ids: vec![a.id, a.id],
            last_reset_at: None,
        };
        for _ in 0..20 {
            let got = engine.select(&request).unwrap().unwrap();
            assert_eq!(got.id, b.id);
        }
    }

    #[test]
    fn empty_pool_yields_no_candidate() {
        let engine = engine_with(&[]);
        assert!(engine
            .select_one(&Scope::Global, None, &HashSet::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn freshness_window_takes_priority_and_respects_filters() {
        let me = AccountId::new();
        let other = AccountId::new();
        let reset_at = Utc::now() - Duration::hours(1);

        let mut stale = photo(other, 0.1);
        stale.created_at = reset_at - Duration::hours(5);
        let mut fresh = photo(other, 0.6);
        fresh.created_at = reset_at + Duration::minutes(30);
        let mut fresh_mine = photo(me, 0.8);
        fresh_mine.created_at = reset_at + Duration::minutes(40);

        let engine = engine_with(&[stale.clone(), fresh.clone(), fresh_mine.clone()]);

        let request = SelectionRequest {
            scope: Scope::Global,
            excluded_owner: Some(me),
            excluded_ids: vec![],
            last_reset_at: Some(reset_at),
        };

        for _ in 0..30 {
            let got = engine.select(&request).unwrap().unwrap();
            assert_eq!(got.id, fresh.id, "must come from the fresh window");
        }
    }

    #[test]
    fn empty_freshness_window_falls_back_to_seeded_scan() {
        let owner = AccountId::new();
        let mut old = photo(owner, 0.5);
        old.created_at = Utc::now() - Duration::days(3);
        let engine = engine_with(&[old.clone()]);

        let request = SelectionRequest {
            scope: Scope::Global,
            excluded_owner: None,
            excluded_ids: vec![],
            last_reset_at: Some(Utc::now() - Duration::hours(1)),
        };
        let got = engine.select(&request).unwrap().unwrap();
        assert_eq!(got.id, old.id);
    }

    #[test]
    fn repeated_selection_spreads_over_the_pool() {
        // Record seeds spaced evenly so each record owns an equal slice of
        // the draw axis.
        let owner = AccountId::new();
        let pool: Vec<PhotoRecord> = [0.2, 0.4, 0.6, 0.8, 0.999]
            .iter()
            .map(|&s| photo(owner, s))
            .collect();
        let engine = engine_with(&pool);

        let trials = 2000;
        let mut counts: HashMap<PhotoId, u32> = HashMap::new();
        for _ in 0..trials {
            let got = engine
                .select_one(&Scope::Global, None, &HashSet::new())
                .unwrap()
                .unwrap();
            *counts.entry(got.id).or_default() += 1;
        }

        assert_eq!(counts.len(), pool.len(), "every record gets selected");
        for (&id, &count) in &counts {
            // Expected 400 per record; allow a wide statistical margin.
            assert!(
                (280..=520).contains(&count),
                "record {id} selected {count} times out of {trials}"
            );
        }
    }
}
