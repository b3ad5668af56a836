//! The per-device gacha state machine.
//!
//! One spin walks through: single-flight guard, tutorial override, ad
//! interleaving, selection with broken-reference retries, seen-set
//! bookkeeping, impression bump, card-timing synchronization, and a
//! one-ahead preload for the next spin.
//!
//! The user never sees a raw error out of this flow: selection-path
//! failures degrade to an ad, exhaustion is a first-class `Completed`
//! outcome, and `reset_history` brings the device back into the pool with
//! freshness priority.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::Notify;
use tokio::time::timeout;

use spindrop_shared::constants::{CARD_TIMING_TIMEOUT, MAX_SELECT_ATTEMPTS};
use spindrop_shared::error::FetchError;
use spindrop_shared::photo::PhotoRecord;
use spindrop_shared::types::{AccountId, Scope, SelectionRequest};

use crate::ads;
use crate::backend::{AdCreative, AdProvider, GachaBackend, ImageFetcher};
use crate::error::{ClientError, Result};
use crate::seen::SeenStore;

/// What one spin produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SpinOutcome {
    /// A photo, validated against the blob store and marked seen.
    Photo(PhotoRecord),
    /// An externally-sourced ad creative; the pool was not touched.
    Ad(AdCreative),
    /// The device has seen every eligible photo. Not an error; cleared by
    /// [`Orchestrator::reset_history`].
    Completed,
    /// A spin was already in flight; this call was ignored.
    Busy,
}

/// Static per-device configuration.
pub struct OrchestratorConfig {
    /// Place filter applied to every selection.
    pub scope: Scope,
    /// The signed-in account, excluded as owner so users never draw their
    /// own uploads. `None` for anonymous devices.
    pub account: Option<AccountId>,
    /// Pinned content served on the very first spin of a fresh device.
    pub tutorial_photo: PhotoRecord,
}

/// Single-flight async gacha driver. Shareable across tasks (`&self` API);
/// concurrent spins collapse to one.
pub struct Orchestrator<B, F, A> {
    backend: B,
    images: F,
    ads: A,
    config: OrchestratorConfig,
    seen: Mutex<SeenStore>,
    in_flight: AtomicBool,
    completed: AtomicBool,
    reveal: Notify,
    preloaded: Mutex<Option<PhotoRecord>>,
    ad_cache: Mutex<Option<AdCreative>>,
}

impl<B, F, A> Orchestrator<B, F, A>
where
    B: GachaBackend,
    F: ImageFetcher,
    A: AdProvider,
{
    pub fn new(backend: B, images: F, ads: A, seen: SeenStore, config: OrchestratorConfig) -> Self {
        Self {
            backend,
            images,
            ads,
            config,
            seen: Mutex::new(seen),
            in_flight: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            reveal: Notify::new(),
            preloaded: Mutex::new(None),
            ad_cache: Mutex::new(None),
        }
    }

    /// One user gesture, one spin. Reentrant calls while a spin is in
    /// flight return [`SpinOutcome::Busy`] without touching anything.
    pub async fn request_gacha(&self) -> Result<SpinOutcome> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("spin already in flight, ignoring request");
            return Ok(SpinOutcome::Busy);
        }

        let result = self.spin().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Presentation layer callback: the card flip animation has reached
    /// its reveal point.
    pub fn card_timing_ready(&self) {
        self.reveal.notify_one();
    }

    /// Whether the device is currently in the "seen everything" state.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// User-initiated history reset: clears the seen-set, stamps
    /// `last_reset_at` (turning on freshness priority), and leaves the
    /// completed state.
    pub fn reset_history(&self) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.seen()?.clear_and_stamp_reset(now)?;
        self.completed.store(false, Ordering::SeqCst);
        *self.preload_slot()? = None;
        Ok(now)
    }

    async fn spin(&self) -> Result<SpinOutcome> {
        // Tutorial override: the very first spin of a fresh device is the
        // pinned photo, no engine involved.
        let tutorial = {
            let seen = self.seen()?;
            if !seen.tutorial_done()? {
                seen.set_tutorial_done()?;
                seen.insert(self.config.tutorial_photo.id)?;
                true
            } else {
                false
            }
        };
        if tutorial {
            tracing::info!("serving pinned tutorial photo");
            self.await_card_timing().await;
            return Ok(SpinOutcome::Photo(self.config.tutorial_photo.clone()));
        }

        let (spin_index, last_was_ad) = {
            let seen = self.seen()?;
            (seen.spin_count()? + 1, seen.last_spin_was_ad()?)
        };

        if ads::should_show_ad(spin_index, last_was_ad, rand::thread_rng().gen::<f64>()) {
            match self.take_or_load_ad().await {
                Ok(creative) => {
                    self.finish_spin(spin_index, true)?;
                    tokio::join!(self.await_card_timing(), self.prefetch_ad());
                    return Ok(SpinOutcome::Ad(creative));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ad load failed, spinning for a photo instead");
                }
            }
        }

        self.spin_for_photo(spin_index).await
    }

    /// Selection with the bounded broken-reference retry loop.
    async fn spin_for_photo(&self, spin_index: u64) -> Result<SpinOutcome> {
        for attempt in 0..MAX_SELECT_ATTEMPTS {
            // The preloaded candidate is only good for the first attempt;
            // retries mean its sibling was already stale.
            let candidate = if attempt == 0 { self.take_preloaded()? } else { None };

            let candidate = match candidate {
                Some(photo) => Some(photo),
                None => match self.backend.select(self.selection_request()?).await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(error = %e, "selection failed, falling back to ad");
                        return self.ad_fallback(spin_index).await;
                    }
                },
            };

            let Some(photo) = candidate else {
                if self.seen()?.is_empty()? {
                    // Nothing seen and still nothing to serve: the pool is
                    // empty or unreachable. Degrade silently to an ad.
                    tracing::warn!("no candidate with empty seen-set, pool looks empty");
                    return self.ad_fallback(spin_index).await;
                }
                tracing::info!("pool exhausted for this device");
                self.completed.store(true, Ordering::SeqCst);
                self.await_card_timing().await;
                return Ok(SpinOutcome::Completed);
            };

            match self.images.fetch(&photo.image_ref).await {
                Ok(_bytes) => {
                    self.seen()?.insert(photo.id)?;
                    self.finish_spin(spin_index, false)?;

                    if let Err(e) = self.backend.record_impression(photo.id).await {
                        tracing::debug!(error = %e, "impression bump failed");
                    }

                    // The one-ahead fetch rides inside the reveal wait.
                    tokio::join!(self.await_card_timing(), self.preload_next());
                    return Ok(SpinOutcome::Photo(photo));
                }
                Err(FetchError::NotFound) => {
                    // Orphaned reference: the record stays active server-side,
                    // but this device blacklists it and redraws.
                    tracing::info!(id = %photo.id, attempt, "image missing, blacklisting");
                    self.seen()?.insert(photo.id)?;
                }
                Err(FetchError::Offline(reason)) => {
                    tracing::warn!(%reason, "image fetch offline, falling back to ad");
                    return self.ad_fallback(spin_index).await;
                }
            }
        }

        tracing::warn!(attempts = MAX_SELECT_ATTEMPTS, "selection retries exhausted");
        self.ad_fallback(spin_index).await
    }

    /// Terminal degradation path: show an ad instead of an error. If even
    /// the ad collaborator fails, the error propagates for the presentation
    /// layer's static fallback; it is never rendered as a dialog.
    async fn ad_fallback(&self, spin_index: u64) -> Result<SpinOutcome> {
        let creative = self.take_or_load_ad().await?;
        self.finish_spin(spin_index, true)?;
        tokio::join!(self.await_card_timing(), self.prefetch_ad());
        Ok(SpinOutcome::Ad(creative))
    }

    fn selection_request(&self) -> Result<SelectionRequest> {
        let seen = self.seen()?;
        Ok(SelectionRequest {
            scope: self.config.scope.clone(),
            excluded_owner: self.config.account,
            excluded_ids: seen.snapshot()?,
            last_reset_at: seen.last_reset_at()?,
        })
    }

    fn finish_spin(&self, spin_index: u64, was_ad: bool) -> Result<()> {
        let seen = self.seen()?;
        seen.set_spin_count(spin_index)?;
        seen.set_last_spin_was_ad(was_ad)?;
        Ok(())
    }

    /// Take the preloaded candidate if it is still eligible; a candidate
    /// that landed in the seen-set since preload (e.g. via a reset) is a
    /// cache miss.
    fn take_preloaded(&self) -> Result<Option<PhotoRecord>> {
        let candidate = self.preload_slot()?.take();
        if let Some(photo) = candidate {
            if !self.seen()?.contains(photo.id)? {
                return Ok(Some(photo));
            }
            tracing::debug!(id = %photo.id, "preloaded candidate no longer eligible");
        }
        Ok(None)
    }

    /// Opportunistic one-ahead fetch after a successful spin. Best-effort.
    async fn preload_next(&self) {
        let request = match self.selection_request() {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "preload skipped");
                return;
            }
        };
        match self.backend.select(request).await {
            Ok(Some(photo)) => {
                if let Ok(mut slot) = self.preloaded.lock() {
                    *slot = Some(photo);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "preload failed"),
        }
    }

    async fn take_or_load_ad(&self) -> std::result::Result<AdCreative, crate::backend::AdError> {
        if let Ok(mut cache) = self.ad_cache.lock() {
            if let Some(creative) = cache.take() {
                return Ok(creative);
            }
        }
        // Cache miss: load synchronously.
        self.ads.load().await
    }

    async fn prefetch_ad(&self) {
        match self.ads.load().await {
            Ok(creative) => {
                if let Ok(mut cache) = self.ad_cache.lock() {
                    *cache = Some(creative);
                }
            }
            Err(e) => tracing::debug!(error = %e, "ad prefetch failed"),
        }
    }

    /// Wait for the card animation's reveal point. The source design had no
    /// timeout here; the bound keeps a silent UI from stalling the machine
    /// forever.
    async fn await_card_timing(&self) {
        if timeout(CARD_TIMING_TIMEOUT, self.reveal.notified()).await.is_err() {
            tracing::warn!("card timing signal never arrived, presenting anyway");
        }
    }

    fn seen(&self) -> Result<MutexGuard<'_, SeenStore>> {
        self.seen.lock().map_err(|_| ClientError::LockPoisoned)
    }

    fn preload_slot(&self) -> Result<MutexGuard<'_, Option<PhotoRecord>>> {
        self.preloaded.lock().map_err(|_| ClientError::LockPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};
    use std::future::Future;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use spindrop_shared::types::{CreatePhotoRequest, PhotoId};

    use crate::backend::{AdError, BackendError};

    fn photo(seed: f64) -> PhotoRecord {
        let mut rec = PhotoRecord::new(AccountId::new(), format!("blobs/{seed}.jpg"), None);
        rec.random_seed = seed;
        rec
    }

    #[derive(Default)]
    struct MockBackend {
        /// Replies handed out in order; an empty queue answers `Ok(None)`.
        replies: Mutex<VecDeque<Option<PhotoRecord>>>,
        select_calls: AtomicU32,
        impressions: Mutex<Vec<PhotoId>>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl MockBackend {
        fn with_replies(photos: Vec<Option<PhotoRecord>>) -> Self {
            Self {
                replies: Mutex::new(photos.into_iter().collect()),
                ..Default::default()
            }
        }
    }

    impl GachaBackend for MockBackend {
        fn select(
            &self,
            _request: SelectionRequest,
        ) -> impl Future<Output = std::result::Result<Option<PhotoRecord>, BackendError>> + Send
        {
            async move {
                self.select_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                if self.fail {
                    return Err(BackendError::Offline("no route".into()));
                }
                Ok(self.replies.lock().unwrap().pop_front().flatten())
            }
        }

        fn record_impression(
            &self,
            id: PhotoId,
        ) -> impl Future<Output = std::result::Result<(), BackendError>> + Send {
            async move {
                self.impressions.lock().unwrap().push(id);
                Ok(())
            }
        }

        fn create_photo(
            &self,
            request: CreatePhotoRequest,
        ) -> impl Future<Output = std::result::Result<PhotoRecord, BackendError>> + Send {
            async move {
                Ok(PhotoRecord::new(
                    request.owner,
                    request.image_ref,
                    request.location,
                ))
            }
        }
    }

    #[derive(Default)]
    struct MockFetcher {
        missing: HashSet<String>,
        offline: bool,
    }

    impl ImageFetcher for MockFetcher {
        fn fetch(
            &self,
            image_ref: &str,
        ) -> impl Future<Output = std::result::Result<Vec<u8>, FetchError>> + Send {
            let image_ref = image_ref.to_string();
            async move {
                if self.offline {
                    return Err(FetchError::Offline("airplane mode".into()));
                }
                if self.missing.contains(&image_ref) {
                    return Err(FetchError::NotFound);
                }
                Ok(vec![0xFF, 0xD8])
            }
        }
    }

    #[derive(Default)]
    struct MockAds {
        loads: AtomicU32,
        fail: bool,
    }

    impl AdProvider for MockAds {
        fn load(
            &self,
        ) -> impl Future<Output = std::result::Result<AdCreative, AdError>> + Send {
            async move {
                if self.fail {
                    return Err(AdError::Unavailable("no fill".into()));
                }
                let n = self.loads.fetch_add(1, Ordering::SeqCst);
                Ok(AdCreative {
                    id: format!("ad-{n}"),
                    asset_ref: "ads/creative.png".into(),
                })
            }
        }
    }

    fn config(tutorial: PhotoRecord) -> OrchestratorConfig {
        OrchestratorConfig {
            scope: Scope::Global,
            account: None,
            tutorial_photo: tutorial,
        }
    }

    /// Fresh orchestrator with the tutorial already behind it, so tests
    /// exercise the general flow.
    fn orchestrator(
        backend: MockBackend,
    ) -> Orchestrator<MockBackend, MockFetcher, MockAds> {
        orchestrator_with(backend, MockFetcher::default(), MockAds::default())
    }

    fn orchestrator_with(
        backend: MockBackend,
        fetcher: MockFetcher,
        ads: MockAds,
    ) -> Orchestrator<MockBackend, MockFetcher, MockAds> {
        let seen = SeenStore::open_in_memory().unwrap();
        seen.set_tutorial_done().unwrap();
        Orchestrator::new(backend, fetcher, ads, seen, config(photo(0.0)))
    }

    #[tokio::test(start_paused = true)]
    async fn first_spin_is_the_pinned_tutorial() {
        let tutorial = photo(0.0);
        let backend = MockBackend::with_replies(vec![Some(photo(0.5))]);
        let seen = SeenStore::open_in_memory().unwrap();
        let orch = Orchestrator::new(
            backend,
            MockFetcher::default(),
            MockAds::default(),
            seen,
            config(tutorial.clone()),
        );

        orch.card_timing_ready();
        let outcome = orch.request_gacha().await.unwrap();
        assert_eq!(outcome, SpinOutcome::Photo(tutorial.clone()));
        // The engine was never consulted for the tutorial.
        assert_eq!(orch.backend.select_calls.load(Ordering::SeqCst), 0);

        // The second spin is a real one.
        orch.card_timing_ready();
        let outcome = orch.request_gacha().await.unwrap();
        assert!(matches!(outcome, SpinOutcome::Photo(p) if p.id != tutorial.id));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_spin_marks_seen_and_bumps_impressions() {
        let candidate = photo(0.5);
        let backend = MockBackend::with_replies(vec![Some(candidate.clone())]);
        let orch = orchestrator(backend);

        let outcome = orch.request_gacha().await.unwrap();
        assert_eq!(outcome, SpinOutcome::Photo(candidate.clone()));

        assert!(orch.seen().unwrap().contains(candidate.id).unwrap());
        assert_eq!(
            *orch.backend.impressions.lock().unwrap(),
            vec![candidate.id]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn broken_references_are_blacklisted_and_retried() {
        let (p1, p2, p3) = (photo(0.1), photo(0.2), photo(0.3));
        let backend = MockBackend::with_replies(vec![
            Some(p1.clone()),
            Some(p2.clone()),
            Some(p3.clone()),
        ]);
        let fetcher = MockFetcher {
            missing: [p1.image_ref.clone(), p2.image_ref.clone()]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let orch = orchestrator_with(backend, fetcher, MockAds::default());

        let outcome = orch.request_gacha().await.unwrap();
        assert_eq!(outcome, SpinOutcome::Photo(p3.clone()));

        let seen = orch.seen().unwrap();
        assert!(seen.contains(p1.id).unwrap());
        assert!(seen.contains(p2.id).unwrap());
        assert!(seen.contains(p3.id).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn three_broken_references_fall_back_to_an_ad() {
        let (p1, p2, p3) = (photo(0.1), photo(0.2), photo(0.3));
        let backend = MockBackend::with_replies(vec![
            Some(p1.clone()),
            Some(p2.clone()),
            Some(p3.clone()),
        ]);
        let fetcher = MockFetcher {
            missing: [p1.image_ref, p2.image_ref, p3.image_ref]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let orch = orchestrator_with(backend, fetcher, MockAds::default());

        let outcome = orch.request_gacha().await.unwrap();
        assert!(matches!(outcome, SpinOutcome::Ad(_)));
        assert_eq!(orch.backend.select_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_fetch_falls_back_to_an_ad() {
        let backend = MockBackend::with_replies(vec![Some(photo(0.5))]);
        let fetcher = MockFetcher {
            offline: true,
            ..Default::default()
        };
        let orch = orchestrator_with(backend, fetcher, MockAds::default());

        let outcome = orch.request_gacha().await.unwrap();
        assert!(matches!(outcome, SpinOutcome::Ad(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_falls_back_to_an_ad() {
        let backend = MockBackend {
            fail: true,
            ..Default::default()
        };
        let orch = orchestrator(backend);

        let outcome = orch.request_gacha().await.unwrap();
        assert!(matches!(outcome, SpinOutcome::Ad(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_becomes_completed_and_reset_clears_it() {
        // Seen-set non-empty + no candidate = the device saw everything.
        let backend = MockBackend::default();
        let orch = orchestrator(backend);
        orch.seen().unwrap().insert(PhotoId::new()).unwrap();

        let outcome = orch.request_gacha().await.unwrap();
        assert_eq!(outcome, SpinOutcome::Completed);
        assert!(orch.is_completed());

        let reset_at = orch.reset_history().unwrap();
        assert!(!orch.is_completed());
        let seen = orch.seen().unwrap();
        assert!(seen.is_empty().unwrap());
        assert_eq!(
            seen.last_reset_at().unwrap().unwrap().timestamp(),
            reset_at.timestamp()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_with_empty_seen_set_degrades_to_an_ad() {
        let backend = MockBackend::default();
        let orch = orchestrator(backend);

        let outcome = orch.request_gacha().await.unwrap();
        assert!(matches!(outcome, SpinOutcome::Ad(_)));
        assert!(!orch.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn every_fifth_spin_forces_an_ad_and_never_doubles() {
        let pool: Vec<Option<PhotoRecord>> =
            (0..20).map(|i| Some(photo(i as f64 / 20.0))).collect();
        let backend = MockBackend::with_replies(pool);
        let orch = orchestrator(backend);
        // Jump to just before a forced slot.
        orch.seen().unwrap().set_spin_count(4).unwrap();

        let fifth = orch.request_gacha().await.unwrap();
        assert!(matches!(fifth, SpinOutcome::Ad(_)), "spin 5 is forced");

        // Spin 6 follows an ad: all ad logic is skipped.
        let sixth = orch.request_gacha().await.unwrap();
        assert!(matches!(sixth, SpinOutcome::Photo(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn ad_spins_do_not_touch_the_pool_and_use_the_prefetched_creative() {
        let backend = MockBackend::with_replies(vec![Some(photo(0.5))]);
        let orch = orchestrator(backend);
        orch.seen().unwrap().set_spin_count(4).unwrap();
        // Warm the one-ahead cache.
        *orch.ad_cache.lock().unwrap() = Some(AdCreative {
            id: "cached".into(),
            asset_ref: "ads/cached.png".into(),
        });

        let outcome = orch.request_gacha().await.unwrap();
        assert_eq!(
            outcome,
            SpinOutcome::Ad(AdCreative {
                id: "cached".into(),
                asset_ref: "ads/cached.png".into(),
            })
        );
        assert_eq!(orch.backend.select_calls.load(Ordering::SeqCst), 0);
        // The cache was refilled for the next ad.
        assert!(orch.ad_cache.lock().unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_spins_collapse_to_one_selection() {
        let backend = MockBackend {
            replies: Mutex::new(VecDeque::from(vec![Some(photo(0.5))])),
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let orch = orchestrator(backend);

        let (first, second) = tokio::join!(orch.request_gacha(), orch.request_gacha());
        let outcomes = [first.unwrap(), second.unwrap()];

        assert!(outcomes.iter().any(|o| *o == SpinOutcome::Busy));
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, SpinOutcome::Photo(_))));
        // One selection for the spin, one for the preload.
        assert_eq!(orch.backend.select_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn preloaded_candidate_serves_the_next_spin() {
        let (a, b, c) = (photo(0.1), photo(0.2), photo(0.3));
        let backend =
            MockBackend::with_replies(vec![Some(a.clone()), Some(b.clone()), Some(c.clone())]);
        let orch = orchestrator(backend);

        let first = orch.request_gacha().await.unwrap();
        assert_eq!(first, SpinOutcome::Photo(a));
        // Spin consumed one reply, preload consumed the next.
        assert_eq!(orch.backend.select_calls.load(Ordering::SeqCst), 2);

        let second = orch.request_gacha().await.unwrap();
        assert_eq!(second, SpinOutcome::Photo(b));
        // The candidate came from the preload slot; only the follow-up
        // preload hit the backend.
        assert_eq!(orch.backend.select_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_preloaded_candidate_is_a_cache_miss() {
        let (a, b, c) = (photo(0.1), photo(0.2), photo(0.3));
        let backend =
            MockBackend::with_replies(vec![Some(a.clone()), Some(b.clone()), Some(c.clone())]);
        let orch = orchestrator(backend);

        let first = orch.request_gacha().await.unwrap();
        assert_eq!(first, SpinOutcome::Photo(a));

        // The preloaded candidate lands in the seen-set behind the
        // orchestrator's back (e.g. another surface showed it).
        orch.seen().unwrap().insert(b.id).unwrap();

        let second = orch.request_gacha().await.unwrap();
        assert_eq!(second, SpinOutcome::Photo(c));
    }

    #[tokio::test(start_paused = true)]
    async fn preload_runs_during_the_reveal_wait() {
        // Backend round-trips take 3s; the unsignaled reveal gate takes 5s.
        // The one-ahead preload must overlap the gate, not extend the spin:
        // 3s (selection) + 5s (gate, covering the preload) = 8s, where a
        // serial preload would cost 11s.
        let backend = MockBackend {
            replies: Mutex::new(VecDeque::from(vec![Some(photo(0.1)), Some(photo(0.2))])),
            delay: Some(Duration::from_secs(3)),
            ..Default::default()
        };
        let orch = orchestrator(backend);

        let before = tokio::time::Instant::now();
        let outcome = orch.request_gacha().await.unwrap();
        assert!(matches!(outcome, SpinOutcome::Photo(_)));
        assert!(before.elapsed() < Duration::from_secs(9));
        // The preload still landed before the spin returned.
        assert_eq!(orch.backend.select_calls.load(Ordering::SeqCst), 2);
        assert!(orch.preloaded.lock().unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn card_timing_signal_gates_the_reveal() {
        let backend = MockBackend::with_replies(vec![Some(photo(0.5))]);
        let orch = orchestrator(backend);

        // No signal: the defensive timeout must release the spin rather
        // than stall forever.
        let before = tokio::time::Instant::now();
        let outcome = orch.request_gacha().await.unwrap();
        assert!(matches!(outcome, SpinOutcome::Photo(_)));
        assert!(before.elapsed() >= CARD_TIMING_TIMEOUT);

        // With the signal armed the next spin (pool now exhausted, so it
        // resolves to Completed) never waits out the timeout.
        orch.card_timing_ready();
        let before = tokio::time::Instant::now();
        let outcome = orch.request_gacha().await.unwrap();
        assert_eq!(outcome, SpinOutcome::Completed);
        assert!(before.elapsed() < CARD_TIMING_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn ad_fallback_error_is_structured_not_a_photo() {
        // Pool empty and the ad provider has no fill either: the error is
        // surfaced structurally for the presentation layer's static
        // fallback.
        let backend = MockBackend::default();
        let ads = MockAds {
            fail: true,
            ..Default::default()
        };
        let orch = orchestrator_with(backend, MockFetcher::default(), ads);

        let result = orch.request_gacha().await;
        assert!(matches!(result, Err(ClientError::Ad(_))));
        // The machine is reusable afterwards.
        assert!(!orch.in_flight.load(Ordering::SeqCst));
    }
}
