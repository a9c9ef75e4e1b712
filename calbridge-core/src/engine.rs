//! The reconciliation engine.
//!
//! One pass walks every configured pair through the same states:
//! fetch both sides over the sync window, collapse duplicates per
//! calendar, diff by identity, apply create/update/delete through the
//! adapters, and finally persist the series bookkeeping. Each run is a
//! fresh pass — nothing carries over except the persisted [`SyncState`].
//!
//! Failure isolation: a fetch failure abandons that pair for this pass;
//! a failure applying one event is logged with its uid, calendar and
//! operation, and the pass moves on to the next event.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendRegistry, CalendarBackend, CalendarRef};
use crate::config::{CalendarPair, SyncMode};
use crate::dedup::dedupe;
use crate::error::{BridgeError, BridgeResult};
use crate::event::{Event, EventStatus};
use crate::privacy::PrivacyMapper;
use crate::recurrence::infer_rule;
use crate::series::{EventSeries, collect_series};
use crate::state::{SeriesPresence, StateStore, SyncState};
use crate::window::SyncWindow;

/// Aggregate operation counts for a pass or pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Events excluded from the action set (per-event failures,
    /// unmatchable identities). Reconsidered on the next pass.
    pub skipped: usize,
}

impl OpCounts {
    fn absorb(&mut self, other: OpCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
    }

    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Outcome of one full reconciliation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassSummary {
    pub pairs_synced: usize,
    pub pairs_failed: usize,
    pub counts: OpCounts,
}

/// One side of a pair: an adapter bound to a concrete calendar.
#[derive(Clone)]
struct Side {
    backend: Arc<dyn CalendarBackend>,
    cal: CalendarRef,
}

impl Side {
    fn bind(registry: &BackendRegistry, cal: &CalendarRef) -> BridgeResult<Self> {
        Ok(Side {
            backend: registry.resolve(cal)?,
            cal: cal.clone(),
        })
    }
}

pub struct SyncEngine {
    registry: BackendRegistry,
    pairs: Vec<CalendarPair>,
    privacy: PrivacyMapper,
    store: StateStore,
    window: Option<SyncWindow>,
}

impl SyncEngine {
    /// All collaborators are handed in up front; the engine never
    /// constructs adapters on its own.
    pub fn new(
        registry: BackendRegistry,
        pairs: Vec<CalendarPair>,
        privacy: PrivacyMapper,
        store: StateStore,
    ) -> Self {
        SyncEngine {
            registry,
            pairs,
            privacy,
            store,
            window: None,
        }
    }

    /// Override the default sync window for subsequent passes.
    pub fn with_window(mut self, window: SyncWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Run one reconciliation pass over all configured pairs.
    pub async fn run_pass(&self) -> BridgeResult<PassSummary> {
        let mut state = self.store.load();
        let mut summary = PassSummary::default();

        for pair in &self.pairs {
            info!(source = %pair.source, target = %pair.target, "syncing pair");
            match self.sync_pair(pair, &mut state).await {
                Ok(counts) => {
                    summary.pairs_synced += 1;
                    summary.counts.absorb(counts);
                }
                Err(e) => {
                    // A pair-level failure (fetch, unknown backend) only
                    // abandons this pair; the others still run.
                    error!(source = %pair.source, target = %pair.target, error = %e, "pair sync failed");
                    summary.pairs_failed += 1;
                }
            }
        }

        state.last_sync = Some(Utc::now());
        self.store.save(&state)?;

        Ok(summary)
    }

    async fn sync_pair(&self, pair: &CalendarPair, state: &mut SyncState) -> BridgeResult<OpCounts> {
        let source = Side::bind(&self.registry, &pair.source)?;
        let target = Side::bind(&self.registry, &pair.target)?;
        let window = self.window.clone().unwrap_or_default();

        // FETCH: a failure on either side aborts this pair's pass.
        let source_events = source.backend.list_events(&source.cal.calendar_id, &window).await?;
        let target_events = target.backend.list_events(&target.cal.calendar_id, &window).await?;

        let mut counts = OpCounts::default();

        // DEDUPE, independently per calendar, before any cross-calendar
        // comparison.
        let source_events = self.dedupe_side(&source, source_events, &mut counts).await;
        let target_events = self.dedupe_side(&target, target_events, &mut counts).await;

        // DIFF + APPLY.
        match (pair.mode, pair.privacy) {
            (SyncMode::OneWay, false) => {
                self.one_way(&source_events, &target_events, &target, &mut counts)
                    .await;
            }
            (SyncMode::OneWay, true) => {
                self.one_way_privacy(&source_events, &target_events, &target, &mut counts)
                    .await;
            }
            (SyncMode::TwoWay, _) => {
                self.two_way(&source_events, &target_events, &source, &target, state, &mut counts)
                    .await;
            }
        }

        Ok(counts)
    }

    async fn dedupe_side(
        &self,
        side: &Side,
        events: Vec<Event>,
        counts: &mut OpCounts,
    ) -> Vec<Event> {
        let outcome = dedupe(events);
        for stale in &outcome.duplicates {
            debug!(uid = %stale.uid, calendar = %side.cal, "removing duplicate event");
            self.try_delete(side, &stale.uid, counts).await;
        }
        outcome.kept
    }

    /// One-way, full detail: mirror source uids into the target.
    ///
    /// Creation is one-shot — an event present on both sides is left
    /// untouched even if its content drifted.
    async fn one_way(
        &self,
        source_events: &[Event],
        target_events: &[Event],
        target: &Side,
        counts: &mut OpCounts,
    ) {
        let source_uids: HashSet<&str> = source_events.iter().map(|e| e.uid.as_str()).collect();
        let target_uids: HashSet<&str> = target_events.iter().map(|e| e.uid.as_str()).collect();

        for event in source_events {
            if event.uid.is_empty() {
                warn!(summary = %event.summary, calendar = %target.cal, "event carries no uid, excluded from this pass");
                counts.skipped += 1;
                continue;
            }
            if !target_uids.contains(event.uid.as_str()) {
                self.try_create(target, event, counts).await;
            }
        }

        // Remove obsolete events from the target.
        for event in target_events {
            if !source_uids.contains(event.uid.as_str()) {
                self.try_delete(target, &event.uid, counts).await;
            }
        }
    }

    /// One-way privacy: exactly one placeholder per source event.
    async fn one_way_privacy(
        &self,
        source_events: &[Event],
        target_events: &[Event],
        target: &Side,
        counts: &mut OpCounts,
    ) {
        // Cancelled events block no time, so they get no placeholder.
        let active: Vec<&Event> = source_events
            .iter()
            .filter(|e| e.status != EventStatus::Cancelled)
            .collect();

        if target.backend.preserves_uid() {
            self.privacy_incremental(&active, target_events, target, counts)
                .await;
        } else {
            self.privacy_sweep(&active, target_events, target, counts).await;
        }
    }

    /// Incremental placeholder upkeep, keyed by `prefix + sourceUid`.
    async fn privacy_incremental(
        &self,
        active_source: &[&Event],
        target_events: &[Event],
        target: &Side,
        counts: &mut OpCounts,
    ) {
        let source_uids: HashSet<&str> = active_source.iter().map(|e| e.uid.as_str()).collect();
        let source_slots: HashSet<(String, String)> = active_source
            .iter()
            .map(|e| (e.start.canonical_string(), e.end.canonical_string()))
            .collect();
        let target_uids: HashSet<&str> = target_events.iter().map(|e| e.uid.as_str()).collect();

        for event in active_source {
            if event.uid.is_empty() {
                warn!(summary = %event.summary, calendar = %target.cal, "event carries no uid, excluded from this pass");
                counts.skipped += 1;
                continue;
            }
            let placeholder_uid = self.privacy.placeholder_uid(&event.uid);
            if !target_uids.contains(placeholder_uid.as_str()) {
                let placeholder = self.privacy.to_private(event);
                self.try_create(target, &placeholder, counts).await;
            }
        }

        // Placeholders whose source vanished are torn down. Placeholders
        // without an extractable source uid fall back to slot matching:
        // ambiguous when two source events share a slot, so the match is
        // by occupancy, not identity.
        for event in target_events {
            if !self.privacy.is_placeholder(event) {
                continue;
            }
            let orphaned = match self.privacy.source_uid_of(event) {
                Ok(source_uid) => !source_uids.contains(source_uid),
                Err(e) => {
                    debug!(uid = %event.uid, calendar = %target.cal, error = %e, "matching placeholder by time slot");
                    !source_slots
                        .contains(&(event.start.canonical_string(), event.end.canonical_string()))
                }
            };
            if orphaned {
                self.try_delete(target, &event.uid, counts).await;
            }
        }
    }

    /// Delete-and-recreate sweep for backends that discard caller uids:
    /// every title-matched placeholder in the window goes, then the
    /// current source set is regenerated. Extra write volume, but correct
    /// against identity-losing backends.
    async fn privacy_sweep(
        &self,
        active_source: &[&Event],
        target_events: &[Event],
        target: &Side,
        counts: &mut OpCounts,
    ) {
        for event in target_events {
            if event.summary == self.privacy.title() {
                self.try_delete(target, &event.uid, counts).await;
            }
        }

        for event in active_source {
            let placeholder = self.privacy.to_private(event);
            self.try_create(target, &placeholder, counts).await;
        }
    }

    /// Two-way: singletons diff by uid, series reconcile as wholes.
    async fn two_way(
        &self,
        source_events: &[Event],
        target_events: &[Event],
        source: &Side,
        target: &Side,
        state: &mut SyncState,
        counts: &mut OpCounts,
    ) {
        // Privacy mirrors are never syncable content.
        let side1: Vec<&Event> = source_events
            .iter()
            .filter(|e| !self.privacy.is_placeholder(e))
            .collect();
        let side2: Vec<&Event> = target_events
            .iter()
            .filter(|e| !self.privacy.is_placeholder(e))
            .collect();

        self.two_way_singletons(&side1, &side2, source, target, state, counts)
            .await;
        self.two_way_series(&side1, &side2, source, target, state, counts)
            .await;
    }

    async fn two_way_singletons(
        &self,
        side1: &[&Event],
        side2: &[&Event],
        source: &Side,
        target: &Side,
        state: &SyncState,
        counts: &mut OpCounts,
    ) {
        let mut singles = |events: &[&Event]| -> BTreeMap<String, Event> {
            let mut map = BTreeMap::new();
            for event in events.iter().filter(|e| !e.is_series_member()) {
                if event.uid.is_empty() {
                    warn!(summary = %event.summary, "event carries no uid, excluded from this pass");
                    counts.skipped += 1;
                    continue;
                }
                map.insert(event.uid.clone(), (*event).clone());
            }
            map
        };

        let map1 = singles(side1);
        let map2 = singles(side2);

        let uids: BTreeSet<&String> = map1.keys().chain(map2.keys()).collect();

        for uid in uids {
            match (map1.get(uid), map2.get(uid)) {
                (Some(e1), None) => {
                    if state.is_tombstoned(uid) {
                        debug!(uid = %uid, "uid is tombstoned, not re-creating");
                        continue;
                    }
                    self.try_create(target, e1, counts).await;
                }
                (None, Some(e2)) => {
                    if state.is_tombstoned(uid) {
                        debug!(uid = %uid, "uid is tombstoned, not re-creating");
                        continue;
                    }
                    self.try_create(source, e2, counts).await;
                }
                (Some(e1), Some(e2)) => {
                    if e1.content_matches(e2) {
                        continue;
                    }
                    // Direction of truth: the more recently modified copy
                    // wins; with no timestamps to compare, source wins.
                    // When both sides changed between passes this drops
                    // one side's edit (no merge).
                    let target_is_newer = match (e1.last_modified, e2.last_modified) {
                        (Some(t1), Some(t2)) => t2 > t1,
                        _ => false,
                    };
                    if target_is_newer {
                        self.try_update(source, e2, counts).await;
                    } else {
                        self.try_update(target, e1, counts).await;
                    }
                }
                (None, None) => unreachable!("uid came from one of the maps"),
            }
        }
    }

    /// Reconcile recurring series across the pair.
    ///
    /// A series present on one side only is copied over — original
    /// payload preferred, then the master, then a master synthesized from
    /// the first instance with an inferred rule. Presence flags from the
    /// previous pass detect deletions: a series that was on both sides
    /// and is now on one was removed there, so the surviving copy is
    /// deleted and the uid tombstoned.
    async fn two_way_series(
        &self,
        side1: &[&Event],
        side2: &[&Event],
        source: &Side,
        target: &Side,
        state: &mut SyncState,
        counts: &mut OpCounts,
    ) {
        let events1: Vec<Event> = side1.iter().map(|e| (*e).clone()).collect();
        let events2: Vec<Event> = side2.iter().map(|e| (*e).clone()).collect();
        let series1 = collect_series(&events1);
        let series2 = collect_series(&events2);

        let uids: BTreeSet<String> = series1.keys().chain(series2.keys()).cloned().collect();
        let mut new_presence: BTreeMap<String, SeriesPresence> = BTreeMap::new();

        for uid in &uids {
            if state.is_tombstoned(uid) {
                debug!(uid = %uid, "series is tombstoned, skipping");
                continue;
            }

            let s1 = series1.get(uid);
            let s2 = series2.get(uid);
            let known = state.series.get(uid);
            let was_on_both = known.map(|k| k.in_source && k.in_target).unwrap_or(false);

            let summary = s1.or(s2).map(|s| s.summary.clone()).unwrap_or_default();

            match (s1, s2) {
                (Some(series), None) => {
                    if was_on_both {
                        // Deleted on the target side since the last pass.
                        info!(uid = %uid, summary = %summary, "series removed on one side, deleting the surviving copy");
                        self.try_delete(source, uid, counts).await;
                        state.deleted_uids.insert(uid.clone());
                        continue;
                    }
                    self.copy_series(series, target, counts).await;
                }
                (None, Some(series)) => {
                    if was_on_both {
                        info!(uid = %uid, summary = %summary, "series removed on one side, deleting the surviving copy");
                        self.try_delete(target, uid, counts).await;
                        state.deleted_uids.insert(uid.clone());
                        continue;
                    }
                    self.copy_series(series, source, counts).await;
                }
                (Some(_), Some(_)) => {}
                (None, None) => unreachable!("uid came from one of the maps"),
            }

            new_presence.insert(
                uid.clone(),
                SeriesPresence {
                    in_source: s1.is_some(),
                    in_target: s2.is_some(),
                    summary,
                },
            );
        }

        // Series known from earlier passes that no current listing shows
        // were removed on both sides; tombstone them so a stale adapter
        // view cannot resurrect them.
        for (uid, known) in &state.series {
            if !uids.contains(uid) {
                debug!(uid = %uid, summary = %known.summary, "series gone from both sides, tombstoning");
                state.deleted_uids.insert(uid.clone());
            }
        }

        state.series = new_presence;
    }

    async fn copy_series(&self, series: &EventSeries, destination: &Side, counts: &mut OpCounts) {
        info!(uid = %series.uid, summary = %series.summary, calendar = %destination.cal, "copying series");

        let master = match &series.master {
            Some(master) => {
                let mut master = master.clone();
                // The stored payload beats a reconstruction.
                if master.raw.is_none() {
                    master.raw = series.original_payload.clone();
                }
                master
            }
            None => {
                // No master made it across this backend's listing; build
                // one from the first instance and infer the rule the
                // instances imply.
                let Some(template) = series.instances.first() else {
                    return;
                };
                let mut master = template.clone();
                master.recurrence_id = None;
                master.recurrence = infer_rule(&series.instances);
                match &master.recurrence {
                    Some(rule) => debug!(uid = %series.uid, rule = %rule, "inferred recurrence rule"),
                    None => debug!(uid = %series.uid, "no recurrence pattern found, copying discrete instances"),
                }
                master
            }
        };

        if master.recurrence.is_some() {
            self.try_create(destination, &master, counts).await;
        } else {
            // Irregular series: no rule to carry it, so each concrete
            // occurrence is copied as-is.
            for instance in &series.instances {
                self.try_create(destination, instance, counts).await;
            }
        }
    }

    async fn try_create(&self, side: &Side, event: &Event, counts: &mut OpCounts) {
        match side.backend.create_event(&side.cal.calendar_id, event).await {
            Ok(_) => counts.created += 1,
            Err(e) => {
                error!(uid = %event.uid, calendar = %side.cal, operation = "create", error = %e, "skipping event");
                counts.skipped += 1;
            }
        }
    }

    /// Update, falling back to create when the backend no longer knows
    /// the uid.
    async fn try_update(&self, side: &Side, event: &Event, counts: &mut OpCounts) {
        match side.backend.update_event(&side.cal.calendar_id, event).await {
            Ok(()) => counts.updated += 1,
            Err(BridgeError::NotFound(_)) => {
                debug!(uid = %event.uid, calendar = %side.cal, "update target vanished, creating instead");
                self.try_create(side, event, counts).await;
            }
            Err(e) => {
                error!(uid = %event.uid, calendar = %side.cal, operation = "update", error = %e, "skipping event");
                counts.skipped += 1;
            }
        }
    }

    async fn try_delete(&self, side: &Side, uid: &str, counts: &mut OpCounts) {
        match side.backend.delete_event(&side.cal.calendar_id, uid).await {
            // Adapters already fold not-found into success; both layers
            // treat deletes as idempotent.
            Ok(()) | Err(BridgeError::NotFound(_)) => counts.deleted += 1,
            Err(e) => {
                error!(uid = %uid, calendar = %side.cal, operation = "delete", error = %e, "skipping event");
                counts.skipped += 1;
            }
        }
    }
}
