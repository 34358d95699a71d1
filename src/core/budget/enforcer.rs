//! Hierarchical budget enforcement
//!
//! Spend is kept in the counter store as integer nano-dollars, one counter per
//! entity whose window is the current budget period. Admission reserves the
//! estimated cost at every level of the scope; the reservation is reconciled
//! to the actual cost once the call finishes, or released if it never does.

use super::duration::parse_budget_duration;
use super::types::{BudgetEntity, BudgetExceeded, BudgetLevel};
use crate::core::clock::Clock;
use crate::core::counter_store::{AtomicCounterStore, CounterKey, CounterMetric, CounterOutcome};
use crate::core::dispatch::RequestScope;
use crate::core::rate_limiter::ScopeLimit;
use crate::utils::error::{GatewayError, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, info, warn};

const NANOS_PER_DOLLAR: f64 = 1_000_000_000.0;

pub(crate) fn to_nanos(dollars: f64) -> i64 {
    if !dollars.is_finite() {
        return 0;
    }
    // float-to-int casts saturate
    (dollars * NANOS_PER_DOLLAR).round() as i64
}

pub(crate) fn from_nanos(nanos: i64) -> f64 {
    nanos as f64 / NANOS_PER_DOLLAR
}

/// Move `reset_at` forward by whole periods until it lies after `now`
fn advance_reset(reset_at: DateTime<Utc>, period: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
    if now < reset_at {
        return reset_at;
    }
    let period_secs = period.num_seconds().max(1);
    let periods = (now - reset_at).num_seconds() / period_secs + 1;
    reset_at + Duration::seconds(period_secs.saturating_mul(periods))
}

#[derive(Debug, Clone)]
struct EntityRecord {
    max_budget: Option<f64>,
    period: Option<Duration>,
    budget_duration: Option<String>,
    budget_reset_at: Option<DateTime<Utc>>,
    rpm_limit: Option<u64>,
    tpm_limit: Option<u64>,
}

impl EntityRecord {
    /// Counter window of the current period; unbounded budgets use window 0
    fn window_start(&self) -> i64 {
        match (self.period, self.budget_reset_at) {
            (Some(period), Some(reset_at)) => (reset_at - period).timestamp(),
            _ => 0,
        }
    }
}

/// Snapshot of an entity after applying the reset rule
#[derive(Debug, Clone, Copy)]
struct ActivePeriod {
    window_start: i64,
    max_budget: Option<f64>,
}

#[derive(Debug, Clone)]
struct ReservedSpend {
    level: BudgetLevel,
    key: CounterKey,
    window_start: i64,
    amount: i64,
}

/// Windows whose spend was carried into another window by a period change
///
/// Maps `(counter, old window)` to the window now holding that spend, so
/// reservations taken before the change still settle against the live counter.
#[derive(Debug, Default)]
struct WindowRemap {
    moved: DashMap<(CounterKey, i64), i64>,
}

impl WindowRemap {
    fn resolve(&self, key: &CounterKey, window_start: i64) -> i64 {
        self.moved
            .get(&(key.clone(), window_start))
            .map(|w| *w)
            .unwrap_or(window_start)
    }

    fn record(&self, key: &CounterKey, from: i64, to: i64) {
        for mut entry in self.moved.iter_mut() {
            if entry.key().0 == *key && *entry.value() == from {
                *entry.value_mut() = to;
            }
        }
        self.moved.remove(&(key.clone(), to));
        self.moved.insert((key.clone(), from), to);
    }

    fn forget(&self, key: &CounterKey) {
        self.moved.retain(|(k, _), _| k != key);
    }
}

/// Estimated spend held against every budgeted level of one request
///
/// Dropping an unsettled reservation releases the estimate, so a cancelled
/// request never leaves spend behind.
#[derive(Debug)]
pub struct SpendReservation {
    store: Arc<dyn AtomicCounterStore>,
    remap: Arc<WindowRemap>,
    reserved: Vec<ReservedSpend>,
    estimated_cost: f64,
    settled: bool,
}

impl SpendReservation {
    fn new(
        store: Arc<dyn AtomicCounterStore>,
        remap: Arc<WindowRemap>,
        estimated_cost: f64,
    ) -> Self {
        Self {
            store,
            remap,
            reserved: Vec::new(),
            estimated_cost,
            settled: false,
        }
    }

    pub fn estimated_cost(&self) -> f64 {
        self.estimated_cost
    }

    /// Levels holding part of this reservation, in admission order
    pub fn levels(&self) -> Vec<BudgetLevel> {
        self.reserved.iter().map(|r| r.level).collect()
    }

    /// Give the estimate back without charging anything
    pub fn release(self) {}
}

impl Drop for SpendReservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        for reserved in self.reserved.iter().rev() {
            let window_start = self.remap.resolve(&reserved.key, reserved.window_start);
            self.store.adjust(&reserved.key, window_start, -reserved.amount);
        }
    }
}

/// Budget enforcer over organizations, teams and keys
#[derive(Debug)]
pub struct BudgetEnforcer {
    entities: DashMap<(BudgetLevel, String), EntityRecord>,
    store: Arc<dyn AtomicCounterStore>,
    clock: Arc<dyn Clock>,
    remap: Arc<WindowRemap>,
}

impl BudgetEnforcer {
    pub fn new(store: Arc<dyn AtomicCounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entities: DashMap::new(),
            store,
            clock,
            remap: Arc::new(WindowRemap::default()),
        }
    }

    fn spend_key(level: BudgetLevel, id: &str) -> CounterKey {
        CounterKey::new(level.scope_kind(), id, CounterMetric::Spend)
    }

    /// Register or refresh a budget entity
    ///
    /// The recorded `spend` seeds the counter only when the entity is first
    /// inserted; refreshing an existing entity keeps the live spend, even when
    /// the refresh changes its period or reset time.
    pub fn upsert_entity(&self, level: BudgetLevel, entity: BudgetEntity) -> Result<()> {
        if entity.id.is_empty() {
            return Err(GatewayError::validation(format!("{} budget entity has an empty id", level)));
        }
        if let Some(max) = entity.max_budget {
            if !max.is_finite() || max < 0.0 {
                return Err(GatewayError::validation(format!(
                    "{} '{}': max_budget must be a non-negative number",
                    level, entity.id
                )));
            }
        }
        if !entity.spend.is_finite() || entity.spend < 0.0 {
            return Err(GatewayError::validation(format!(
                "{} '{}': spend must be a non-negative number",
                level, entity.id
            )));
        }

        let period = entity
            .budget_duration
            .as_deref()
            .map(parse_budget_duration)
            .transpose()?;
        let now = self.clock.now();

        match self.entities.entry((level, entity.id.clone())) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                record.max_budget = entity.max_budget;
                record.rpm_limit = entity.rpm_limit;
                record.tpm_limit = entity.tpm_limit;

                let reset_at = if record.budget_duration == entity.budget_duration {
                    // same period: an explicit reset time may move it, otherwise keep the live one
                    match (period, entity.budget_reset_at) {
                        (Some(p), Some(stated)) => Some(advance_reset(stated, p, now)),
                        _ => record.budget_reset_at,
                    }
                } else {
                    period.map(|p| advance_reset(entity.budget_reset_at.unwrap_or(now + p), p, now))
                };
                self.rebase(level, &entity.id, record, period, reset_at);
                record.budget_duration = entity.budget_duration;
                debug!(level = %level, entity_id = %entity.id, "Refreshed budget entity");
            }
            Entry::Vacant(vacant) => {
                let (reset_at, seed) = match period {
                    Some(p) => {
                        let stated = entity.budget_reset_at.unwrap_or(now + p);
                        let reset_at = advance_reset(stated, p, now);
                        // a period that already ended starts from zero
                        let seed = if reset_at == stated { entity.spend } else { 0.0 };
                        (Some(reset_at), seed)
                    }
                    None => (None, entity.spend),
                };
                let record = EntityRecord {
                    max_budget: entity.max_budget,
                    period,
                    budget_duration: entity.budget_duration,
                    budget_reset_at: reset_at,
                    rpm_limit: entity.rpm_limit,
                    tpm_limit: entity.tpm_limit,
                };
                let key = Self::spend_key(level, &entity.id);
                self.store.reset(&key);
                self.store.adjust(&key, record.window_start(), to_nanos(seed));
                vacant.insert(record);
                debug!(level = %level, entity_id = %entity.id, "Registered budget entity");
            }
        }
        Ok(())
    }

    pub fn remove_entity(&self, level: BudgetLevel, id: &str) -> bool {
        let removed = self.entities.remove(&(level, id.to_string())).is_some();
        if removed {
            let key = Self::spend_key(level, id);
            self.store.reset(&key);
            self.remap.forget(&key);
        }
        removed
    }

    /// Move a refreshed entity onto a new period, keeping its live spend
    ///
    /// A period that already ended contributes nothing. Otherwise the spend of
    /// the old window is carried into the new one and the old window is
    /// remapped, so outstanding reservations still settle exactly.
    fn rebase(
        &self,
        level: BudgetLevel,
        id: &str,
        record: &mut EntityRecord,
        period: Option<Duration>,
        reset_at: Option<DateTime<Utc>>,
    ) {
        let now = self.clock.now();
        let expired = matches!(record.budget_reset_at, Some(at) if now >= at);
        let old_window = record.window_start();

        record.period = period;
        record.budget_reset_at = reset_at;
        let new_window = record.window_start();
        if new_window == old_window && !expired {
            return;
        }

        let key = Self::spend_key(level, id);
        let carried = if expired {
            0
        } else {
            self.store.current(&key, old_window)
        };
        self.store.reset(&key);
        self.store.adjust(&key, new_window, carried);
        if !expired {
            self.remap.record(&key, old_window, new_window);
        }
        info!(
            level = %level,
            entity_id = id,
            carried_spend = from_nanos(carried),
            "Budget period changed"
        );
    }

    /// Apply the lazy reset rule and return the active period
    fn roll(&self, level: BudgetLevel, id: &str) -> Option<ActivePeriod> {
        let mut record = self.entities.get_mut(&(level, id.to_string()))?;
        if let (Some(period), Some(reset_at)) = (record.period, record.budget_reset_at) {
            let now = self.clock.now();
            if now >= reset_at {
                let next = advance_reset(reset_at, period, now);
                record.budget_reset_at = Some(next);
                info!(
                    level = %level,
                    entity_id = id,
                    next_reset = %next,
                    "Budget period reset"
                );
            }
        }
        Some(ActivePeriod {
            window_start: record.window_start(),
            max_budget: record.max_budget,
        })
    }

    /// Registered levels of `scope` in budget order: org, team, key
    fn budget_chain(scope: &RequestScope) -> Vec<(BudgetLevel, &str)> {
        let mut chain = Vec::with_capacity(3);
        if let Some(org) = scope.org_id.as_deref() {
            chain.push((BudgetLevel::Org, org));
        }
        if let Some(team) = scope.team_id.as_deref() {
            chain.push((BudgetLevel::Team, team));
        }
        chain.push((BudgetLevel::Key, scope.key_id.as_str()));
        chain
    }

    /// Admit `estimated_cost` against every level of the scope
    ///
    /// Levels are checked org, team, key; the first level that would exceed its
    /// budget rejects the request and every reservation already made is released.
    pub fn check_admission(
        &self,
        scope: &RequestScope,
        estimated_cost: f64,
    ) -> std::result::Result<SpendReservation, BudgetExceeded> {
        let estimated_cost = estimated_cost.max(0.0);
        let amount = to_nanos(estimated_cost);
        let mut reservation = SpendReservation::new(
            Arc::clone(&self.store),
            Arc::clone(&self.remap),
            estimated_cost,
        );

        for (level, id) in Self::budget_chain(scope) {
            let Some(active) = self.roll(level, id) else {
                continue;
            };
            let key = Self::spend_key(level, id);
            let limit = active.max_budget.map(to_nanos);

            match self.store.try_add(&key, active.window_start, amount, limit) {
                CounterOutcome::Admitted(_) => reservation.reserved.push(ReservedSpend {
                    level,
                    key,
                    window_start: active.window_start,
                    amount,
                }),
                CounterOutcome::Rejected(current) => {
                    let err = BudgetExceeded {
                        level,
                        entity_id: id.to_string(),
                        spend: from_nanos(current),
                        max_budget: active.max_budget.unwrap_or_default(),
                        estimated_cost,
                    };
                    warn!("{}", err);
                    return Err(err);
                }
            }
        }

        debug!(
            key_id = %scope.key_id,
            estimated_cost,
            levels = reservation.reserved.len(),
            "Budget admission granted"
        );
        Ok(reservation)
    }

    /// Reconcile a reservation to the actual cost of the request
    ///
    /// Each level ends at `spend_before + actual_cost`. If the period rolled
    /// over since admission, the full actual cost lands in the new period.
    pub fn commit_spend(&self, mut reservation: SpendReservation, actual_cost: f64) {
        let actual = to_nanos(actual_cost.max(0.0));

        for reserved in &reservation.reserved {
            let Some(active) = self.roll(reserved.level, &reserved.key.scope_id) else {
                continue;
            };
            let reserved_window = self.remap.resolve(&reserved.key, reserved.window_start);
            if active.window_start == reserved_window {
                self.store
                    .adjust(&reserved.key, reserved_window, actual - reserved.amount);
            } else {
                self.store.adjust(&reserved.key, active.window_start, actual);
            }
        }

        reservation.settled = true;
        debug!(actual_cost, estimated_cost = reservation.estimated_cost, "Spend committed");
    }

    /// Spend of an entity in its current period
    pub fn spend(&self, level: BudgetLevel, id: &str) -> Option<f64> {
        let active = self.roll(level, id)?;
        let nanos = self
            .store
            .current(&Self::spend_key(level, id), active.window_start);
        Some(from_nanos(nanos))
    }

    /// Current view of an entity with live spend
    pub fn entity(&self, level: BudgetLevel, id: &str) -> Option<BudgetEntity> {
        let spend = self.spend(level, id)?;
        let record = self.entities.get(&(level, id.to_string()))?;
        Some(BudgetEntity {
            id: id.to_string(),
            max_budget: record.max_budget,
            spend,
            budget_duration: record.budget_duration.clone(),
            budget_reset_at: record.budget_reset_at,
            rpm_limit: record.rpm_limit,
            tpm_limit: record.tpm_limit,
        })
    }

    /// Rate-limit levels of `scope` in chain order: key, team, org
    pub fn limits_for(&self, scope: &RequestScope) -> Vec<ScopeLimit> {
        let mut chain = Self::budget_chain(scope);
        chain.reverse();
        chain
            .into_iter()
            .filter_map(|(level, id)| {
                let record = self.entities.get(&(level, id.to_string()))?;
                let limit = ScopeLimit::new(level.scope_kind(), id, record.rpm_limit, record.tpm_limit);
                limit.is_limited().then_some(limit)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
