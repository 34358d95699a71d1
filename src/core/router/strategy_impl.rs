//! Routing strategy implementations
//!
//! Every strategy is a pure function over a candidate snapshot. The candidate
//! slice is sorted by deployment id, so all deterministic tie-breaks fall back
//! to id ascending by taking the first best element.

use super::config::RoutingStrategy;
use super::deployment::Deployment;
use rand::Rng;
use std::cmp::Ordering;
use std::sync::Arc;

/// Deployment plus the runtime readings selection needs
#[derive(Debug, Clone)]
pub struct Candidate {
    pub deployment: Arc<Deployment>,
    pub in_flight: u32,
    /// `None` until the first successful call
    pub latency_ewma: Option<f64>,
    pub rpm_used: u64,
    pub tpm_used: u64,
}

impl Candidate {
    /// Candidate with no recorded load
    pub fn idle(deployment: Arc<Deployment>) -> Self {
        Self {
            deployment,
            in_flight: 0,
            latency_ewma: None,
            rpm_used: 0,
            tpm_used: 0,
        }
    }

    /// Highest fraction of any configured limit already used (0 when unlimited)
    pub fn usage_ratio(&self) -> f64 {
        let ratio = |used: u64, limit: Option<u64>| match limit {
            Some(0) => 1.0,
            Some(limit) => used as f64 / limit as f64,
            None => 0.0,
        };
        ratio(self.rpm_used, self.deployment.rpm_limit)
            .max(ratio(self.tpm_used, self.deployment.tpm_limit))
    }
}

/// Knobs for strategies that delegate to another strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyOptions {
    /// Strategy applied after the rate-limit-aware filter
    pub tiebreak: RoutingStrategy,
    /// Usage ratio at which rate-limit-aware selection skips a deployment
    pub headroom: f64,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            tiebreak: RoutingStrategy::LeastBusy,
            headroom: 0.9,
        }
    }
}

/// Pick one candidate index using `strategy`
///
/// `cursor` is only invoked by round-robin and must return a monotonically
/// advancing value shared by all callers of the same model group.
/// Returns `None` only for an empty candidate slice.
pub fn select_for<R: Rng + ?Sized>(
    strategy: RoutingStrategy,
    candidates: &[Candidate],
    options: StrategyOptions,
    cursor: &mut dyn FnMut() -> u64,
    rng: &mut R,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    match strategy {
        RoutingStrategy::RoundRobin => round_robin(candidates, cursor()),
        RoutingStrategy::Weighted => weighted_random(candidates, rng),
        RoutingStrategy::LeastBusy => least_busy(candidates),
        RoutingStrategy::LatencyBased => lowest_latency(candidates),
        RoutingStrategy::CostBased => lowest_cost(candidates),
        RoutingStrategy::RateLimitAware => rate_limit_aware(candidates, options, cursor, rng),
    }
}

/// Rotating cursor over the candidates
pub fn round_robin(candidates: &[Candidate], cursor: u64) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    Some((cursor % candidates.len() as u64) as usize)
}

/// Cumulative-weight random draw
///
/// Zero-weight candidates are only picked when every candidate has zero weight,
/// in which case the draw is uniform.
pub fn weighted_random<R: Rng + ?Sized>(candidates: &[Candidate], rng: &mut R) -> Option<usize> {
    if candidates.len() <= 1 {
        return if candidates.is_empty() { None } else { Some(0) };
    }

    let total_weight: u64 = candidates
        .iter()
        .map(|c| u64::from(c.deployment.weight))
        .sum();

    if total_weight == 0 {
        return Some(rng.gen_range(0..candidates.len()));
    }

    let mut point = rng.gen_range(0..total_weight);
    for (index, candidate) in candidates.iter().enumerate() {
        let weight = u64::from(candidate.deployment.weight);
        if point < weight {
            return Some(index);
        }
        point -= weight;
    }

    // unreachable for a non-zero total; keep the last weighted candidate
    candidates
        .iter()
        .rposition(|c| c.deployment.weight > 0)
}

/// Fewest in-flight requests; ties by priority descending, then id
pub fn least_busy(candidates: &[Candidate]) -> Option<usize> {
    best_by(candidates, |a, b| a.in_flight.cmp(&b.in_flight))
}

/// Lowest latency EWMA; unseen deployments count as zero
pub fn lowest_latency(candidates: &[Candidate]) -> Option<usize> {
    best_by(candidates, |a, b| {
        let la = a.latency_ewma.unwrap_or(0.0);
        let lb = b.latency_ewma.unwrap_or(0.0);
        la.total_cmp(&lb)
    })
}

/// Lowest input + output token price; ties by priority descending, then id
pub fn lowest_cost(candidates: &[Candidate]) -> Option<usize> {
    best_by(candidates, |a, b| {
        a.deployment.unit_cost().total_cmp(&b.deployment.unit_cost())
    })
}

/// Skip candidates at or above the headroom ratio, then apply the tiebreak strategy
///
/// When every candidate is close to its limit the filter is dropped, so the
/// rate limiter still gets to make the final call.
pub fn rate_limit_aware<R: Rng + ?Sized>(
    candidates: &[Candidate],
    options: StrategyOptions,
    cursor: &mut dyn FnMut() -> u64,
    rng: &mut R,
) -> Option<usize> {
    let indices: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.usage_ratio() < options.headroom)
        .map(|(i, _)| i)
        .collect();

    let tiebreak = match options.tiebreak {
        RoutingStrategy::RateLimitAware => RoutingStrategy::LeastBusy,
        other => other,
    };

    if indices.is_empty() || indices.len() == candidates.len() {
        return select_for(tiebreak, candidates, options, cursor, rng);
    }

    let filtered: Vec<Candidate> = indices.iter().map(|&i| candidates[i].clone()).collect();
    select_for(tiebreak, &filtered, options, cursor, rng).map(|i| indices[i])
}

/// First candidate minimising `primary`, ties broken by priority descending
fn best_by<F>(candidates: &[Candidate], primary: F) -> Option<usize>
where
    F: Fn(&Candidate, &Candidate) -> Ordering,
{
    let mut best: Option<usize> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let better = match best {
            None => true,
            Some(current) => {
                let incumbent = &candidates[current];
                primary(candidate, incumbent)
                    .then_with(|| incumbent.deployment.priority.cmp(&candidate.deployment.priority))
                    == Ordering::Less
            }
        };
        if better {
            best = Some(index);
        }
    }
    best
}
