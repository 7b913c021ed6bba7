use crate::alerts::{generate_alerts, AlertContext};
use crate::chart_of_accounts::ChartOfAccounts;
use crate::config::{ForecastConfig, PersistencePolicy};
use crate::error::{ForecastError, Result};
use crate::flows::{
    budget_outflow, pattern_outflow, payable_outflow, receivable_inflow, repeating_flow,
    split_repeating, tax_outflow, PaymentPatternIndex,
};
use crate::ingestion;
use crate::money::Money;
use crate::scenario::{confidence_level, scenario_bands};
use crate::schema::{
    DailyForecast, ForecastWindow, Inflows, LedgerSnapshot, ObligationDirection, Outflows,
};
use crate::store::{Clock, Dataset, ForecastCache, ForecastRow, LedgerStore, NullCache, SystemClock};
use crate::tax::{merge_obligations, OrganisationSettings, TaxScheduler};
use crate::utils::months_spanned;
use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedForecast {
    pub generated_at: DateTime<Utc>,
    pub forecasts: Vec<DailyForecast>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceReport {
    pub attempted: usize,
    pub succeeded: Vec<NaiveDate>,
    pub failed: Vec<NaiveDate>,
}

impl PersistenceReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.succeeded.len() == self.attempted
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }

    pub fn check(&self, phase: &str) -> Result<()> {
        if self.started.elapsed() > self.limit {
            return Err(self.exceeded(phase));
        }
        Ok(())
    }

    fn exceeded(&self, phase: &str) -> ForecastError {
        ForecastError::DeadlineExceeded {
            phase: phase.to_string(),
            elapsed_ms: self.started.elapsed().as_millis(),
        }
    }
}

pub fn cache_key(tenant_id: Option<&str>, days: u32) -> String {
    format!(
        "cash-flow-forecast:{}:{}",
        tenant_id.unwrap_or("default"),
        days
    )
}

pub struct CashFlowForecaster<S, C = NullCache, K = SystemClock> {
    store: S,
    cache: C,
    clock: K,
    config: ForecastConfig,
}

pub struct ForecastBuilder<S, C, K> {
    store: S,
    cache: C,
    clock: K,
    config: ForecastConfig,
}

impl<S: LedgerStore> CashFlowForecaster<S> {
    pub fn builder(store: S) -> ForecastBuilder<S, NullCache, SystemClock> {
        ForecastBuilder {
            store,
            cache: NullCache,
            clock: SystemClock,
            config: ForecastConfig::default(),
        }
    }
}

impl<S, C, K> ForecastBuilder<S, C, K>
where
    S: LedgerStore,
    C: ForecastCache,
    K: Clock,
{
    pub fn cache<C2: ForecastCache>(self, cache: C2) -> ForecastBuilder<S, C2, K> {
        ForecastBuilder {
            store: self.store,
            cache,
            clock: self.clock,
            config: self.config,
        }
    }

    pub fn clock<K2: Clock>(self, clock: K2) -> ForecastBuilder<S, C, K2> {
        ForecastBuilder {
            store: self.store,
            cache: self.cache,
            clock,
            config: self.config,
        }
    }

    pub fn config(mut self, config: ForecastConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<CashFlowForecaster<S, C, K>> {
        self.config.validate()?;
        Ok(CashFlowForecaster {
            store: self.store,
            cache: self.cache,
            clock: self.clock,
            config: self.config,
        })
    }
}

impl<S, C, K> CashFlowForecaster<S, C, K>
where
    S: LedgerStore,
    C: ForecastCache,
    K: Clock,
{
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Projects `days` days starting today.
    ///
    /// A cached result younger than the cache TTL is returned as-is. Store and
    /// cache failures are logged and never fail the run.
    pub async fn generate_forecast(
        &self,
        days: u32,
        tenant_id: Option<&str>,
    ) -> Result<Vec<DailyForecast>> {
        self.validate_horizon(days)?;

        let key = cache_key(tenant_id, days);
        if let Some(forecasts) = self.cached(&key).await {
            info!("Serving {}-day forecast from cache ({})", days, key);
            return Ok(forecasts);
        }

        let start = self.clock.today();
        let forecasts = self.run(start, days, tenant_id).await?;
        self.write_cache(&key, &forecasts).await;
        Ok(forecasts)
    }

    /// Projects the configured default horizon starting today.
    pub async fn generate_default_forecast(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<Vec<DailyForecast>> {
        self.generate_forecast(self.config.default_horizon_days, tenant_id)
            .await
    }

    /// Projects `days` days starting at `start`, without reading or writing
    /// the cache. Overdue receivables are still evaluated against the
    /// clock's today.
    pub async fn generate_forecast_from(
        &self,
        start: NaiveDate,
        days: u32,
        tenant_id: Option<&str>,
    ) -> Result<Vec<DailyForecast>> {
        self.validate_horizon(days)?;
        self.run(start, days, tenant_id).await
    }

    fn validate_horizon(&self, days: u32) -> Result<()> {
        if days == 0 || days > self.config.max_horizon_days {
            return Err(ForecastError::InvalidHorizon(days));
        }
        Ok(())
    }

    async fn run(
        &self,
        start: NaiveDate,
        days: u32,
        tenant_id: Option<&str>,
    ) -> Result<Vec<DailyForecast>> {
        let today = self.clock.today();
        let deadline = self.config.deadline().map(Deadline::start);
        info!(
            "Generating {}-day cash flow forecast from {} for tenant {}",
            days,
            start,
            tenant_id.unwrap_or("default")
        );

        let window = ForecastWindow::from_start(start, days);
        let snapshot = match deadline {
            Some(deadline) => {
                tokio::time::timeout(
                    deadline.remaining(),
                    self.fetch_snapshot(tenant_id, window, today),
                )
                .await
                .map_err(|_| deadline.exceeded("fetch"))?
            }
            None => self.fetch_snapshot(tenant_id, window, today).await,
        };

        let forecasts = project_forecast(&snapshot, start, days, today, &self.config, deadline)?;

        let report = persist_forecasts(
            &self.store,
            tenant_id,
            &forecasts,
            &self.config.persistence,
        )
        .await;
        if report.is_complete() {
            debug!("Persisted all {} forecast days", report.attempted);
        } else {
            warn!(
                "Persisted {} of {} forecast days; {} failed",
                report.succeeded.len(),
                report.attempted,
                report.failed.len()
            );
        }

        if let Some(last) = forecasts.last() {
            info!(
                "Forecast complete: {} days, closing balance {} on {}",
                forecasts.len(),
                last.closing_balance,
                last.date
            );
        }
        Ok(forecasts)
    }

    pub async fn fetch_snapshot(
        &self,
        tenant_id: Option<&str>,
        window: ForecastWindow,
        today: NaiveDate,
    ) -> LedgerSnapshot {
        let store = &self.store;
        let months = months_spanned(window.start, window.end);

        let (
            bank_accounts,
            receivable_rows,
            payable_rows,
            repeating_rows,
            pattern_rows,
            budget_rows,
            tax_rows,
            gl_rows,
            settings_blob,
        ) = futures::join!(
            fetched(Dataset::BankAccounts, store.bank_accounts(tenant_id)),
            fetched(
                Dataset::Receivables,
                store.open_invoices(tenant_id, ObligationDirection::Receivable)
            ),
            fetched(
                Dataset::Payables,
                store.open_invoices(tenant_id, ObligationDirection::Payable)
            ),
            fetched(
                Dataset::RepeatingTransactions,
                store.repeating_transactions(tenant_id, window)
            ),
            fetched(Dataset::PaymentPatterns, store.payment_patterns(tenant_id)),
            fetched(Dataset::Budgets, store.budgets(tenant_id, &months)),
            fetched(Dataset::TaxObligations, store.tax_obligations(tenant_id, window)),
            fetched(Dataset::GlAccounts, store.gl_accounts(tenant_id)),
            fetched(
                Dataset::OrganisationSettings,
                store.organisation_settings(tenant_id)
            ),
        );

        let receivables = ingestion::open_obligations(
            &receivable_rows.unwrap_or_default(),
            ObligationDirection::Receivable,
        );
        let payables = ingestion::open_obligations(
            &payable_rows.unwrap_or_default(),
            ObligationDirection::Payable,
        );
        let position =
            ingestion::cash_position(&bank_accounts.unwrap_or_default(), &receivables, &payables);

        let settings = OrganisationSettings::from_blob(settings_blob.flatten().as_ref());
        let chart = gl_rows.map(|rows| ChartOfAccounts::from_accounts(&ingestion::gl_accounts(&rows)));
        let computed = TaxScheduler::new(&self.config.tax).schedule(window, &settings, chart.as_ref());
        let persisted = ingestion::pending_tax_obligations(&tax_rows.unwrap_or_default());
        let tax_obligations = merge_obligations(persisted, computed);

        let snapshot = LedgerSnapshot {
            position,
            receivables,
            payables,
            repeating: ingestion::repeating_transactions(&repeating_rows.unwrap_or_default(), today),
            patterns: ingestion::payment_patterns(&pattern_rows.unwrap_or_default()),
            budgets: ingestion::budgets(&budget_rows.unwrap_or_default()),
            tax_obligations,
        };

        debug!(
            "Snapshot: cash {}, {} receivables, {} payables, {} repeating, {} patterns, {} budgets, {} tax obligations",
            snapshot.position.cash,
            snapshot.receivables.len(),
            snapshot.payables.len(),
            snapshot.repeating.len(),
            snapshot.patterns.len(),
            snapshot.budgets.len(),
            snapshot.tax_obligations.len()
        );
        snapshot
    }

    async fn cached(&self, key: &str) -> Option<Vec<DailyForecast>> {
        let payload = match self.cache.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                warn!("Cache read for {} failed: {}", key, e);
                return None;
            }
        };

        let cached: CachedForecast = match serde_json::from_str(&payload) {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                return None;
            }
        };

        let age = self.clock.now().signed_duration_since(cached.generated_at);
        let fresh = u64::try_from(age.num_seconds())
            .map_or(false, |secs| secs <= self.config.cache_ttl_secs);
        if !fresh {
            debug!("Cache entry {} is stale", key);
            return None;
        }
        Some(cached.forecasts)
    }

    async fn write_cache(&self, key: &str, forecasts: &[DailyForecast]) {
        let payload = CachedForecast {
            generated_at: self.clock.now(),
            forecasts: forecasts.to_vec(),
        };
        let result = match serde_json::to_string(&payload) {
            Ok(json) => self.cache.set(key, json, self.config.cache_ttl()).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Cache write for {} failed: {}", key, e);
        }
    }
}

async fn fetched<T>(dataset: Dataset, query: impl Future<Output = Result<T>>) -> Option<T> {
    match query.await {
        Ok(rows) => Some(rows),
        Err(e) => {
            warn!(
                "Failed to fetch {}, continuing without them: {}",
                dataset.name(),
                e
            );
            None
        }
    }
}

/// Runs the day loop over a snapshot.
///
/// Day 0 opens on the snapshot's cash; every later day opens on the previous
/// day's close. A close that would overflow to a non-finite value is clamped
/// to zero, so that day alone breaks `open + in - out == close`; the next day
/// opens on the clamped zero.
pub fn project_forecast(
    snapshot: &LedgerSnapshot,
    start: NaiveDate,
    days: u32,
    today: NaiveDate,
    config: &ForecastConfig,
    deadline: Option<Deadline>,
) -> Result<Vec<DailyForecast>> {
    let patterns = PaymentPatternIndex::new(&snapshot.patterns);
    let (receipts, payments) = split_repeating(&snapshot.repeating);

    let mut balance = snapshot.position.cash;
    let mut forecasts = Vec::with_capacity(days as usize);

    for offset in 0..days {
        if let Some(deadline) = deadline {
            deadline.check("projection")?;
        }

        let date = start
            .checked_add_days(Days::new(u64::from(offset)))
            .ok_or_else(|| {
                ForecastError::DateError(format!("{} + {} days is out of range", start, offset))
            })?;

        let opening_balance = balance;
        let inflows = Inflows::new(
            receivable_inflow(date, &snapshot.receivables, &patterns),
            repeating_flow(date, &receipts),
            Money::ZERO,
        );

        let committed = Outflows::new(
            payable_outflow(date, &snapshot.payables, &patterns),
            repeating_flow(date, &payments),
            tax_outflow(date, &snapshot.tax_obligations),
            pattern_outflow(date, &patterns),
            Money::ZERO,
        );
        let outflows = committed.with_budgets(budget_outflow(
            date,
            &snapshot.budgets,
            committed.actual(),
            config.confidence.budgeted,
        ));

        let raw_closing =
            opening_balance.value() + inflows.total.value() - outflows.total.value();
        if !raw_closing.is_finite() {
            warn!(
                "Closing balance on {} overflows, clamping to zero and carrying zero forward",
                date
            );
        }
        let closing_balance = opening_balance + inflows.total - outflows.total;

        let alerts = generate_alerts(
            &AlertContext {
                date,
                closing_balance,
                total_outflow: outflows.total,
                tax_outflow: outflows.to_taxes,
                today,
            },
            &snapshot.receivables,
            &config.alerts,
        );

        forecasts.push(DailyForecast {
            date,
            opening_balance,
            inflows,
            outflows,
            closing_balance,
            scenarios: scenario_bands(opening_balance, &inflows, &outflows, &config.scenario),
            confidence_level: confidence_level(&inflows, &outflows, &config.confidence),
            alerts,
        });
        balance = closing_balance;
    }

    Ok(forecasts)
}

/// Upserts forecasts in batches of `policy.batch_size`.
///
/// Items within a batch are written concurrently, bounded by
/// `policy.max_concurrent_writes`. A failed upsert is logged and recorded in
/// the report; it never aborts its siblings or later batches.
pub async fn persist_forecasts<S: LedgerStore>(
    store: &S,
    tenant_id: Option<&str>,
    forecasts: &[DailyForecast],
    policy: &PersistencePolicy,
) -> PersistenceReport {
    let permits = policy.max_concurrent_writes.clamp(1, Semaphore::MAX_PERMITS);
    let semaphore = Semaphore::new(permits);
    let delay = policy.inter_batch_delay();
    let batch_count = forecasts.len().div_ceil(policy.batch_size.max(1));
    let mut report = PersistenceReport::default();

    for (index, batch) in forecasts.chunks(policy.batch_size.max(1)).enumerate() {
        let writes = batch.iter().map(|forecast| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| ForecastError::Store(e.to_string()))?;
                let row = ForecastRow::from_forecast(forecast)?;
                store.upsert_forecast(tenant_id, row).await
            }
        });
        let results = join_all(writes).await;

        for (forecast, result) in batch.iter().zip(results) {
            report.attempted += 1;
            match result {
                Ok(()) => report.succeeded.push(forecast.date),
                Err(e) => {
                    error!("Failed to persist forecast for {}: {}", forecast.date, e);
                    report.failed.push(forecast.date);
                }
            }
        }
        debug!("Persisted batch {}/{}", index + 1, batch_count);

        if index + 1 < batch_count && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    report
}
