use crate::error::{ForecastError, Result};
use crate::ingestion::{
    row_date, RawBankAccount, RawBudget, RawGlAccount, RawInvoice, RawPaymentPattern,
    RawRepeatingTransaction, RawTaxObligation,
};
use crate::schema::{DailyForecast, ForecastWindow, ObligationDirection};
use crate::utils::parse_month_year;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    BankAccounts,
    Receivables,
    Payables,
    RepeatingTransactions,
    PaymentPatterns,
    Budgets,
    TaxObligations,
    GlAccounts,
    OrganisationSettings,
}

impl Dataset {
    pub fn name(self) -> &'static str {
        match self {
            Dataset::BankAccounts => "bank accounts",
            Dataset::Receivables => "open receivables",
            Dataset::Payables => "open payables",
            Dataset::RepeatingTransactions => "repeating transactions",
            Dataset::PaymentPatterns => "payment patterns",
            Dataset::Budgets => "budgets",
            Dataset::TaxObligations => "tax obligations",
            Dataset::GlAccounts => "GL accounts",
            Dataset::OrganisationSettings => "organisation settings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub opening_balance: f64,
    pub inflow_invoices: f64,
    pub inflow_repeating: f64,
    pub inflow_other: f64,
    pub inflow_total: f64,
    pub outflow_bills: f64,
    pub outflow_repeating: f64,
    pub outflow_taxes: f64,
    pub outflow_patterns: f64,
    pub outflow_budgets: f64,
    pub outflow_total: f64,
    pub closing_balance: f64,
    pub best_case: f64,
    pub worst_case: f64,
    pub confidence_level: f64,
    pub alerts: String,
}

impl ForecastRow {
    pub fn from_forecast(forecast: &DailyForecast) -> Result<Self> {
        Ok(Self {
            date: forecast.date,
            opening_balance: forecast.opening_balance.value(),
            inflow_invoices: forecast.inflows.from_invoices.value(),
            inflow_repeating: forecast.inflows.from_repeating.value(),
            inflow_other: forecast.inflows.from_other.value(),
            inflow_total: forecast.inflows.total.value(),
            outflow_bills: forecast.outflows.to_bills.value(),
            outflow_repeating: forecast.outflows.to_repeating.value(),
            outflow_taxes: forecast.outflows.to_taxes.value(),
            outflow_patterns: forecast.outflows.to_patterns.value(),
            outflow_budgets: forecast.outflows.to_budgets.value(),
            outflow_total: forecast.outflows.total.value(),
            closing_balance: forecast.closing_balance.value(),
            best_case: forecast.scenarios.best_case.value(),
            worst_case: forecast.scenarios.worst_case.value(),
            confidence_level: forecast.confidence_level,
            alerts: serde_json::to_string(&forecast.alerts)?,
        })
    }
}

/// Read access to ledger records plus the forecast upsert.
///
/// Implementations may pre-filter rows (by status, amount or date window);
/// the engine re-applies eligibility rules during ingestion regardless.
pub trait LedgerStore: Send + Sync {
    fn bank_accounts(
        &self,
        tenant_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<RawBankAccount>>> + Send;

    fn open_invoices(
        &self,
        tenant_id: Option<&str>,
        direction: ObligationDirection,
    ) -> impl Future<Output = Result<Vec<RawInvoice>>> + Send;

    fn repeating_transactions(
        &self,
        tenant_id: Option<&str>,
        window: ForecastWindow,
    ) -> impl Future<Output = Result<Vec<RawRepeatingTransaction>>> + Send;

    fn payment_patterns(
        &self,
        tenant_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<RawPaymentPattern>>> + Send;

    fn budgets(
        &self,
        tenant_id: Option<&str>,
        months: &[NaiveDate],
    ) -> impl Future<Output = Result<Vec<RawBudget>>> + Send;

    fn tax_obligations(
        &self,
        tenant_id: Option<&str>,
        window: ForecastWindow,
    ) -> impl Future<Output = Result<Vec<RawTaxObligation>>> + Send;

    fn gl_accounts(
        &self,
        tenant_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<RawGlAccount>>> + Send;

    fn organisation_settings(
        &self,
        tenant_id: Option<&str>,
    ) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Inserts or replaces the forecast row for `row.date`.
    fn upsert_forecast(
        &self,
        tenant_id: Option<&str>,
        row: ForecastRow,
    ) -> impl Future<Output = Result<()>> + Send;
}

pub trait ForecastCache: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Midnight UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        FixedClock(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl ForecastCache for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        Ok(())
    }
}

fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    what: &str,
    error: fn(String) -> ForecastError,
) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| error(format!("{} lock poisoned", what)))
}

#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ForecastCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = lock(&self.entries, "cache", ForecastError::Cache)?;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now() + ttl;
        lock(&self.entries, "cache", ForecastError::Cache)?
            .insert(key.to_string(), (value, expires_at));
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerData {
    pub bank_accounts: Vec<RawBankAccount>,
    pub invoices: Vec<RawInvoice>,
    pub repeating_transactions: Vec<RawRepeatingTransaction>,
    pub payment_patterns: Vec<RawPaymentPattern>,
    pub budgets: Vec<RawBudget>,
    pub tax_obligations: Vec<RawTaxObligation>,
    pub gl_accounts: Vec<RawGlAccount>,
    pub organisation_settings: Option<Value>,
}

/// In-memory ledger. Rows are shared by all tenants; persisted forecasts are
/// kept per tenant.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    data: LedgerData,
    failing: HashSet<Dataset>,
    failing_upserts: HashSet<NaiveDate>,
    forecasts: Mutex<BTreeMap<(String, NaiveDate), ForecastRow>>,
    reads: Mutex<usize>,
}

impl InMemoryLedger {
    pub fn new(data: LedgerData) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn with_failing(mut self, dataset: Dataset) -> Self {
        self.failing.insert(dataset);
        self
    }

    pub fn with_failing_upsert(mut self, date: NaiveDate) -> Self {
        self.failing_upserts.insert(date);
        self
    }

    pub fn stored_forecasts(&self, tenant_id: Option<&str>) -> Vec<ForecastRow> {
        let tenant = tenant_key(tenant_id);
        self.forecasts
            .lock()
            .map(|rows| {
                rows.iter()
                    .filter(|((t, _), _)| *t == tenant)
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().map(|r| *r).unwrap_or(0)
    }

    fn read<T: Clone>(&self, dataset: Dataset, rows: &[T]) -> Result<Vec<T>> {
        *lock(&self.reads, "read counter", ForecastError::Store)? += 1;
        if self.failing.contains(&dataset) {
            return Err(ForecastError::Store(format!(
                "{} query failed",
                dataset.name()
            )));
        }
        Ok(rows.to_vec())
    }
}

fn tenant_key(tenant_id: Option<&str>) -> String {
    tenant_id.unwrap_or("default").to_string()
}

impl LedgerStore for InMemoryLedger {
    async fn bank_accounts(&self, _tenant_id: Option<&str>) -> Result<Vec<RawBankAccount>> {
        self.read(Dataset::BankAccounts, &self.data.bank_accounts)
    }

    async fn open_invoices(
        &self,
        _tenant_id: Option<&str>,
        direction: ObligationDirection,
    ) -> Result<Vec<RawInvoice>> {
        let dataset = match direction {
            ObligationDirection::Receivable => Dataset::Receivables,
            ObligationDirection::Payable => Dataset::Payables,
        };
        self.read(dataset, &self.data.invoices)
    }

    async fn repeating_transactions(
        &self,
        _tenant_id: Option<&str>,
        window: ForecastWindow,
    ) -> Result<Vec<RawRepeatingTransaction>> {
        let rows = self.read(
            Dataset::RepeatingTransactions,
            &self.data.repeating_transactions,
        )?;
        Ok(rows
            .into_iter()
            .filter(|r| row_date(&r.next_scheduled_date).map_or(false, |d| window.contains(d)))
            .collect())
    }

    async fn payment_patterns(&self, _tenant_id: Option<&str>) -> Result<Vec<RawPaymentPattern>> {
        self.read(Dataset::PaymentPatterns, &self.data.payment_patterns)
    }

    async fn budgets(&self, _tenant_id: Option<&str>, months: &[NaiveDate]) -> Result<Vec<RawBudget>> {
        let rows = self.read(Dataset::Budgets, &self.data.budgets)?;
        Ok(rows
            .into_iter()
            .filter(|b| {
                parse_month_year(&b.month_year)
                    .map(|month| months.contains(&month))
                    .unwrap_or(false)
            })
            .collect())
    }

    async fn tax_obligations(
        &self,
        _tenant_id: Option<&str>,
        window: ForecastWindow,
    ) -> Result<Vec<RawTaxObligation>> {
        let rows = self.read(Dataset::TaxObligations, &self.data.tax_obligations)?;
        Ok(rows
            .into_iter()
            .filter(|t| row_date(&t.due_date).map_or(false, |d| window.contains(d)))
            .collect())
    }

    async fn gl_accounts(&self, _tenant_id: Option<&str>) -> Result<Vec<RawGlAccount>> {
        self.read(Dataset::GlAccounts, &self.data.gl_accounts)
    }

    async fn organisation_settings(&self, _tenant_id: Option<&str>) -> Result<Option<Value>> {
        *lock(&self.reads, "read counter", ForecastError::Store)? += 1;
        if self.failing.contains(&Dataset::OrganisationSettings) {
            return Err(ForecastError::Store("organisation settings query failed".to_string()));
        }
        Ok(self.data.organisation_settings.clone())
    }

    async fn upsert_forecast(&self, tenant_id: Option<&str>, row: ForecastRow) -> Result<()> {
        if self.failing_upserts.contains(&row.date) {
            return Err(ForecastError::Store(format!(
                "upsert for {} rejected",
                row.date
            )));
        }
        lock(&self.forecasts, "forecast table", ForecastError::Store)?
            .insert((tenant_key(tenant_id), row.date), row);
        Ok(())
    }
}
