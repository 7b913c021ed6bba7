//! # Cash Flow Forecaster
//!
//! A library for projecting an organisation's daily cash position from its
//! ledger: open receivables and payables, repeating transactions, payment
//! history, budgets and UK statutory tax obligations.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: every ledger dataset is read once per run, concurrently, and
//!   converted into typed records at the ingestion boundary
//! - **Money**: amounts are a finite-float newtype; untrusted numerics are
//!   normalised to zero on the way in
//! - **Day loop**: each day's closing balance is the next day's opening balance
//! - **Tax scheduling**: VAT, PAYE/NI and Corporation Tax obligations are derived
//!   from GL balances and merged with persisted pending obligations
//! - **Degradation**: a failed dataset read contributes nothing rather than
//!   failing the run
//!
//! ## Example
//!
//! ```rust,ignore
//! use cash_flow_forecaster::*;
//!
//! let ledger = InMemoryLedger::new(serde_json::from_str(ledger_json)?);
//! let forecaster = CashFlowForecaster::builder(ledger)
//!     .cache(InMemoryCache::new())
//!     .config(ForecastConfig::default())
//!     .build()?;
//!
//! let forecast = forecaster.generate_forecast(90, Some("acme")).await?;
//! let summary = ForecastSummary::from_forecasts(&forecast, &forecaster.config().alerts);
//! ```

pub mod alerts;
pub mod chart_of_accounts;
pub mod config;
pub mod engine;
pub mod error;
pub mod flows;
pub mod ingestion;
pub mod money;
pub mod scenario;
pub mod schema;
pub mod store;
pub mod summary;
pub mod tax;
pub mod utils;

pub use alerts::{generate_alerts, overdue_alert, AlertContext};
pub use chart_of_accounts::ChartOfAccounts;
pub use config::{
    AccountMatcher, AlertThresholds, ConfidenceWeights, ForecastConfig, PersistencePolicy,
    ScenarioMultipliers, TaxPolicy,
};
pub use engine::{
    cache_key, persist_forecasts, project_forecast, CachedForecast, CashFlowForecaster, Deadline,
    ForecastBuilder, PersistenceReport,
};
pub use error::{ForecastError, Result};
pub use money::{to_finite_number, Money, NumericLike};
pub use schema::*;
pub use store::{
    Clock, Dataset, FixedClock, ForecastCache, ForecastRow, InMemoryCache, InMemoryLedger,
    LedgerData, LedgerStore, NullCache, SystemClock,
};
pub use summary::ForecastSummary;
pub use tax::{
    merge_obligations, FinancialYearEnd, OrganisationSettings, TaxScheduler, VatReturnFrequency,
    VatScheme,
};

/// Generates a forecast with default configuration, no cache and the system
/// clock.
pub async fn generate_forecast<S: LedgerStore>(
    store: S,
    days: u32,
    tenant_id: Option<&str>,
) -> Result<Vec<DailyForecast>> {
    CashFlowForecaster::builder(store)
        .build()?
        .generate_forecast(days, tenant_id)
        .await
}
