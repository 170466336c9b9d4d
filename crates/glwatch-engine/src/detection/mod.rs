pub mod change;
pub mod outliers;
pub mod policy;
pub mod sign;
pub mod stats;
pub mod zscore;

pub use change::{
    ChangeFinding, ChangeThresholds, ComponentChange, GroupPresence, detect_change_anomalies,
};
pub use outliers::{TransactionOutlier, detect_transaction_outliers};
pub use policy::{AggregateField, DetectionPolicy, SignRule};
pub use sign::{
    RangeSignStatus, RangeSignSummary, Sign, SignAnalysis, SignBasis, SignFinding,
    default_sign_ranges, detect_sign_anomalies,
};
pub use stats::{LedgerStats, ledger_stats};
pub use zscore::{ZScoreFinding, detect_zscore_anomalies};
