//! License reconciliation: the PMC bulk list plus Europe PMC per-article detail.

pub mod bulk;
pub mod reconcile;

pub use bulk::BulkLicenseList;
pub use reconcile::{LicenseDecision, LicenseReconciler, LicenseSourceKind};
