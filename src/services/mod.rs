//! Business operations. Each service owns `Arc` handles to the stores and
//! external sinks it needs; `AppState` wires them together once at startup.

use serde::Serialize;

use crate::error::AppError;

pub mod approval;
pub mod attendance;
pub mod hours;
pub mod ledger;
pub mod reports;

#[cfg(test)]
pub mod fixtures;

/// Outcome of the report update that follows a committed ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SheetSync {
    Synced,
    /// The ledger change stands; the sheet must be regenerated by hand.
    Failed { error: String },
}

impl SheetSync {
    pub fn from_result<T>(result: Result<T, AppError>) -> Self {
        match result {
            Ok(_) => SheetSync::Synced,
            Err(e) => {
                tracing::error!(error = %e, "Report sheet update failed after ledger write");
                SheetSync::Failed { error: e.to_string() }
            }
        }
    }

    /// Keeps the first failure.
    pub fn and(self, other: SheetSync) -> SheetSync {
        match self {
            SheetSync::Synced => other,
            failed => failed,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SheetSync::Synced)
    }
}

/// A committed ledger change together with the state of the report sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerWrite<T> {
    pub value: T,
    pub sheet: SheetSync,
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn require_location(locations: &[String], location: &str) -> Result<(), AppError> {
    require("location", location)?;
    if !locations.iter().any(|l| l == location) {
        return Err(AppError::validation(format!("unknown location '{}'", location)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_wins() {
        let failed = SheetSync::Failed { error: "a".into() };
        assert_eq!(SheetSync::Synced.and(failed.clone()), failed);
        assert_eq!(failed.clone().and(SheetSync::Failed { error: "b".into() }), failed);
        assert!(SheetSync::Synced.and(SheetSync::Synced).is_synced());
    }

    #[test]
    fn locations_must_be_configured() {
        let locations = vec!["Everett".to_string()];
        assert!(require_location(&locations, "Everett").is_ok());
        assert!(matches!(
            require_location(&locations, "Bothell"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(require_location(&locations, " "), Err(AppError::Validation(_))));
    }
}
