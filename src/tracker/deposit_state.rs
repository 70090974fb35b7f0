use serde::{Deserialize, Serialize};

/// Lifecycle state of a deposit.
///
/// Transitions only move forward (`Pending -> Active -> Cleaned`), except
/// for the `Cleaned -> Active` reversal when a cleaned deposit is seen again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositState {
    /// Posture trigger seen, waiting for a matching detection. Only entries
    /// in the pending pool are in this state; a `Deposit` never is.
    Pending,
    /// Confirmed by a detection and still on the ground
    Active,
    /// Removed by a human
    Cleaned,
}

impl DepositState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Cleaned => "cleaned",
        }
    }
}
