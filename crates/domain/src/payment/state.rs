//! Payment attempt state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The state of a payment attempt.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──┬──► Completed ──► Refunded
///                          └──► Failed
/// ```
/// Completed, Failed and Refunded are terminal for the charge itself;
/// Refunded is reachable only from Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Attempt recorded but not yet submitted to the gateway.
    #[default]
    Pending,

    /// Write-ahead state: the gateway call is (or was) in flight.
    Processing,

    /// The gateway accepted the charge (terminal for the charge).
    Completed,

    /// The gateway declined the charge (terminal).
    Failed,

    /// A completed charge was refunded (terminal).
    Refunded,
}

impl PaymentStatus {
    /// Returns true if the charge has reached an outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Refunded
        )
    }

    /// Returns true if the attempt can be refunded in this state.
    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    /// Returns the status name as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}
