//! Money movement: deposits and withdrawals.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "DEPOSIT")]
    Deposit,
    #[serde(rename = "WITHDRAW")]
    Withdraw,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdraw => "WITHDRAW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(TransactionKind::Deposit),
            "WITHDRAW" => Some(TransactionKind::Withdraw),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TransactionStatus::Pending),
            "COMPLETED" => Some(TransactionStatus::Completed),
            "FAILED" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a transaction contributes to the account balance.
///
/// A deposit counts only once an administrator has verified it against
/// the payment gateway; a withdrawal counts once completed.
pub fn balance_eligible(kind: &str, status: &str, verified: bool) -> bool {
    match TransactionKind::parse(kind) {
        Some(TransactionKind::Deposit) => {
            status == TransactionStatus::Completed.as_str() && verified
        }
        Some(TransactionKind::Withdraw) => status == TransactionStatus::Completed.as_str(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for kind in ["DEPOSIT", "WITHDRAW"] {
            assert_eq!(TransactionKind::parse(kind).unwrap().as_str(), kind);
        }
        for status in ["PENDING", "COMPLETED", "FAILED"] {
            assert_eq!(TransactionStatus::parse(status).unwrap().as_str(), status);
        }
        assert!(TransactionKind::parse("TRANSFER").is_none());
    }

    #[test]
    fn test_balance_eligibility() {
        // Unverified or pending deposits never count
        assert!(!balance_eligible("DEPOSIT", "PENDING", false));
        assert!(!balance_eligible("DEPOSIT", "PENDING", true));
        assert!(!balance_eligible("DEPOSIT", "COMPLETED", false));
        assert!(balance_eligible("DEPOSIT", "COMPLETED", true));

        // Withdrawals count on completion regardless of the verified flag
        assert!(!balance_eligible("WITHDRAW", "PENDING", false));
        assert!(balance_eligible("WITHDRAW", "COMPLETED", false));
        assert!(!balance_eligible("WITHDRAW", "FAILED", false));
    }
}
