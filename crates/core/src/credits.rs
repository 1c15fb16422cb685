//! Session context and credit ledger entries.

use serde::{Deserialize, Serialize};

use crate::archetype::Archetype;
use crate::types::{Credits, UserId};

/// An authenticated user and the balance known at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub credits: Credits,
}

/// Who is generating, passed explicitly to every call site.
///
/// Anonymous sessions (no user, or no backend configured) are unmetered:
/// credit checks always pass and nothing is persisted remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionContext {
    Anonymous,
    Authenticated(UserAccount),
}

impl SessionContext {
    pub fn authenticated(id: impl Into<UserId>, credits: Credits) -> Self {
        Self::Authenticated(UserAccount {
            id: id.into(),
            credits,
        })
    }

    pub fn is_metered(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn user(&self) -> Option<&UserAccount> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user().map(|u| u.id.as_str())
    }

    /// Whether the session can pay for at least one image of `archetype`.
    pub fn can_afford(&self, archetype: Archetype) -> bool {
        match self {
            Self::Anonymous => true,
            Self::Authenticated(user) => user.credits >= archetype.credit_cost(),
        }
    }
}

/// One committed charge against a user's balance.
///
/// `balance_after == balance_before - cost_charged`, and the balance never
/// goes negative: [`CreditLedgerEntry::charge`] refuses an uncovered cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLedgerEntry {
    pub user_id: UserId,
    pub cost_charged: Credits,
    pub balance_after: Credits,
}

impl CreditLedgerEntry {
    pub fn charge(user_id: impl Into<UserId>, balance_before: Credits, cost: Credits) -> Option<Self> {
        balance_before.checked_sub(cost).map(|balance_after| Self {
            user_id: user_id.into(),
            cost_charged: cost,
            balance_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_sessions_are_unmetered() {
        let ctx = SessionContext::Anonymous;
        assert!(!ctx.is_metered());
        assert!(ctx.can_afford(Archetype::Infographic));
        assert_eq!(ctx.user_id(), None);
    }

    #[test]
    fn authenticated_affordability() {
        let ctx = SessionContext::authenticated("u1", 7);
        assert!(ctx.can_afford(Archetype::FeaturedImage));
        assert!(!ctx.can_afford(Archetype::Infographic));
        assert_eq!(ctx.user_id(), Some("u1"));
    }

    #[test]
    fn charge_never_goes_negative() {
        let entry = CreditLedgerEntry::charge("u1", 12, 5).unwrap();
        assert_eq!(entry.balance_after, 7);
        assert_eq!(entry.cost_charged, 5);
        assert!(CreditLedgerEntry::charge("u1", 2, 5).is_none());
    }

    #[test]
    fn charge_exact_balance() {
        let entry = CreditLedgerEntry::charge("u1", 5, 5).unwrap();
        assert_eq!(entry.balance_after, 0);
    }
}
