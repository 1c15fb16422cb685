//! Credit budgeting for generation runs.
//!
//! A [`BudgetTracker`] is the single point of mutation for a run's credits.
//! Each item reserves its cost before dispatch; the reservation is
//! committed when the item succeeds and released when it fails, so
//! concurrent dispatch can never spend more than the budget.

use imagegen_core::types::Credits;
use imagegen_core::{Archetype, SessionContext};
use tokio::sync::Mutex;

/// The credit allowance for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditBudget {
    /// No backend or no signed-in user: every check passes.
    Unmetered,
    Metered { remaining: Credits },
}

impl CreditBudget {
    /// The allowance of `ctx`: its known balance, or unmetered.
    pub fn for_session(ctx: &SessionContext) -> Self {
        match ctx.user() {
            Some(user) => Self::Metered {
                remaining: user.credits,
            },
            None => Self::Unmetered,
        }
    }

    /// Limit the budget to at most `cap` credits.
    pub fn capped(self, cap: Credits) -> Self {
        match self {
            Self::Unmetered => Self::Metered { remaining: cap },
            Self::Metered { remaining } => Self::Metered {
                remaining: remaining.min(cap),
            },
        }
    }

    pub fn covers(&self, cost: Credits) -> bool {
        match self {
            Self::Unmetered => true,
            Self::Metered { remaining } => *remaining >= cost,
        }
    }

    pub fn can_afford(&self, archetype: Archetype) -> bool {
        self.covers(archetype.credit_cost())
    }

    /// `None` when unmetered.
    pub fn remaining(&self) -> Option<Credits> {
        match self {
            Self::Unmetered => None,
            Self::Metered { remaining } => Some(*remaining),
        }
    }
}

/// Credits set aside for one in-flight item.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    cost: Credits,
}

impl Reservation {
    pub fn cost(&self) -> Credits {
        self.cost
    }
}

/// Balance movement produced by committing a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charge {
    pub balance_before: Credits,
    pub balance_after: Credits,
}

#[derive(Debug)]
enum TrackerState {
    Unmetered,
    Metered {
        /// Balance after committed charges.
        balance: Credits,
        /// Sum of outstanding reservations.
        reserved: Credits,
    },
}

/// Shared, mutex-guarded view of a [`CreditBudget`] during a run.
#[derive(Debug)]
pub struct BudgetTracker {
    state: Mutex<TrackerState>,
}

impl BudgetTracker {
    pub fn new(budget: CreditBudget) -> Self {
        let state = match budget {
            CreditBudget::Unmetered => TrackerState::Unmetered,
            CreditBudget::Metered { remaining } => TrackerState::Metered {
                balance: remaining,
                reserved: 0,
            },
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Atomically set `cost` aside.
    ///
    /// Fails with the credits still available (balance minus outstanding
    /// reservations) when they do not cover `cost`.
    pub async fn reserve(&self, cost: Credits) -> Result<Reservation, Credits> {
        let mut state = self.state.lock().await;
        match &mut *state {
            TrackerState::Unmetered => Ok(Reservation { cost }),
            TrackerState::Metered { balance, reserved } => {
                let available = balance.saturating_sub(*reserved);
                if available < cost {
                    return Err(available);
                }
                *reserved += cost;
                Ok(Reservation { cost })
            }
        }
    }

    /// Turn a reservation into a charge. `None` when unmetered.
    pub async fn commit(&self, reservation: Reservation) -> Option<Charge> {
        let mut state = self.state.lock().await;
        match &mut *state {
            TrackerState::Unmetered => None,
            TrackerState::Metered { balance, reserved } => {
                *reserved = reserved.saturating_sub(reservation.cost);
                let balance_before = *balance;
                *balance = balance.saturating_sub(reservation.cost);
                Some(Charge {
                    balance_before,
                    balance_after: *balance,
                })
            }
        }
    }

    /// Return a reservation's credits to the pool.
    pub async fn release(&self, reservation: Reservation) {
        let mut state = self.state.lock().await;
        if let TrackerState::Metered { reserved, .. } = &mut *state {
            *reserved = reserved.saturating_sub(reservation.cost);
        }
    }

    /// Current budget, counting outstanding reservations as spent.
    pub async fn snapshot(&self) -> CreditBudget {
        match &*self.state.lock().await {
            TrackerState::Unmetered => CreditBudget::Unmetered,
            TrackerState::Metered { balance, reserved } => CreditBudget::Metered {
                remaining: balance.saturating_sub(*reserved),
            },
        }
    }
}
