//! Upstream yield source.
//!
//! Claims ask the yield source (the lending manager in production) to
//! transfer earned yield to the claimant. The source may deliver less than
//! requested; the shortfall stays accrued for a later claim.

use std::collections::HashMap;

use nftboost_types::{Address, Amount};

/// Errors reported by a yield source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum YieldSourceError {
    /// The source could not perform the transfer at all.
    #[error("yield source unavailable: {0}")]
    Unavailable(String),
}

/// Transfers yield to claimants.
pub trait YieldSource {
    /// Transfer up to `amount` to `recipient`, returning what was actually
    /// transferred. A return value below `amount` is a partial payout, not
    /// an error.
    ///
    /// # Errors
    ///
    /// Any error aborts the claim with no state change.
    fn request_yield_transfer(
        &mut self,
        amount: Amount,
        recipient: &Address,
    ) -> std::result::Result<Amount, YieldSourceError>;
}

impl<T: YieldSource + ?Sized> YieldSource for Box<T> {
    fn request_yield_transfer(
        &mut self,
        amount: Amount,
        recipient: &Address,
    ) -> std::result::Result<Amount, YieldSourceError> {
        (**self).request_yield_transfer(amount, recipient)
    }
}

/// In-process yield source paying from a finite reserve.
///
/// Pays `min(requested, reserve)` and records per-recipient totals.
#[derive(Debug, Clone, Default)]
pub struct ReserveYieldSource {
    available: Amount,
    paid: HashMap<Address, Amount>,
    total_paid: Amount,
    disabled: bool,
}

impl ReserveYieldSource {
    pub fn new(available: Amount) -> Self {
        Self {
            available,
            ..Default::default()
        }
    }

    /// Add to the reserve.
    pub fn fund(&mut self, amount: Amount) {
        self.available = self.available.saturating_add(amount);
        tracing::debug!(amount = %amount, available = %self.available, "yield reserve funded");
    }

    /// Toggle availability. A disabled source fails every transfer.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.disabled = !enabled;
    }

    pub fn available(&self) -> Amount {
        self.available
    }

    /// Total transferred to `recipient` so far.
    pub fn paid_to(&self, recipient: &Address) -> Amount {
        self.paid.get(recipient).copied().unwrap_or(0)
    }

    pub fn total_paid(&self) -> Amount {
        self.total_paid
    }
}

impl YieldSource for ReserveYieldSource {
    fn request_yield_transfer(
        &mut self,
        amount: Amount,
        recipient: &Address,
    ) -> std::result::Result<Amount, YieldSourceError> {
        if self.disabled {
            return Err(YieldSourceError::Unavailable(
                "reserve is disabled".to_string(),
            ));
        }

        let transferred = amount.min(self.available);
        self.available -= transferred;
        let slot = self.paid.entry(*recipient).or_insert(0);
        *slot = slot.saturating_add(transferred);
        self.total_paid = self.total_paid.saturating_add(transferred);

        if transferred < amount {
            tracing::warn!(
                requested = %amount,
                transferred = %transferred,
                "yield reserve short"
            );
        }
        Ok(transferred)
    }
}
