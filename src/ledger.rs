//! Position ledger
//!
//! Cash and asset balances with fee-aware trade transitions. The strategy is
//! always fully in one side or the other; a trade flips the entire balance.

use crate::SimulationError;

/// Cash/asset balances of a single-asset, all-in position.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    cash: f64,
    asset: f64,
    fee: f64,
}

impl Ledger {
    pub fn new(initial_capital: f64, fee: f64) -> Self {
        Ledger {
            cash: initial_capital,
            asset: 0.0,
            fee,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn asset(&self) -> f64 {
        self.asset
    }

    /// Notional value of the ledger at the given reference price.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.asset * price
    }

    /// Convert the full cash balance into asset at `price`, fee deducted.
    pub fn buy(&mut self, price: f64) -> Result<(), SimulationError> {
        if price <= 0.0 {
            return Err(SimulationError::InvalidPrice { price });
        }
        self.asset += self.cash * (1.0 - self.fee) / price;
        self.cash = 0.0;
        Ok(())
    }

    /// Convert the full asset balance into cash at `price`, fee deducted.
    pub fn sell(&mut self, price: f64) -> Result<(), SimulationError> {
        if price <= 0.0 {
            return Err(SimulationError::InvalidPrice { price });
        }
        self.cash += self.asset * price * (1.0 - self.fee);
        self.asset = 0.0;
        Ok(())
    }

    /// Value any remaining asset as cash at `price`.
    ///
    /// This is a valuation step, not a trade: no fee is taken, unlike
    /// [`sell`](Ledger::sell).
    pub fn mark_to_market(&mut self, price: f64) {
        self.cash += self.asset * price;
        self.asset = 0.0;
    }
}
