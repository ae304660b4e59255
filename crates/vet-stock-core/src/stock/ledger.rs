//! Stock ledger operations on a single item.
//!
//! These are the only code paths that move stock between tiers or in and out
//! of an item. All of them operate on an in-memory [`StockItem`]; persisting
//! the result is the caller's job (see [`super::Reconciler`]).

use tracing::{debug, error, warn};

use super::{validate_quantity, StockError, StockResult};
use crate::models::StockItem;

/// Rounding residue tolerated when fractioning fractional unit counts.
pub const STOCK_EPSILON: f64 = 1e-9;

impl StockItem {
    /// Fail with `InsufficientStock` if fewer than `needed` base units are on the shelf.
    pub fn ensure_sufficient(&self, needed: f64) -> StockResult<()> {
        if needed <= 0.0 {
            return Ok(());
        }
        let available = self.total_base();
        if available < needed {
            warn!(
                item_id = %self.item_id,
                item = %self.name,
                requested = needed,
                available,
                "insufficient stock"
            );
            return Err(StockError::InsufficientStock {
                item: self.name.clone(),
                requested: needed,
                available,
                unit: self.labels().base,
            });
        }
        Ok(())
    }

    /// Open `count` packs/vials into loose units.
    pub fn break_tier2_to_base(&mut self, count: i64) -> StockResult<()> {
        if count <= 0 {
            return Ok(());
        }
        if self.stock.tier2 < count {
            return Err(StockError::InsufficientPacks {
                item: self.name.clone(),
                container: self.labels().tier2,
                requested: count,
                available: self.stock.tier2,
            });
        }
        self.stock.tier2 -= count;
        self.stock.base += count as f64 * self.packaging.base_per_tier2;
        debug!(item_id = %self.item_id, count, "opened {}", self.labels().tier2);
        Ok(())
    }

    /// Open `count` boxes into loose packs/vials.
    pub fn break_tier1_to_tier2(&mut self, count: i64) -> StockResult<()> {
        if count <= 0 {
            return Ok(());
        }
        if self.stock.tier1 < count {
            return Err(StockError::InsufficientBoxes {
                item: self.name.clone(),
                container: self.labels().tier1,
                requested: count,
                available: self.stock.tier1,
            });
        }
        let opened = count
            .checked_mul(self.packaging.tier2_per_tier1)
            .and_then(|packs| self.stock.tier2.checked_add(packs))
            .ok_or_else(|| StockError::CountOverflow {
                item: self.name.clone(),
                field: "stock_tier2",
            })?;
        self.stock.tier1 -= count;
        self.stock.tier2 = opened;
        debug!(item_id = %self.item_id, count, "opened {}", self.labels().tier1);
        Ok(())
    }

    /// Take `quantity` base units out of stock, opening containers as needed.
    ///
    /// Loose units go first. When they run short, exactly one pack/vial is
    /// opened at a time; a box is only opened when no loose pack/vial is left,
    /// and always into packs/vials, never straight into units.
    pub fn consume(&mut self, quantity: f64) -> StockResult<()> {
        validate_quantity(quantity)?;
        if quantity <= 0.0 {
            return Ok(());
        }

        self.ensure_sufficient(quantity)?;

        let mut deficit = quantity - self.stock.base;
        while deficit > 0.0 {
            if self.stock.tier2 > 0 {
                self.break_tier2_to_base(1)?;
            } else if self.stock.tier1 > 0 {
                self.break_tier1_to_tier2(1)?;
            } else if deficit <= STOCK_EPSILON {
                break;
            } else {
                error!(
                    item_id = %self.item_id,
                    item = %self.name,
                    deficit,
                    "fractioning exhausted after sufficiency check passed"
                );
                return Err(StockError::StockFractioningExhausted {
                    item: self.name.clone(),
                    deficit,
                });
            }
            deficit = quantity - self.stock.base;
        }

        self.stock.base -= quantity;
        if self.stock.base < 0.0 {
            // residue below STOCK_EPSILON
            self.stock.base = 0.0;
        }
        Ok(())
    }

    /// Return `quantity` base units to stock as loose units.
    ///
    /// Opened containers stay opened: nothing is ever repacked.
    pub fn revert(&mut self, quantity: f64) -> StockResult<()> {
        validate_quantity(quantity)?;
        if quantity <= 0.0 {
            return Ok(());
        }
        self.stock.base += quantity;
        Ok(())
    }
}
