//! Invariant checks on packaging ratios, stock levels and quantities.

use super::{StockError, StockResult};
use crate::models::{ItemKind, Packaging, StockItem, StockLevels};

impl StockItem {
    /// Check packaging ratios and stock levels before any save.
    pub fn validate(&self) -> StockResult<()> {
        validate_packaging(&self.name, self.kind, &self.packaging)?;
        validate_levels(&self.name, &self.stock)
    }
}

/// Ratios left at zero mean "not configured" and are accepted.
pub fn validate_packaging(item: &str, kind: ItemKind, packaging: &Packaging) -> StockResult<()> {
    let labels = kind.labels();
    if packaging.tier2_per_tier1 != 0 && packaging.tier2_per_tier1 < 1 {
        return Err(StockError::InvalidPackagingConfig {
            item: item.to_string(),
            reason: format!(
                "{}s per {} must be at least 1 (got {})",
                labels.tier2, labels.tier1, packaging.tier2_per_tier1
            ),
        });
    }
    if packaging.base_per_tier2 != 0.0 && !(packaging.base_per_tier2 > 0.0) {
        return Err(StockError::InvalidPackagingConfig {
            item: item.to_string(),
            reason: format!(
                "{}s per {} must be greater than 0 (got {})",
                labels.base, labels.tier2, packaging.base_per_tier2
            ),
        });
    }
    Ok(())
}

pub fn validate_levels(item: &str, stock: &StockLevels) -> StockResult<()> {
    let negative = |field: &'static str, value: f64| StockError::NegativeStock {
        item: item.to_string(),
        field,
        value,
    };
    if stock.tier1 < 0 {
        return Err(negative("stock_tier1", stock.tier1 as f64));
    }
    if stock.tier2 < 0 {
        return Err(negative("stock_tier2", stock.tier2 as f64));
    }
    if !(stock.base >= 0.0) {
        return Err(negative("stock_base", stock.base));
    }
    Ok(())
}

/// Ledger operations only accept finite quantities.
pub fn validate_quantity(quantity: f64) -> StockResult<()> {
    if !quantity.is_finite() {
        return Err(StockError::InvalidQuantity(quantity));
    }
    Ok(())
}

/// Movement records additionally require a non-negative quantity.
pub fn validate_movement_quantity(quantity: f64) -> StockResult<()> {
    validate_quantity(quantity)?;
    if quantity < 0.0 {
        return Err(StockError::InvalidQuantity(quantity));
    }
    Ok(())
}
