//! Movement reconciliation: keeps item stock equal to the sum of active
//! consuming movement records across create, update and delete.

use tracing::info;

use super::StockError;
use crate::models::{MovementSnapshot, StockItem};

/// A single ledger mutation derived from a movement lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerAction {
    Consume { item_id: String, quantity: f64 },
    Revert { item_id: String, quantity: f64 },
}

impl LedgerAction {
    fn consume(item_id: &str, quantity: f64) -> Option<Self> {
        (quantity > 0.0).then(|| LedgerAction::Consume {
            item_id: item_id.to_string(),
            quantity,
        })
    }

    fn revert(item_id: &str, quantity: f64) -> Option<Self> {
        (quantity > 0.0).then(|| LedgerAction::Revert {
            item_id: item_id.to_string(),
            quantity,
        })
    }
}

/// Ledger actions for a newly created movement.
pub fn plan_create(movement: &MovementSnapshot) -> Vec<LedgerAction> {
    if !movement.consumes_stock {
        return Vec::new();
    }
    LedgerAction::consume(&movement.item_id, movement.quantity)
        .into_iter()
        .collect()
}

/// Ledger actions for a deleted movement (the exact undo of [`plan_create`]).
pub fn plan_delete(movement: &MovementSnapshot) -> Vec<LedgerAction> {
    if !movement.consumes_stock {
        return Vec::new();
    }
    LedgerAction::revert(&movement.item_id, movement.quantity)
        .into_iter()
        .collect()
}

/// Ledger actions for an edit, from the snapshots before and after the write.
///
/// An item swap is always revert-then-consume; two different item references
/// are never netted against each other.
pub fn plan_update(old: &MovementSnapshot, new: &MovementSnapshot) -> Vec<LedgerAction> {
    let actions = match (old.consumes_stock, new.consumes_stock) {
        (true, false) => vec![LedgerAction::revert(&old.item_id, old.quantity)],
        (false, true) => vec![LedgerAction::consume(&new.item_id, new.quantity)],
        (true, true) if old.item_id != new.item_id => vec![
            LedgerAction::revert(&old.item_id, old.quantity),
            LedgerAction::consume(&new.item_id, new.quantity),
        ],
        (true, true) => {
            let delta = new.quantity - old.quantity;
            if delta > 0.0 {
                vec![LedgerAction::consume(&new.item_id, delta)]
            } else {
                vec![LedgerAction::revert(&new.item_id, -delta)]
            }
        }
        (false, false) => Vec::new(),
    };
    actions.into_iter().flatten().collect()
}

/// Where the reconciler loads and saves items.
///
/// Implementations are expected to run inside the same transaction as the
/// movement write that triggered reconciliation.
pub trait ItemStore {
    type Error: From<StockError>;

    fn load_item(&mut self, item_id: &str) -> Result<StockItem, Self::Error>;

    fn save_item(&mut self, item: &StockItem) -> Result<(), Self::Error>;
}

impl<S: ItemStore + ?Sized> ItemStore for &mut S {
    type Error = S::Error;

    fn load_item(&mut self, item_id: &str) -> Result<StockItem, Self::Error> {
        (**self).load_item(item_id)
    }

    fn save_item(&mut self, item: &StockItem) -> Result<(), Self::Error> {
        (**self).save_item(item)
    }
}

/// Applies movement lifecycle events to an [`ItemStore`].
pub struct Reconciler<S: ItemStore> {
    store: S,
}

impl<S: ItemStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume `quantity` base units from an item and save it.
    pub fn consume(&mut self, item_id: &str, quantity: f64) -> Result<StockItem, S::Error> {
        let mut item = self.store.load_item(item_id)?;
        item.consume(quantity)?;
        item.validate()?;
        item.touch();
        self.store.save_item(&item)?;
        Ok(item)
    }

    /// Return `quantity` base units to an item and save it.
    pub fn revert(&mut self, item_id: &str, quantity: f64) -> Result<StockItem, S::Error> {
        let mut item = self.store.load_item(item_id)?;
        item.revert(quantity)?;
        item.validate()?;
        item.touch();
        self.store.save_item(&item)?;
        Ok(item)
    }

    pub fn apply(&mut self, movement_id: &str, actions: &[LedgerAction]) -> Result<(), S::Error> {
        for action in actions {
            match action {
                LedgerAction::Consume { item_id, quantity } => {
                    let item = self.consume(item_id, *quantity)?;
                    info!(
                        movement_id,
                        item_id = %item_id,
                        quantity,
                        remaining = item.total_base(),
                        "stock consumed"
                    );
                }
                LedgerAction::Revert { item_id, quantity } => {
                    let item = self.revert(item_id, *quantity)?;
                    info!(
                        movement_id,
                        item_id = %item_id,
                        quantity,
                        remaining = item.total_base(),
                        "stock returned"
                    );
                }
            }
        }
        Ok(())
    }

    pub fn on_create(&mut self, movement_id: &str, movement: &MovementSnapshot) -> Result<(), S::Error> {
        self.apply(movement_id, &plan_create(movement))
    }

    pub fn on_update(
        &mut self,
        movement_id: &str,
        old: &MovementSnapshot,
        new: &MovementSnapshot,
    ) -> Result<(), S::Error> {
        self.apply(movement_id, &plan_update(old, new))
    }

    pub fn on_delete(&mut self, movement_id: &str, movement: &MovementSnapshot) -> Result<(), S::Error> {
        self.apply(movement_id, &plan_delete(movement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemKind, StockLevels};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        items: HashMap<String, StockItem>,
    }

    impl MemoryStore {
        fn with(items: Vec<StockItem>) -> Self {
            Self {
                items: items.into_iter().map(|i| (i.item_id.clone(), i)).collect(),
            }
        }

        fn total(&self, item_id: &str) -> f64 {
            self.items[item_id].total_base()
        }
    }

    #[derive(Debug)]
    enum MemoryError {
        Missing,
        Stock(StockError),
    }

    impl From<StockError> for MemoryError {
        fn from(e: StockError) -> Self {
            MemoryError::Stock(e)
        }
    }

    impl ItemStore for MemoryStore {
        type Error = MemoryError;

        fn load_item(&mut self, item_id: &str) -> Result<StockItem, MemoryError> {
            self.items.get(item_id).cloned().ok_or(MemoryError::Missing)
        }

        fn save_item(&mut self, item: &StockItem) -> Result<(), MemoryError> {
            self.items.insert(item.item_id.clone(), item.clone());
            Ok(())
        }
    }

    fn snap(item: &str, quantity: f64, consumes: bool) -> MovementSnapshot {
        MovementSnapshot::new(item, quantity, consumes)
    }

    fn consume(item: &str, quantity: f64) -> LedgerAction {
        LedgerAction::Consume {
            item_id: item.into(),
            quantity,
        }
    }

    fn revert(item: &str, quantity: f64) -> LedgerAction {
        LedgerAction::Revert {
            item_id: item.into(),
            quantity,
        }
    }

    #[test]
    fn test_plan_create_and_delete() {
        assert_eq!(plan_create(&snap("a", 3.0, true)), vec![consume("a", 3.0)]);
        assert!(plan_create(&snap("a", 3.0, false)).is_empty());
        assert!(plan_create(&snap("a", 0.0, true)).is_empty());

        assert_eq!(plan_delete(&snap("a", 3.0, true)), vec![revert("a", 3.0)]);
        assert!(plan_delete(&snap("a", 3.0, false)).is_empty());
    }

    #[test]
    fn test_plan_update_toggle_off() {
        assert_eq!(
            plan_update(&snap("a", 4.0, true), &snap("a", 6.0, false)),
            vec![revert("a", 4.0)]
        );
    }

    #[test]
    fn test_plan_update_toggle_on() {
        assert_eq!(
            plan_update(&snap("a", 4.0, false), &snap("b", 6.0, true)),
            vec![consume("b", 6.0)]
        );
    }

    #[test]
    fn test_plan_update_item_swap_never_nets() {
        assert_eq!(
            plan_update(&snap("a", 4.0, true), &snap("b", 4.0, true)),
            vec![revert("a", 4.0), consume("b", 4.0)]
        );
    }

    #[test]
    fn test_plan_update_quantity_delta() {
        assert_eq!(
            plan_update(&snap("a", 2.0, true), &snap("a", 5.0, true)),
            vec![consume("a", 3.0)]
        );
        assert_eq!(
            plan_update(&snap("a", 5.0, true), &snap("a", 1.5, true)),
            vec![revert("a", 3.5)]
        );
        assert!(plan_update(&snap("a", 5.0, true), &snap("a", 5.0, true)).is_empty());
    }

    #[test]
    fn test_plan_update_not_consuming() {
        assert!(plan_update(&snap("a", 5.0, false), &snap("b", 9.0, false)).is_empty());
    }

    #[test]
    fn test_reconciler_swap_items() {
        let a = StockItem::new(ItemKind::Medicine, "A".into()).with_stock(0, 0, 10.0);
        let b = StockItem::new(ItemKind::Medicine, "B".into()).with_stock(0, 0, 10.0);
        let (a_id, b_id) = (a.item_id.clone(), b.item_id.clone());
        let mut store = MemoryStore::with(vec![a, b]);

        let mut reconciler = Reconciler::new(&mut store);
        reconciler.on_create("m1", &snap(&a_id, 4.0, true)).unwrap();
        reconciler
            .on_update("m1", &snap(&a_id, 4.0, true), &snap(&b_id, 4.0, true))
            .unwrap();

        assert_eq!(store.total(&a_id), 10.0);
        assert_eq!(store.total(&b_id), 6.0);
    }

    #[test]
    fn test_reconciler_failure_keeps_loaded_copy_unsaved() {
        let item = StockItem::new(ItemKind::Dewormer, "Fenbendazole".into()).with_stock(0, 0, 3.0);
        let item_id = item.item_id.clone();
        let mut store = MemoryStore::with(vec![item]);

        let result = Reconciler::new(&mut store).on_create("m1", &snap(&item_id, 5.0, true));

        assert!(matches!(
            result,
            Err(MemoryError::Stock(StockError::InsufficientStock { .. }))
        ));
        assert_eq!(store.items[&item_id].stock, StockLevels::new(0, 0, 3.0));
    }

    #[test]
    fn test_reconciler_missing_item() {
        let mut store = MemoryStore::default();
        let result = Reconciler::new(&mut store).on_delete("m1", &snap("ghost", 1.0, true));
        assert!(matches!(result, Err(MemoryError::Missing)));
    }
}
