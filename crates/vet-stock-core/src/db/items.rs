//! Stock item database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{constraint_context, Database, DbError, DbResult};
use crate::models::{ItemKind, Packaging, StockItem, StockLevels};
use crate::stock::{ItemStore, StockError};

const ITEM_COLUMNS: &str = r#"
    item_id, kind, name, description, packaging_notes,
    tier2_per_tier1, base_per_tier2, stock_tier1, stock_tier2, stock_base,
    created_at, updated_at
"#;

impl Database {
    /// Insert a new stock item.
    pub fn insert_item(&self, item: &StockItem) -> DbResult<()> {
        item.validate()?;
        self.conn
            .execute(
                r#"
                INSERT INTO stock_items (
                    item_id, kind, name, description, packaging_notes,
                    tier2_per_tier1, base_per_tier2, stock_tier1, stock_tier2, stock_base,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    item.item_id,
                    item.kind.as_str(),
                    item.name,
                    item.description,
                    item.packaging_notes,
                    item.packaging.tier2_per_tier1,
                    item.packaging.base_per_tier2,
                    item.stock.tier1,
                    item.stock.tier2,
                    item.stock.base,
                    item.created_at,
                    item.updated_at,
                ],
            )
            .map_err(|e| constraint_context(e, "cannot insert stock item"))?;
        info!(item_id = %item.item_id, kind = item.kind.as_str(), name = %item.name, "stock item created");
        Ok(())
    }

    /// Update an item's details, packaging and stock counts (inventory edit).
    ///
    /// The kind is fixed at creation and is not changed here.
    pub fn update_item(&mut self, item: &StockItem) -> DbResult<bool> {
        item.validate()?;
        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE stock_items SET
                    name = ?2,
                    description = ?3,
                    packaging_notes = ?4,
                    tier2_per_tier1 = ?5,
                    base_per_tier2 = ?6,
                    stock_tier1 = ?7,
                    stock_tier2 = ?8,
                    stock_base = ?9,
                    updated_at = ?10
                WHERE item_id = ?1
                "#,
                params![
                    item.item_id,
                    item.name,
                    item.description,
                    item.packaging_notes,
                    item.packaging.tier2_per_tier1,
                    item.packaging.base_per_tier2,
                    item.stock.tier1,
                    item.stock.tier2,
                    item.stock.base,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| constraint_context(e, "cannot update stock item"))?;
        Ok(rows_affected > 0)
    }

    /// Get an item by ID.
    pub fn get_item(&self, item_id: &str) -> DbResult<Option<StockItem>> {
        fetch_item(&self.conn, item_id)
    }

    /// List items, optionally restricted to one kind, ordered by name.
    pub fn list_items(&self, kind: Option<ItemKind>) -> DbResult<Vec<StockItem>> {
        let sql = format!(
            "SELECT {} FROM stock_items WHERE (?1 IS NULL OR kind = ?1) ORDER BY name",
            ITEM_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([kind.map(|k| k.as_str())], |row| ItemRow::from_row(row))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.try_into()?);
        }
        Ok(items)
    }

    /// Persisted total in base units, as computed by the database.
    pub fn total_base(&self, item_id: &str) -> DbResult<f64> {
        self.conn
            .query_row(
                "SELECT stock_total_base FROM stock_items WHERE item_id = ?",
                [item_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("stock item {}", item_id)))
    }

    /// Replace the stock counts after a physical inventory count.
    pub fn set_stock_levels(&mut self, item_id: &str, levels: StockLevels) -> DbResult<StockItem> {
        let tx = self.transaction()?;
        let mut item = load_item(&tx, item_id)?;
        item.stock = levels;
        item.validate()?;
        item.touch();
        write_stock(&tx, &item)?;
        tx.commit()?;
        info!(item_id, total = item.total_base(), "stock levels set");
        Ok(item)
    }

    /// Add delivered boxes, packs/vials and loose units to stock.
    pub fn receive_stock(&mut self, item_id: &str, received: StockLevels) -> DbResult<StockItem> {
        crate::stock::validate_levels(item_id, &received)?;
        let tx = self.transaction()?;
        let mut item = load_item(&tx, item_id)?;
        let overflow = |field| StockError::CountOverflow {
            item: item_id.to_string(),
            field,
        };
        item.stock.tier1 = item
            .stock
            .tier1
            .checked_add(received.tier1)
            .ok_or_else(|| overflow("stock_tier1"))?;
        item.stock.tier2 = item
            .stock
            .tier2
            .checked_add(received.tier2)
            .ok_or_else(|| overflow("stock_tier2"))?;
        item.stock.base += received.base;
        item.touch();
        item.validate()?;
        write_stock(&tx, &item)?;
        tx.commit()?;
        info!(item_id, total = item.total_base(), "stock received");
        Ok(item)
    }

    /// Delete an item. Fails while any movement record references it.
    pub fn delete_item(&mut self, item_id: &str) -> DbResult<bool> {
        let tx = self.transaction()?;
        let references: i64 = tx.query_row(
            "SELECT COUNT(*) FROM stock_movements WHERE item_id = ?",
            [item_id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(DbError::Constraint(format!(
                "stock item {} is referenced by {} movement record(s)",
                item_id, references
            )));
        }
        let rows_affected = tx.execute("DELETE FROM stock_items WHERE item_id = ?", [item_id])?;
        tx.commit()?;
        Ok(rows_affected > 0)
    }
}

pub(crate) fn fetch_item(conn: &Connection, item_id: &str) -> DbResult<Option<StockItem>> {
    let sql = format!("SELECT {} FROM stock_items WHERE item_id = ?", ITEM_COLUMNS);
    conn.query_row(&sql, [item_id], |row| ItemRow::from_row(row))
        .optional()?
        .map(|row| row.try_into())
        .transpose()
}

pub(crate) fn load_item(conn: &Connection, item_id: &str) -> DbResult<StockItem> {
    fetch_item(conn, item_id)?.ok_or_else(|| DbError::NotFound(format!("stock item {}", item_id)))
}

/// Write back the five ledger fields and `updated_at`; `stock_total_base` follows by generation.
pub(crate) fn write_stock(conn: &Connection, item: &StockItem) -> DbResult<()> {
    let rows_affected = conn
        .execute(
            r#"
            UPDATE stock_items SET
                tier2_per_tier1 = ?2,
                base_per_tier2 = ?3,
                stock_tier1 = ?4,
                stock_tier2 = ?5,
                stock_base = ?6,
                updated_at = ?7
            WHERE item_id = ?1
            "#,
            params![
                item.item_id,
                item.packaging.tier2_per_tier1,
                item.packaging.base_per_tier2,
                item.stock.tier1,
                item.stock.tier2,
                item.stock.base,
                item.updated_at,
            ],
        )
        .map_err(|e| constraint_context(e, "cannot write stock levels"))?;
    if rows_affected == 0 {
        return Err(DbError::NotFound(format!("stock item {}", item.item_id)));
    }
    Ok(())
}

/// [`ItemStore`] over a connection that is inside an open transaction.
pub(crate) struct TxItemStore<'c> {
    conn: &'c Connection,
}

impl<'c> TxItemStore<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl ItemStore for TxItemStore<'_> {
    type Error = DbError;

    fn load_item(&mut self, item_id: &str) -> DbResult<StockItem> {
        load_item(self.conn, item_id)
    }

    fn save_item(&mut self, item: &StockItem) -> DbResult<()> {
        write_stock(self.conn, item)
    }
}

/// Intermediate row struct for database mapping.
struct ItemRow {
    item_id: String,
    kind: String,
    name: String,
    description: Option<String>,
    packaging_notes: Option<String>,
    tier2_per_tier1: i64,
    base_per_tier2: f64,
    stock_tier1: i64,
    stock_tier2: i64,
    stock_base: f64,
    created_at: String,
    updated_at: String,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            item_id: row.get(0)?,
            kind: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            packaging_notes: row.get(4)?,
            tier2_per_tier1: row.get(5)?,
            base_per_tier2: row.get(6)?,
            stock_tier1: row.get(7)?,
            stock_tier2: row.get(8)?,
            stock_base: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl TryFrom<ItemRow> for StockItem {
    type Error = DbError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let kind = ItemKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("unknown item kind '{}'", row.kind)))?;
        Ok(StockItem {
            item_id: row.item_id,
            kind,
            name: row.name,
            description: row.description,
            packaging_notes: row.packaging_notes,
            packaging: Packaging {
                tier2_per_tier1: row.tier2_per_tier1,
                base_per_tier2: row.base_per_tier2,
            },
            stock: StockLevels {
                tier1: row.stock_tier1,
                tier2: row.stock_tier2,
                base: row.stock_base,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
