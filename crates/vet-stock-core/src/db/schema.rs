//! SQLite schema definition.

/// Complete database schema for vet-stock.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Stock Items (medicines, vaccines, dewormers, surgery consumables)
-- ============================================================================

CREATE TABLE IF NOT EXISTS stock_items (
    item_id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK (kind IN ('medicine', 'vaccine', 'dewormer', 'surgery_consumable')),
    name TEXT NOT NULL,
    description TEXT,
    packaging_notes TEXT,
    tier2_per_tier1 INTEGER NOT NULL DEFAULT 1 CHECK (tier2_per_tier1 >= 0),   -- packs/vials per box
    base_per_tier2 REAL NOT NULL DEFAULT 1.0 CHECK (base_per_tier2 >= 0),      -- units/doses per pack/vial
    stock_tier1 INTEGER NOT NULL DEFAULT 0 CHECK (stock_tier1 >= 0),           -- sealed boxes
    stock_tier2 INTEGER NOT NULL DEFAULT 0 CHECK (stock_tier2 >= 0),           -- loose packs/vials
    stock_base REAL NOT NULL DEFAULT 0 CHECK (stock_base >= 0),                -- loose units/doses
    stock_total_base REAL GENERATED ALWAYS AS (
        stock_tier1 * tier2_per_tier1 * base_per_tier2
        + stock_tier2 * base_per_tier2
        + stock_base
    ) STORED,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_stock_items_kind ON stock_items(kind);
CREATE INDEX IF NOT EXISTS idx_stock_items_name ON stock_items(name);

-- ============================================================================
-- Stock Movements (medications, vaccinations, dewormings, surgery lines)
-- ============================================================================

CREATE TABLE IF NOT EXISTS stock_movements (
    movement_id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK (kind IN ('medication', 'vaccination', 'deworming', 'surgery_medication_line')),
    item_id TEXT NOT NULL REFERENCES stock_items(item_id) ON DELETE RESTRICT,
    quantity REAL NOT NULL DEFAULT 1.0 CHECK (quantity >= 0),
    consumes_stock INTEGER NOT NULL DEFAULT 1,
    animal_id TEXT,                              -- owned by patient records
    surgery_record_id TEXT,                      -- surgery lines only
    date TEXT NOT NULL,
    route TEXT CHECK (route IN ('sc', 'im', 'iv', 'oral', 'intranasal', 'topical', 'other')),
    doctor TEXT,
    next_date TEXT,
    lot_number TEXT,                             -- descriptive only, not consumed by lot
    lot_expiration TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_movements_item ON stock_movements(item_id);
CREATE INDEX IF NOT EXISTS idx_movements_animal ON stock_movements(animal_id);
CREATE INDEX IF NOT EXISTS idx_movements_surgery ON stock_movements(surgery_record_id);

-- One vaccination per animal, vaccine and date
CREATE UNIQUE INDEX IF NOT EXISTS idx_vaccination_unique
ON stock_movements(animal_id, item_id, date)
WHERE kind = 'vaccination';
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_total_is_generated() {
        let conn = setup();

        conn.execute(
            r#"INSERT INTO stock_items (item_id, kind, name, tier2_per_tier1, base_per_tier2,
                                        stock_tier1, stock_tier2, stock_base)
               VALUES ('i1', 'medicine', 'Amoxicillin', 10, 5.0, 2, 3, 1.5)"#,
            [],
        )
        .unwrap();

        let total: f64 = conn
            .query_row("SELECT stock_total_base FROM stock_items WHERE item_id = 'i1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(total, 116.5);

        conn.execute("UPDATE stock_items SET stock_tier1 = 0 WHERE item_id = 'i1'", [])
            .unwrap();
        let total: f64 = conn
            .query_row("SELECT stock_total_base FROM stock_items WHERE item_id = 'i1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(total, 16.5);
    }

    #[test]
    fn test_negative_stock_rejected() {
        let conn = setup();

        let result = conn.execute(
            "INSERT INTO stock_items (item_id, kind, name, stock_base) VALUES ('i1', 'vaccine', 'Rabies', -1)",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO stock_items (item_id, kind, name, stock_tier2) VALUES ('i2', 'vaccine', 'Rabies', -1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_item_delete_restricted() {
        let conn = setup();

        conn.execute(
            "INSERT INTO stock_items (item_id, kind, name) VALUES ('i1', 'dewormer', 'Praziquantel')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO stock_movements (movement_id, kind, item_id, quantity, date) VALUES ('m1', 'deworming', 'i1', 1, '2024-01-01')",
            [],
        )
        .unwrap();

        let result = conn.execute("DELETE FROM stock_items WHERE item_id = 'i1'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_vaccination_unique_per_day() {
        let conn = setup();

        conn.execute(
            "INSERT INTO stock_items (item_id, kind, name) VALUES ('v1', 'vaccine', 'Rabies')",
            [],
        )
        .unwrap();
        let insert = |id: &str| {
            conn.execute(
                "INSERT INTO stock_movements (movement_id, kind, item_id, animal_id, date) VALUES (?1, 'vaccination', 'v1', 'a1', '2024-03-01')",
                [id],
            )
        };

        assert!(insert("m1").is_ok());
        assert!(insert("m2").is_err());
    }
}
