//! Movement record database operations.
//!
//! Every write here runs in one immediate transaction together with the
//! ledger reconciliation it triggers: if the stock cannot be drawn down, the
//! record write is rolled back with it.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::items::{load_item, TxItemStore};
use super::{constraint_context, Database, DbError, DbResult};
use crate::models::{MovementKind, MovementRecord, Route};
use crate::stock::{validate_movement_quantity, Reconciler};

const MOVEMENT_COLUMNS: &str = r#"
    movement_id, kind, item_id, quantity, consumes_stock, animal_id,
    surgery_record_id, date, route, doctor, next_date, lot_number,
    lot_expiration, notes, created_at, updated_at
"#;

impl Database {
    /// Insert a new movement and draw down stock if it consumes.
    pub fn create_movement(&mut self, movement: &MovementRecord) -> DbResult<()> {
        validate_movement_quantity(movement.quantity)?;
        let tx = self.transaction()?;
        check_item_kind(&tx, movement)?;
        insert_movement(&tx, movement)?;
        Reconciler::new(TxItemStore::new(&tx))
            .on_create(&movement.movement_id, &movement.snapshot())?;
        tx.commit()?;
        info!(
            movement_id = %movement.movement_id,
            kind = movement.kind.as_str(),
            "movement recorded"
        );
        Ok(())
    }

    /// Save an edited movement and reconcile stock against its previous state.
    pub fn update_movement(&mut self, movement: &MovementRecord) -> DbResult<()> {
        self.update_movements(std::slice::from_ref(movement))
    }

    /// Save a batch of edited movements in one transaction.
    ///
    /// All pre-update snapshots are read before any record is written, and each
    /// record is reconciled only against its own snapshot.
    pub fn update_movements(&mut self, movements: &[MovementRecord]) -> DbResult<()> {
        let mut seen = HashSet::new();
        for movement in movements {
            validate_movement_quantity(movement.quantity)?;
            if !seen.insert(movement.movement_id.as_str()) {
                return Err(DbError::Constraint(format!(
                    "movement {} appears twice in one batch",
                    movement.movement_id
                )));
            }
        }

        let tx = self.transaction()?;

        let mut snapshots = Vec::with_capacity(movements.len());
        for movement in movements {
            let stored = fetch_movement(&tx, &movement.movement_id)?
                .ok_or_else(|| DbError::NotFound(format!("movement {}", movement.movement_id)))?;
            if stored.kind != movement.kind {
                return Err(DbError::Constraint(format!(
                    "movement {} cannot change kind from {} to {}",
                    movement.movement_id,
                    stored.kind.as_str(),
                    movement.kind.as_str()
                )));
            }
            snapshots.push(stored.snapshot());
        }

        for movement in movements {
            check_item_kind(&tx, movement)?;
            write_movement(&tx, movement)?;
        }

        let mut reconciler = Reconciler::new(TxItemStore::new(&tx));
        for (movement, old) in movements.iter().zip(&snapshots) {
            reconciler.on_update(&movement.movement_id, old, &movement.snapshot())?;
        }

        tx.commit()?;
        info!(count = movements.len(), "movements updated");
        Ok(())
    }

    /// Delete a movement and return its consumed stock.
    pub fn delete_movement(&mut self, movement_id: &str) -> DbResult<bool> {
        let deleted = self.delete_movements_where("movement_id = ?1", movement_id)?;
        Ok(deleted > 0)
    }

    /// Delete every line of a surgery record (the surgery itself was removed).
    pub fn delete_movements_for_surgery(&mut self, surgery_record_id: &str) -> DbResult<usize> {
        self.delete_movements_where("surgery_record_id = ?1", surgery_record_id)
    }

    /// Delete every movement of an animal (the animal itself was removed).
    pub fn delete_movements_for_animal(&mut self, animal_id: &str) -> DbResult<usize> {
        self.delete_movements_where("animal_id = ?1", animal_id)
    }

    fn delete_movements_where(&mut self, predicate: &str, value: &str) -> DbResult<usize> {
        let tx = self.transaction()?;
        let doomed = select_movements(&tx, predicate, value)?;

        let mut reconciler = Reconciler::new(TxItemStore::new(&tx));
        for movement in &doomed {
            reconciler.on_delete(&movement.movement_id, &movement.snapshot())?;
        }

        let sql = format!("DELETE FROM stock_movements WHERE {}", predicate);
        let deleted = tx.execute(&sql, [value])?;
        tx.commit()?;
        if deleted > 0 {
            info!(deleted, "movements deleted");
        }
        Ok(deleted)
    }

    /// Get a movement by ID.
    pub fn get_movement(&self, movement_id: &str) -> DbResult<Option<MovementRecord>> {
        fetch_movement(&self.conn, movement_id)
    }

    /// Movements drawing on an item, most recent first.
    pub fn list_movements_for_item(&self, item_id: &str) -> DbResult<Vec<MovementRecord>> {
        select_movements(&self.conn, "item_id = ?1", item_id)
    }

    /// Movements of an animal, most recent first.
    pub fn list_movements_for_animal(&self, animal_id: &str) -> DbResult<Vec<MovementRecord>> {
        select_movements(&self.conn, "animal_id = ?1", animal_id)
    }

    /// Lines of a surgery record, most recent first.
    pub fn list_movements_for_surgery(&self, surgery_record_id: &str) -> DbResult<Vec<MovementRecord>> {
        select_movements(&self.conn, "surgery_record_id = ?1", surgery_record_id)
    }
}

/// The referenced item must exist and be of a kind this movement may draw from.
fn check_item_kind(conn: &Connection, movement: &MovementRecord) -> DbResult<()> {
    let item = load_item(conn, &movement.item_id)?;
    if !movement.kind.accepts(item.kind) {
        return Err(DbError::Constraint(format!(
            "a {} cannot reference {} '{}'",
            movement.kind.as_str(),
            item.kind.as_str(),
            item.name
        )));
    }
    Ok(())
}

fn insert_movement(conn: &Connection, movement: &MovementRecord) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO stock_movements (
            movement_id, kind, item_id, quantity, consumes_stock, animal_id,
            surgery_record_id, date, route, doctor, next_date, lot_number,
            lot_expiration, notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
        params![
            movement.movement_id,
            movement.kind.as_str(),
            movement.item_id,
            movement.quantity,
            movement.consumes_stock,
            movement.animal_id,
            movement.surgery_record_id,
            movement.date,
            movement.route.map(|r| r.as_str()),
            movement.doctor,
            movement.next_date,
            movement.lot_number,
            movement.lot_expiration,
            movement.notes,
            movement.created_at,
            movement.updated_at,
        ],
    )
    .map_err(|e| constraint_context(e, "cannot record movement"))?;
    Ok(())
}

fn write_movement(conn: &Connection, movement: &MovementRecord) -> DbResult<()> {
    conn.execute(
        r#"
        UPDATE stock_movements SET
            item_id = ?2,
            quantity = ?3,
            consumes_stock = ?4,
            animal_id = ?5,
            surgery_record_id = ?6,
            date = ?7,
            route = ?8,
            doctor = ?9,
            next_date = ?10,
            lot_number = ?11,
            lot_expiration = ?12,
            notes = ?13,
            updated_at = ?14
        WHERE movement_id = ?1
        "#,
        params![
            movement.movement_id,
            movement.item_id,
            movement.quantity,
            movement.consumes_stock,
            movement.animal_id,
            movement.surgery_record_id,
            movement.date,
            movement.route.map(|r| r.as_str()),
            movement.doctor,
            movement.next_date,
            movement.lot_number,
            movement.lot_expiration,
            movement.notes,
            chrono::Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| constraint_context(e, "cannot update movement"))?;
    Ok(())
}

fn fetch_movement(conn: &Connection, movement_id: &str) -> DbResult<Option<MovementRecord>> {
    let sql = format!(
        "SELECT {} FROM stock_movements WHERE movement_id = ?",
        MOVEMENT_COLUMNS
    );
    conn.query_row(&sql, [movement_id], |row| MovementRow::from_row(row))
        .optional()?
        .map(|row| row.try_into())
        .transpose()
}

fn select_movements(conn: &Connection, predicate: &str, value: &str) -> DbResult<Vec<MovementRecord>> {
    let sql = format!(
        "SELECT {} FROM stock_movements WHERE {} ORDER BY date DESC, created_at DESC",
        MOVEMENT_COLUMNS, predicate
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([value], |row| MovementRow::from_row(row))?;

    let mut movements = Vec::new();
    for row in rows {
        movements.push(row?.try_into()?);
    }
    Ok(movements)
}

/// Intermediate row struct for database mapping.
struct MovementRow {
    movement_id: String,
    kind: String,
    item_id: String,
    quantity: f64,
    consumes_stock: bool,
    animal_id: Option<String>,
    surgery_record_id: Option<String>,
    date: String,
    route: Option<String>,
    doctor: Option<String>,
    next_date: Option<String>,
    lot_number: Option<String>,
    lot_expiration: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl MovementRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            movement_id: row.get(0)?,
            kind: row.get(1)?,
            item_id: row.get(2)?,
            quantity: row.get(3)?,
            consumes_stock: row.get(4)?,
            animal_id: row.get(5)?,
            surgery_record_id: row.get(6)?,
            date: row.get(7)?,
            route: row.get(8)?,
            doctor: row.get(9)?,
            next_date: row.get(10)?,
            lot_number: row.get(11)?,
            lot_expiration: row.get(12)?,
            notes: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

impl TryFrom<MovementRow> for MovementRecord {
    type Error = DbError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind = MovementKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("unknown movement kind '{}'", row.kind)))?;
        let route = row
            .route
            .map(|r| {
                Route::parse(&r).ok_or_else(|| DbError::Constraint(format!("unknown route '{}'", r)))
            })
            .transpose()?;
        Ok(MovementRecord {
            movement_id: row.movement_id,
            kind,
            item_id: row.item_id,
            quantity: row.quantity,
            consumes_stock: row.consumes_stock,
            animal_id: row.animal_id,
            surgery_record_id: row.surgery_record_id,
            date: row.date,
            route,
            doctor: row.doctor,
            next_date: row.next_date,
            lot_number: row.lot_number,
            lot_expiration: row.lot_expiration,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemKind, StockItem, StockLevels};
    use crate::stock::StockError;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn stocked(db: &Database, kind: ItemKind, name: &str, base: f64) -> StockItem {
        let item = StockItem::new(kind, name.into()).with_stock(0, 0, base);
        db.insert_item(&item).unwrap();
        item
    }

    #[test]
    fn test_create_and_get() {
        let mut db = setup_db();
        let vaccine = stocked(&db, ItemKind::Vaccine, "Rabies", 10.0);

        let mut movement = MovementRecord::new(MovementKind::Vaccination, vaccine.item_id.clone(), 1.0)
            .for_animal("animal-1");
        movement.route = Some(Route::Subcutaneous);
        movement.lot_number = Some("L-2291".into());
        movement.next_date = Some("2025-03-01".into());
        db.create_movement(&movement).unwrap();

        let retrieved = db.get_movement(&movement.movement_id).unwrap().unwrap();
        assert_eq!(retrieved, movement);
        assert_eq!(db.total_base(&vaccine.item_id).unwrap(), 9.0);
    }

    #[test]
    fn test_create_without_stock_leaves_ledger() {
        let mut db = setup_db();
        let medicine = stocked(&db, ItemKind::Medicine, "Cefalexin", 10.0);

        let movement =
            MovementRecord::new(MovementKind::Medication, medicine.item_id.clone(), 4.0).without_stock();
        db.create_movement(&movement).unwrap();

        assert_eq!(db.total_base(&medicine.item_id).unwrap(), 10.0);
    }

    #[test]
    fn test_create_rejects_wrong_item_kind() {
        let mut db = setup_db();
        let dewormer = stocked(&db, ItemKind::Dewormer, "Pyrantel", 10.0);

        let movement = MovementRecord::new(MovementKind::Vaccination, dewormer.item_id.clone(), 1.0);
        let result = db.create_movement(&movement);

        assert!(matches!(result, Err(DbError::Constraint(_))));
        assert!(db.get_movement(&movement.movement_id).unwrap().is_none());
    }

    #[test]
    fn test_create_rejects_unknown_item() {
        let mut db = setup_db();

        let movement = MovementRecord::new(MovementKind::Medication, "missing".into(), 1.0);
        assert!(matches!(db.create_movement(&movement), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_create_rejects_negative_quantity() {
        let mut db = setup_db();
        let medicine = stocked(&db, ItemKind::Medicine, "Cefalexin", 10.0);

        let movement = MovementRecord::new(MovementKind::Medication, medicine.item_id.clone(), -2.0);
        assert!(matches!(
            db.create_movement(&movement),
            Err(DbError::Stock(StockError::InvalidQuantity(_)))
        ));
    }

    #[test]
    fn test_surgery_line_accepts_consumables() {
        let mut db = setup_db();
        let gauze = stocked(&db, ItemKind::SurgeryConsumable, "Gauze", 50.0);

        let line = MovementRecord::new(MovementKind::SurgeryMedicationLine, gauze.item_id.clone(), 6.0)
            .for_surgery("surgery-1");
        db.create_movement(&line).unwrap();

        assert_eq!(db.total_base(&gauze.item_id).unwrap(), 44.0);
        assert_eq!(db.list_movements_for_surgery("surgery-1").unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_vaccination_is_constraint_error() {
        let mut db = setup_db();
        let vaccine = stocked(&db, ItemKind::Vaccine, "Leptospirosis", 10.0);

        let mut first = MovementRecord::new(MovementKind::Vaccination, vaccine.item_id.clone(), 1.0)
            .for_animal("animal-1");
        first.date = "2024-05-02".into();
        let mut second = first.clone();
        second.movement_id = "other".into();

        db.create_movement(&first).unwrap();
        assert!(matches!(db.create_movement(&second), Err(DbError::Constraint(_))));
        assert_eq!(db.total_base(&vaccine.item_id).unwrap(), 9.0);
    }

    #[test]
    fn test_update_cannot_change_kind() {
        let mut db = setup_db();
        let medicine = stocked(&db, ItemKind::Medicine, "Carprofen", 10.0);

        let mut movement = MovementRecord::new(MovementKind::Medication, medicine.item_id.clone(), 1.0);
        db.create_movement(&movement).unwrap();

        movement.kind = MovementKind::SurgeryMedicationLine;
        assert!(matches!(db.update_movement(&movement), Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_update_missing_movement() {
        let mut db = setup_db();
        let medicine = stocked(&db, ItemKind::Medicine, "Carprofen", 10.0);

        let movement = MovementRecord::new(MovementKind::Medication, medicine.item_id.clone(), 1.0);
        assert!(matches!(db.update_movement(&movement), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_batch_rejects_duplicate_ids() {
        let mut db = setup_db();
        let medicine = stocked(&db, ItemKind::Medicine, "Carprofen", 10.0);

        let movement = MovementRecord::new(MovementKind::Medication, medicine.item_id.clone(), 1.0);
        db.create_movement(&movement).unwrap();

        let result = db.update_movements(&[movement.clone(), movement.clone()]);
        assert!(matches!(result, Err(DbError::Constraint(_))));
        assert_eq!(db.total_base(&medicine.item_id).unwrap(), 9.0);
    }

    #[test]
    fn test_delete_for_animal_reverts_each() {
        let mut db = setup_db();
        let medicine = stocked(&db, ItemKind::Medicine, "Gabapentin", 20.0);
        let dewormer = stocked(&db, ItemKind::Dewormer, "Fenbendazole", 5.0);

        db.create_movement(
            &MovementRecord::new(MovementKind::Medication, medicine.item_id.clone(), 3.0)
                .for_animal("animal-1"),
        )
        .unwrap();
        db.create_movement(
            &MovementRecord::new(MovementKind::Deworming, dewormer.item_id.clone(), 2.0)
                .for_animal("animal-1"),
        )
        .unwrap();
        db.create_movement(
            &MovementRecord::new(MovementKind::Medication, medicine.item_id.clone(), 1.0)
                .for_animal("animal-2"),
        )
        .unwrap();

        assert_eq!(db.list_movements_for_animal("animal-1").unwrap().len(), 2);
        assert_eq!(db.delete_movements_for_animal("animal-1").unwrap(), 2);

        assert_eq!(db.total_base(&medicine.item_id).unwrap(), 19.0);
        assert_eq!(db.total_base(&dewormer.item_id).unwrap(), 5.0);
        assert_eq!(db.list_movements_for_item(&medicine.item_id).unwrap().len(), 1);
        let item = db.get_item(&dewormer.item_id).unwrap().unwrap();
        assert_eq!(item.stock, StockLevels::new(0, 0, 5.0));
    }

    #[test]
    fn test_updates_keep_rfc3339_timestamps() {
        let mut db = setup_db();
        let medicine = stocked(&db, ItemKind::Medicine, "Metronidazole", 10.0);

        let mut movement = MovementRecord::new(MovementKind::Medication, medicine.item_id.clone(), 1.0);
        db.create_movement(&movement).unwrap();
        movement.quantity = 2.0;
        db.update_movement(&movement).unwrap();

        let stored = db.get_movement(&movement.movement_id).unwrap().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&stored.updated_at).is_ok());
        assert_eq!(stored.created_at, movement.created_at);

        let item = db.get_item(&medicine.item_id).unwrap().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&item.updated_at).is_ok());
        assert_eq!(item.total_base(), 8.0);
    }

    #[test]
    fn test_delete_missing_movement() {
        let mut db = setup_db();
        assert!(!db.delete_movement("nope").unwrap());
    }
}
