//! Concurrent writers against one database file.

use std::thread;

use vet_stock_core::db::Database;
use vet_stock_core::models::{ItemKind, MovementKind, MovementRecord, StockItem};

const PER_WRITER: usize = 25;

#[test]
fn test_concurrent_consumption_is_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");

    let item = StockItem::new(ItemKind::Medicine, "Buprenorphine".to_string())
        .with_packaging(10, 5.0)
        .with_stock(2, 0, 0.0);
    let item_id = item.item_id.clone();
    Database::open(&path).unwrap().insert_item(&item).unwrap();

    let writers: Vec<_> = (0..2)
        .map(|n| {
            let mut db = Database::open(&path).unwrap();
            let item_id = item_id.clone();
            thread::spawn(move || {
                for _ in 0..PER_WRITER {
                    let record = MovementRecord::new(MovementKind::Medication, item_id.clone(), 1.5)
                        .for_animal(format!("animal-{}", n));
                    db.create_movement(&record).unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }

    let db = Database::open(&path).unwrap();
    let consumed = 2.0 * PER_WRITER as f64 * 1.5;
    let total = db.total_base(&item_id).unwrap();
    assert!((total - (100.0 - consumed)).abs() < 1e-9, "total {}", total);
    assert_eq!(db.list_movements_for_item(&item_id).unwrap().len(), 2 * PER_WRITER);

    let stock = db.get_item(&item_id).unwrap().unwrap().stock;
    assert!(stock.tier1 >= 0 && stock.tier2 >= 0 && stock.base >= 0.0);
}

#[test]
fn test_last_units_go_to_exactly_one_writer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");

    let item = StockItem::new(ItemKind::Vaccine, "Rabies".to_string()).with_stock(0, 1, 0.0);
    let item_id = item.item_id.clone();
    Database::open(&path).unwrap().insert_item(&item).unwrap();

    let writers: Vec<_> = (0..2)
        .map(|n| {
            let mut db = Database::open(&path).unwrap();
            let item_id = item_id.clone();
            thread::spawn(move || {
                let record = MovementRecord::new(MovementKind::Vaccination, item_id, 1.0)
                    .for_animal(format!("animal-{}", n));
                db.create_movement(&record).is_ok()
            })
        })
        .collect();

    let succeeded = writers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(succeeded, 1);
    let db = Database::open(&path).unwrap();
    assert_eq!(db.total_base(&item_id).unwrap(), 0.0);
}
