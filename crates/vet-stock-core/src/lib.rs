//! Vet-Stock Core Library
//!
//! Inventory ledger for a veterinary clinic: medicines, vaccines, dewormers
//! and surgery consumables held in three packaging tiers, drawn down by the
//! clinical records that use them.
//!
//! # Architecture
//!
//! ```text
//!   Medication / Vaccination / Deworming / Surgery line
//!                         │ create · update · delete
//!                         ▼
//!              ┌─────────────────────┐
//!              │   Reconciler        │  old/new snapshots → ledger actions
//!              └──────────┬──────────┘
//!                         │ consume · revert
//!                         ▼
//!              ┌─────────────────────┐
//!              │   Stock ledger      │  box → pack/vial → unit/dose
//!              └──────────┬──────────┘
//!                         │ same IMMEDIATE transaction
//!                         ▼
//!                      SQLite
//! ```
//!
//! # Core Principle
//!
//! **Stock on hand equals receipts minus every active consuming record.** A
//! record write and its stock change commit together or not at all.
//!
//! # Modules
//!
//! - [`models`]: Domain types (StockItem, MovementRecord, etc.)
//! - [`stock`]: Fractioning ledger, guards and reconciliation
//! - [`db`]: SQLite persistence
//! - [`config`]: Environment configuration
//! - [`logging`]: Tracing subscriber setup

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod stock;

// Re-export commonly used types
pub use config::EngineConfig;
pub use db::{Database, DbError};
pub use models::{
    ItemKind, MovementKind, MovementRecord, MovementSnapshot, Packaging, PackagingLabels, Route,
    StockItem, StockLevels,
};
pub use stock::{LedgerAction, Reconciler, StockError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum VetStockError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid stock: {0}")]
    InvalidStock(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StockError> for VetStockError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::InsufficientStock { .. }
            | StockError::InsufficientPacks { .. }
            | StockError::InsufficientBoxes { .. } => VetStockError::InsufficientStock(e.to_string()),
            StockError::InvalidQuantity(_) | StockError::CountOverflow { .. } => {
                VetStockError::InvalidInput(e.to_string())
            }
            StockError::InvalidPackagingConfig { .. }
            | StockError::NegativeStock { .. }
            | StockError::StockFractioningExhausted { .. } => VetStockError::InvalidStock(e.to_string()),
        }
    }
}

impl From<DbError> for VetStockError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Stock(stock) => stock.into(),
            DbError::NotFound(what) => VetStockError::NotFound(what),
            DbError::Constraint(reason) => VetStockError::InvalidInput(reason),
            DbError::Sqlite(_) => VetStockError::DatabaseError(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for VetStockError {
    fn from(e: serde_json::Error) -> Self {
        VetStockError::SerializationError(e.to_string())
    }
}

impl From<anyhow::Error> for VetStockError {
    fn from(e: anyhow::Error) -> Self {
        VetStockError::InvalidInput(format!("{:#}", e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for VetStockError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        VetStockError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<VetStockCore>, VetStockError> {
    let db = Database::open(&path)?;
    Ok(VetStockCore::wrap(db))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<VetStockCore>, VetStockError> {
    let db = Database::open_in_memory()?;
    Ok(VetStockCore::wrap(db))
}

/// Open the database named by `VET_STOCK_DB_PATH` with the configured busy timeout.
#[uniffi::export]
pub fn open_database_from_env() -> Result<Arc<VetStockCore>, VetStockError> {
    let config = EngineConfig::from_env()?;
    let db = Database::open_with_config(&config)?;
    Ok(VetStockCore::wrap(db))
}

/// Install the tracing subscriber using the environment configuration.
#[uniffi::export]
pub fn init_logging() -> Result<(), VetStockError> {
    let config = EngineConfig::from_env()?;
    logging::init(&config);
    Ok(())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct VetStockCore {
    db: Arc<Mutex<Database>>,
}

impl VetStockCore {
    fn wrap(db: Database) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

#[uniffi::export]
impl VetStockCore {
    // =========================================================================
    // Item Operations
    // =========================================================================

    /// Register a new item with empty stock.
    pub fn create_item(
        &self,
        kind: String,
        name: String,
        tier2_per_tier1: i64,
        base_per_tier2: f64,
    ) -> Result<FfiStockItem, VetStockError> {
        let kind = parse_item_kind(&kind)?;
        let item = StockItem::new(kind, name).with_packaging(tier2_per_tier1, base_per_tier2);
        let db = self.db.lock()?;
        db.insert_item(&item)?;
        Ok(item.into())
    }

    /// Get an item by ID.
    pub fn get_item(&self, item_id: String) -> Result<Option<FfiStockItem>, VetStockError> {
        let db = self.db.lock()?;
        let item = db.get_item(&item_id)?;
        Ok(item.map(|i| i.into()))
    }

    /// List items, optionally of one kind.
    pub fn list_items(&self, kind: Option<String>) -> Result<Vec<FfiStockItem>, VetStockError> {
        let kind = kind.as_deref().map(parse_item_kind).transpose()?;
        let db = self.db.lock()?;
        let items = db.list_items(kind)?;
        Ok(items.into_iter().map(|i| i.into()).collect())
    }

    /// Edit an item's details, packaging ratios and counts.
    pub fn update_item(&self, item: FfiStockItem) -> Result<bool, VetStockError> {
        let item = StockItem::try_from(item)?;
        let mut db = self.db.lock()?;
        Ok(db.update_item(&item)?)
    }

    /// Overwrite the stock counts after a physical count.
    pub fn set_stock_levels(
        &self,
        item_id: String,
        tier1: i64,
        tier2: i64,
        base: f64,
    ) -> Result<FfiStockItem, VetStockError> {
        let mut db = self.db.lock()?;
        let item = db.set_stock_levels(&item_id, StockLevels::new(tier1, tier2, base))?;
        Ok(item.into())
    }

    /// Add a delivery to stock.
    pub fn receive_stock(
        &self,
        item_id: String,
        tier1: i64,
        tier2: i64,
        base: f64,
    ) -> Result<FfiStockItem, VetStockError> {
        let mut db = self.db.lock()?;
        let item = db.receive_stock(&item_id, StockLevels::new(tier1, tier2, base))?;
        Ok(item.into())
    }

    /// Total stock in base units, as persisted.
    pub fn total_base(&self, item_id: String) -> Result<f64, VetStockError> {
        let db = self.db.lock()?;
        Ok(db.total_base(&item_id)?)
    }

    /// Delete an item that no movement references.
    pub fn delete_item(&self, item_id: String) -> Result<bool, VetStockError> {
        let mut db = self.db.lock()?;
        Ok(db.delete_item(&item_id)?)
    }

    /// Export every item with its counts and packaging as JSON.
    pub fn export_inventory_json(&self) -> Result<String, VetStockError> {
        let db = self.db.lock()?;
        let items = db.list_items(None)?;
        Ok(serde_json::to_string_pretty(&items)?)
    }

    // =========================================================================
    // Movement Operations
    // =========================================================================

    /// Record a movement and draw down stock. Returns it with its assigned ID.
    pub fn create_movement(&self, movement: FfiMovement) -> Result<FfiMovement, VetStockError> {
        let record = MovementRecord::try_from(movement)?;
        let mut db = self.db.lock()?;
        db.create_movement(&record)?;
        Ok(record.into())
    }

    /// Save an edited movement.
    pub fn update_movement(&self, movement: FfiMovement) -> Result<(), VetStockError> {
        self.update_movements(vec![movement])
    }

    /// Save several edited movements in one transaction.
    ///
    /// A movement sent without a date keeps its stored date.
    pub fn update_movements(&self, movements: Vec<FfiMovement>) -> Result<(), VetStockError> {
        let mut db = self.db.lock()?;
        let mut records = Vec::with_capacity(movements.len());
        for movement in movements {
            let movement_id = movement.movement_id.clone().ok_or_else(|| {
                VetStockError::InvalidInput("movement_id is required to update a movement".to_string())
            })?;
            let keep_date = movement.date.is_none();
            let mut record = MovementRecord::try_from(movement)?;
            if keep_date {
                let stored = db
                    .get_movement(&movement_id)?
                    .ok_or_else(|| VetStockError::NotFound(format!("movement {}", movement_id)))?;
                record.date = stored.date;
            }
            records.push(record);
        }
        db.update_movements(&records)?;
        Ok(())
    }

    /// Delete a movement and return its stock.
    pub fn delete_movement(&self, movement_id: String) -> Result<bool, VetStockError> {
        let mut db = self.db.lock()?;
        Ok(db.delete_movement(&movement_id)?)
    }

    /// Delete all lines of a removed surgery record.
    pub fn delete_surgery_lines(&self, surgery_record_id: String) -> Result<u32, VetStockError> {
        let mut db = self.db.lock()?;
        let deleted = db.delete_movements_for_surgery(&surgery_record_id)?;
        Ok(deleted as u32)
    }

    /// Delete all movements of a removed animal.
    pub fn delete_animal_movements(&self, animal_id: String) -> Result<u32, VetStockError> {
        let mut db = self.db.lock()?;
        let deleted = db.delete_movements_for_animal(&animal_id)?;
        Ok(deleted as u32)
    }

    /// Get a movement by ID.
    pub fn get_movement(&self, movement_id: String) -> Result<Option<FfiMovement>, VetStockError> {
        let db = self.db.lock()?;
        let movement = db.get_movement(&movement_id)?;
        Ok(movement.map(|m| m.into()))
    }

    /// Movements drawing on an item.
    pub fn list_movements_for_item(&self, item_id: String) -> Result<Vec<FfiMovement>, VetStockError> {
        let db = self.db.lock()?;
        let movements = db.list_movements_for_item(&item_id)?;
        Ok(movements.into_iter().map(|m| m.into()).collect())
    }

    /// Movements of an animal.
    pub fn list_movements_for_animal(&self, animal_id: String) -> Result<Vec<FfiMovement>, VetStockError> {
        let db = self.db.lock()?;
        let movements = db.list_movements_for_animal(&animal_id)?;
        Ok(movements.into_iter().map(|m| m.into()).collect())
    }

    /// Lines of a surgery record.
    pub fn list_movements_for_surgery(
        &self,
        surgery_record_id: String,
    ) -> Result<Vec<FfiMovement>, VetStockError> {
        let db = self.db.lock()?;
        let movements = db.list_movements_for_surgery(&surgery_record_id)?;
        Ok(movements.into_iter().map(|m| m.into()).collect())
    }
}

fn parse_item_kind(raw: &str) -> Result<ItemKind, VetStockError> {
    ItemKind::parse(raw).ok_or_else(|| VetStockError::InvalidInput(format!("unknown item kind '{}'", raw)))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe stock item, with its tier labels resolved.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStockItem {
    pub item_id: String,
    pub kind: String,
    pub name: String,
    pub description: Option<String>,
    pub packaging_notes: Option<String>,
    pub tier2_per_tier1: i64,
    pub base_per_tier2: f64,
    pub stock_tier1: i64,
    pub stock_tier2: i64,
    pub stock_base: f64,
    pub total_base: f64,
    pub tier1_label: String,
    pub tier2_label: String,
    pub base_label: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<StockItem> for FfiStockItem {
    fn from(item: StockItem) -> Self {
        let labels = item.labels();
        let total_base = item.total_base();
        Self {
            item_id: item.item_id,
            kind: item.kind.as_str().to_string(),
            name: item.name,
            description: item.description,
            packaging_notes: item.packaging_notes,
            tier2_per_tier1: item.packaging.tier2_per_tier1,
            base_per_tier2: item.packaging.base_per_tier2,
            stock_tier1: item.stock.tier1,
            stock_tier2: item.stock.tier2,
            stock_base: item.stock.base,
            total_base,
            tier1_label: labels.tier1.to_string(),
            tier2_label: labels.tier2.to_string(),
            base_label: labels.base.to_string(),
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl TryFrom<FfiStockItem> for StockItem {
    type Error = VetStockError;

    fn try_from(item: FfiStockItem) -> Result<Self, Self::Error> {
        Ok(StockItem {
            item_id: item.item_id,
            kind: parse_item_kind(&item.kind)?,
            name: item.name,
            description: item.description,
            packaging_notes: item.packaging_notes,
            packaging: Packaging {
                tier2_per_tier1: item.tier2_per_tier1,
                base_per_tier2: item.base_per_tier2,
            },
            stock: StockLevels::new(item.stock_tier1, item.stock_tier2, item.stock_base),
            created_at: item.created_at,
            updated_at: item.updated_at,
        })
    }
}

/// FFI-safe movement record.
///
/// `movement_id` and `date` may be left empty on create; they are filled in.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMovement {
    pub movement_id: Option<String>,
    pub kind: String,
    pub item_id: String,
    pub quantity: f64,
    pub consumes_stock: bool,
    pub animal_id: Option<String>,
    pub surgery_record_id: Option<String>,
    pub date: Option<String>,
    pub route: Option<String>,
    pub doctor: Option<String>,
    pub next_date: Option<String>,
    pub lot_number: Option<String>,
    pub lot_expiration: Option<String>,
    pub notes: Option<String>,
}

impl From<MovementRecord> for FfiMovement {
    fn from(record: MovementRecord) -> Self {
        Self {
            movement_id: Some(record.movement_id),
            kind: record.kind.as_str().to_string(),
            item_id: record.item_id,
            quantity: record.quantity,
            consumes_stock: record.consumes_stock,
            animal_id: record.animal_id,
            surgery_record_id: record.surgery_record_id,
            date: Some(record.date),
            route: record.route.map(|r| r.as_str().to_string()),
            doctor: record.doctor,
            next_date: record.next_date,
            lot_number: record.lot_number,
            lot_expiration: record.lot_expiration,
            notes: record.notes,
        }
    }
}

impl TryFrom<FfiMovement> for MovementRecord {
    type Error = VetStockError;

    fn try_from(movement: FfiMovement) -> Result<Self, Self::Error> {
        let kind = MovementKind::parse(&movement.kind).ok_or_else(|| {
            VetStockError::InvalidInput(format!("unknown movement kind '{}'", movement.kind))
        })?;
        let route = movement
            .route
            .as_deref()
            .map(|r| {
                Route::parse(r).ok_or_else(|| VetStockError::InvalidInput(format!("unknown route '{}'", r)))
            })
            .transpose()?;

        let mut record = MovementRecord::new(kind, movement.item_id, movement.quantity);
        if let Some(id) = movement.movement_id {
            record.movement_id = id;
        }
        if let Some(date) = movement.date {
            record.date = date;
        }
        record.consumes_stock = movement.consumes_stock;
        record.animal_id = movement.animal_id;
        record.surgery_record_id = movement.surgery_record_id;
        record.route = route;
        record.doctor = movement.doctor;
        record.next_date = movement.next_date;
        record.lot_number = movement.lot_number;
        record.lot_expiration = movement.lot_expiration;
        record.notes = movement.notes;
        Ok(record)
    }
}
