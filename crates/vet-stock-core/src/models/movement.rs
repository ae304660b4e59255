//! Movement records: clinical events that may draw down stock.

use serde::{Deserialize, Serialize};

use super::item::ItemKind;

/// Kind of clinical event that references a stockable item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Medicine administered/assigned to an animal
    Medication,
    /// Vaccine doses applied
    Vaccination,
    /// Dewormer applied
    Deworming,
    /// Medicine or consumable used during a surgery
    SurgeryMedicationLine,
}

impl MovementKind {
    pub const ALL: [MovementKind; 4] = [
        MovementKind::Medication,
        MovementKind::Vaccination,
        MovementKind::Deworming,
        MovementKind::SurgeryMedicationLine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Medication => "medication",
            MovementKind::Vaccination => "vaccination",
            MovementKind::Deworming => "deworming",
            MovementKind::SurgeryMedicationLine => "surgery_medication_line",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Whether this kind of record may draw from an item of the given kind.
    pub fn accepts(&self, item_kind: ItemKind) -> bool {
        match self {
            MovementKind::Medication => item_kind == ItemKind::Medicine,
            MovementKind::Vaccination => item_kind == ItemKind::Vaccine,
            MovementKind::Deworming => item_kind == ItemKind::Dewormer,
            MovementKind::SurgeryMedicationLine => matches!(
                item_kind,
                ItemKind::Medicine | ItemKind::SurgeryConsumable
            ),
        }
    }
}

/// Route of administration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    #[serde(rename = "sc")]
    Subcutaneous,
    #[serde(rename = "im")]
    Intramuscular,
    #[serde(rename = "iv")]
    Intravenous,
    Oral,
    Intranasal,
    Topical,
    Other,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Subcutaneous => "sc",
            Route::Intramuscular => "im",
            Route::Intravenous => "iv",
            Route::Oral => "oral",
            Route::Intranasal => "intranasal",
            Route::Topical => "topical",
            Route::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sc" => Some(Route::Subcutaneous),
            "im" => Some(Route::Intramuscular),
            "iv" => Some(Route::Intravenous),
            "oral" => Some(Route::Oral),
            "intranasal" => Some(Route::Intranasal),
            "topical" => Some(Route::Topical),
            "other" => Some(Route::Other),
            _ => None,
        }
    }
}

/// A medication, vaccination, deworming or surgery-medication line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementRecord {
    /// Local UUID
    pub movement_id: String,
    /// Kind of clinical event
    pub kind: MovementKind,
    /// Referenced stock item (required)
    pub item_id: String,
    /// Quantity in the item's base unit (units or doses)
    pub quantity: f64,
    /// Whether saving this record draws down stock
    pub consumes_stock: bool,
    /// Animal the event belongs to (owned by the patient records)
    pub animal_id: Option<String>,
    /// Parent surgery record, for surgery lines
    pub surgery_record_id: Option<String>,
    /// Date of the event
    pub date: String,
    /// Route of administration
    pub route: Option<Route>,
    /// Doctor who applied it
    pub doctor: Option<String>,
    /// Next due date (vaccination, deworming)
    pub next_date: Option<String>,
    /// Lot / serial number (descriptive only)
    pub lot_number: Option<String>,
    /// Lot expiration date (descriptive only)
    pub lot_expiration: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

/// The fields of a movement the ledger cares about, captured at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementSnapshot {
    pub item_id: String,
    pub quantity: f64,
    pub consumes_stock: bool,
}

impl MovementSnapshot {
    pub fn new(item_id: impl Into<String>, quantity: f64, consumes_stock: bool) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
            consumes_stock,
        }
    }
}

impl MovementRecord {
    /// Create a stock-consuming record dated now.
    pub fn new(kind: MovementKind, item_id: String, quantity: f64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            movement_id: uuid::Uuid::new_v4().to_string(),
            kind,
            item_id,
            quantity,
            consumes_stock: true,
            animal_id: None,
            surgery_record_id: None,
            date: now.clone(),
            route: None,
            doctor: None,
            next_date: None,
            lot_number: None,
            lot_expiration: None,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn for_animal(mut self, animal_id: impl Into<String>) -> Self {
        self.animal_id = Some(animal_id.into());
        self
    }

    pub fn for_surgery(mut self, surgery_record_id: impl Into<String>) -> Self {
        self.surgery_record_id = Some(surgery_record_id.into());
        self
    }

    pub fn without_stock(mut self) -> Self {
        self.consumes_stock = false;
        self
    }

    pub fn snapshot(&self) -> MovementSnapshot {
        MovementSnapshot {
            item_id: self.item_id.clone(),
            quantity: self.quantity,
            consumes_stock: self.consumes_stock,
        }
    }
}
