//! Stockable item models and the package hierarchy.

use serde::{Deserialize, Serialize};

/// The four kinds of stockable item. They share one ledger and differ only in labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Medicine,
    Vaccine,
    Dewormer,
    SurgeryConsumable,
}

/// Display names for the three packaging tiers of an item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackagingLabels {
    /// Largest container (e.g. "box")
    pub tier1: &'static str,
    /// Intermediate container (e.g. "pack", "vial")
    pub tier2: &'static str,
    /// Smallest consumable quantity (e.g. "unit", "dose")
    pub base: &'static str,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [
        ItemKind::Medicine,
        ItemKind::Vaccine,
        ItemKind::Dewormer,
        ItemKind::SurgeryConsumable,
    ];

    /// Storage/wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Medicine => "medicine",
            ItemKind::Vaccine => "vaccine",
            ItemKind::Dewormer => "dewormer",
            ItemKind::SurgeryConsumable => "surgery_consumable",
        }
    }

    /// Parse a storage/wire name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    pub fn labels(&self) -> PackagingLabels {
        match self {
            ItemKind::Vaccine => PackagingLabels {
                tier1: "box",
                tier2: "vial",
                base: "dose",
            },
            ItemKind::Medicine | ItemKind::Dewormer | ItemKind::SurgeryConsumable => {
                PackagingLabels {
                    tier1: "box",
                    tier2: "pack",
                    base: "unit",
                }
            }
        }
    }
}

/// Fixed conversion ratios between packaging tiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Packaging {
    /// Packs/vials per box
    pub tier2_per_tier1: i64,
    /// Units/doses per pack/vial (tablets per blister, mL per bottle, ...)
    pub base_per_tier2: f64,
}

impl Default for Packaging {
    fn default() -> Self {
        Self {
            tier2_per_tier1: 1,
            base_per_tier2: 1.0,
        }
    }
}

/// Whole containers and loose units currently on the shelf.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StockLevels {
    /// Sealed boxes
    pub tier1: i64,
    /// Loose packs/vials
    pub tier2: i64,
    /// Loose units/doses (may be fractional)
    pub base: f64,
}

impl StockLevels {
    pub fn new(tier1: i64, tier2: i64, base: f64) -> Self {
        Self { tier1, tier2, base }
    }

    /// Everything on the shelf expressed in base units.
    pub fn total_base(&self, packaging: &Packaging) -> f64 {
        let per_tier2 = packaging.base_per_tier2;
        self.tier1 as f64 * packaging.tier2_per_tier1 as f64 * per_tier2
            + self.tier2 as f64 * per_tier2
            + self.base
    }
}

/// A stockable item (medicine, vaccine, dewormer or surgery consumable).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockItem {
    /// Local UUID
    pub item_id: String,
    /// Which catalog this item belongs to
    pub kind: ItemKind,
    /// Product name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Presentation notes (mL per bottle, equivalences, usage)
    pub packaging_notes: Option<String>,
    /// Tier conversion ratios
    pub packaging: Packaging,
    /// Current stock
    pub stock: StockLevels,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl StockItem {
    /// Create an empty item with default 1:1 packaging.
    pub fn new(kind: ItemKind, name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            item_id: uuid::Uuid::new_v4().to_string(),
            kind,
            name,
            description: None,
            packaging_notes: None,
            packaging: Packaging::default(),
            stock: StockLevels::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_packaging(mut self, tier2_per_tier1: i64, base_per_tier2: f64) -> Self {
        self.packaging = Packaging {
            tier2_per_tier1,
            base_per_tier2,
        };
        self
    }

    pub fn with_stock(mut self, tier1: i64, tier2: i64, base: f64) -> Self {
        self.stock = StockLevels::new(tier1, tier2, base);
        self
    }

    /// Total stock in base units. Always derived, never stored independently.
    pub fn total_base(&self) -> f64 {
        self.stock.total_base(&self.packaging)
    }

    pub fn labels(&self) -> PackagingLabels {
        self.kind.labels()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
