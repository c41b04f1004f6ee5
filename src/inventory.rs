use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::InventoryError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemCategory {
    Food,
    Bath,
    Fun,
    Sleep,
    Gift,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 5] = [
        ItemCategory::Food,
        ItemCategory::Bath,
        ItemCategory::Fun,
        ItemCategory::Sleep,
        ItemCategory::Gift,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemCategory::Food => "food",
            ItemCategory::Bath => "bath",
            ItemCategory::Fun => "fun",
            ItemCategory::Sleep => "sleep",
            ItemCategory::Gift => "gift",
        }
    }

    /// Number of distinct items in this category (`food1..food10`, `bath1..bath5`, ...).
    pub fn slots(self) -> u32 {
        match self {
            ItemCategory::Food => 10,
            _ => 5,
        }
    }

    pub fn item_name(self, index: u32) -> String {
        format!("{}{}", self.as_str(), index)
    }

    /// Player levels earned by using one item of this category.
    pub fn level_gain(self) -> u32 {
        match self {
            ItemCategory::Gift => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemCategory {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ItemCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| InventoryError::UnknownCategory(s.to_string()))
    }
}

/// On-disk shape of one inventory entry. Fields are optional so a damaged entry can be
/// skipped instead of failing the whole load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryItem {
    name: String,
    quantity: u32,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, quantity: i64) -> Result<Self, InventoryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InventoryError::EmptyName);
        }
        let quantity = checked_quantity(&name, quantity)?;
        Ok(Self { name, quantity })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn set_quantity(&mut self, quantity: i64) -> Result<(), InventoryError> {
        self.quantity = checked_quantity(&self.name, quantity)?;
        Ok(())
    }

    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

fn checked_quantity(name: &str, quantity: i64) -> Result<u32, InventoryError> {
    if quantity < 0 {
        return Err(InventoryError::NegativeQuantity {
            name: name.to_string(),
            quantity,
        });
    }
    Ok(u32::try_from(quantity).unwrap_or(u32::MAX))
}

impl TryFrom<ItemRecord> for InventoryItem {
    type Error = InventoryError;

    fn try_from(r: ItemRecord) -> Result<Self, Self::Error> {
        let name = r.name.ok_or(InventoryError::EmptyName)?;
        let quantity = r
            .quantity
            .ok_or_else(|| InventoryError::MissingQuantity(name.clone()))?;
        InventoryItem::new(name, quantity)
    }
}

impl From<&InventoryItem> for ItemRecord {
    fn from(item: &InventoryItem) -> Self {
        Self {
            name: Some(item.name.clone()),
            quantity: Some(item.quantity as i64),
        }
    }
}

impl fmt::Display for InventoryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (x{})", self.name, self.quantity)
    }
}

/// Item stacks keyed by case-insensitive name, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inventory {
    items: Vec<InventoryItem>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// One of every catalog item, in catalog order.
    pub fn starter() -> Self {
        let items = ItemCategory::ALL
            .into_iter()
            .flat_map(|c| (1..=c.slots()).map(move |i| c.item_name(i)))
            .map(|name| InventoryItem { name, quantity: 1 })
            .collect();
        Self { items }
    }

    /// Builds an inventory from stored entries, dropping any that are unnamed, lack a
    /// quantity or carry a negative one. Duplicate names merge.
    pub fn from_records(records: impl IntoIterator<Item = ItemRecord>) -> Self {
        let mut inv = Self::new();
        for record in records {
            let shown = record.name.clone().unwrap_or_default();
            match InventoryItem::try_from(record) {
                Ok(item) => {
                    if let Err(e) = inv.add_item(&item.name, item.quantity) {
                        warn!(item = %shown, error = %e, "skipping inventory entry");
                    }
                }
                Err(e) => warn!(item = %shown, error = %e, "skipping inventory entry"),
            }
        }
        inv
    }

    pub fn to_records(&self) -> Vec<ItemRecord> {
        self.items.iter().map(ItemRecord::from).collect()
    }

    pub fn add_item(&mut self, name: &str, quantity: u32) -> Result<(), InventoryError> {
        if name.is_empty() {
            return Err(InventoryError::EmptyName);
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.matches(name)) {
            item.quantity = item.quantity.saturating_add(quantity);
            debug!(item = %item, "updated item");
            return Ok(());
        }
        let item = InventoryItem {
            name: name.to_string(),
            quantity,
        };
        debug!(item = %item, "added new item");
        self.items.push(item);
        Ok(())
    }

    /// Takes `quantity` of `name`, or nothing at all when there is not enough.
    pub fn remove_item(&mut self, name: &str, quantity: u32) -> Result<(), InventoryError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.matches(name))
            .ok_or_else(|| InventoryError::UnknownItem(name.to_string()))?;
        if item.quantity < quantity {
            return Err(InventoryError::Insufficient {
                name: item.name.clone(),
                available: item.quantity,
                requested: quantity,
            });
        }
        item.quantity -= quantity;
        Ok(())
    }

    /// `None` when the item has never been in the inventory.
    pub fn quantity(&self, name: &str) -> Option<u32> {
        self.items.iter().find(|i| i.matches(name)).map(|i| i.quantity)
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_has_thirty_single_items() {
        let inv = Inventory::starter();
        assert_eq!(inv.len(), 30);
        assert!(inv.items().iter().all(|i| i.quantity() == 1));
        assert_eq!(inv.items()[0].name(), "food1");
        assert_eq!(inv.items()[9].name(), "food10");
        assert_eq!(inv.items()[29].name(), "gift5");
    }

    #[test]
    fn add_merges_case_insensitively() {
        let mut inv = Inventory::new();
        inv.add_item("Food1", 2).unwrap();
        inv.add_item("food1", 3).unwrap();
        assert_eq!(inv.len(), 1);
        assert_eq!(inv.quantity("FOOD1"), Some(5));
        assert_eq!(inv.items()[0].name(), "Food1");
        assert_eq!(inv.add_item("", 1), Err(InventoryError::EmptyName));
    }

    #[test]
    fn remove_underflow_leaves_inventory_untouched() {
        let mut inv = Inventory::new();
        inv.add_item("gift1", 0).unwrap();
        let before = inv.clone();
        assert!(matches!(
            inv.remove_item("gift1", 1),
            Err(InventoryError::Insufficient { available: 0, .. })
        ));
        assert_eq!(inv, before);
        assert!(matches!(
            inv.remove_item("bath9", 1),
            Err(InventoryError::UnknownItem(_))
        ));
    }

    #[test]
    fn remove_zero_is_a_noop() {
        let mut inv = Inventory::starter();
        inv.remove_item("sleep2", 0).unwrap();
        inv.remove_item("sleep2", 0).unwrap();
        assert_eq!(inv.quantity("sleep2"), Some(1));
    }

    #[test]
    fn item_construction_rejects_bad_input() {
        assert_eq!(
            InventoryItem::new("", 1).unwrap_err(),
            InventoryError::EmptyName
        );
        assert!(matches!(
            InventoryItem::new("fun1", -1),
            Err(InventoryError::NegativeQuantity { .. })
        ));
        let mut item = InventoryItem::new("fun1", 2).unwrap();
        assert!(item.set_quantity(-3).is_err());
        assert_eq!(item.quantity(), 2);
        assert_eq!(item.to_string(), "fun1 (x2)");
    }

    #[test]
    fn damaged_records_are_skipped() {
        let json = r#"[
            {"name": "food1", "quantity": 2},
            {"quantity": 4},
            {"name": "bath1"},
            {"name": "fun1", "quantity": -2},
            {"name": "FOOD1", "quantity": 1}
        ]"#;
        let records: Vec<ItemRecord> = serde_json::from_str(json).unwrap();
        let inv = Inventory::from_records(records);
        assert_eq!(inv.len(), 1);
        assert_eq!(inv.quantity("food1"), Some(3));
        assert_eq!(
            inv.to_records(),
            vec![ItemRecord {
                name: Some("food1".into()),
                quantity: Some(3)
            }]
        );
    }

    #[test]
    fn category_names() {
        assert_eq!("Gift".parse::<ItemCategory>(), Ok(ItemCategory::Gift));
        assert!("toy".parse::<ItemCategory>().is_err());
        assert_eq!(ItemCategory::Bath.item_name(3), "bath3");
        assert_eq!(ItemCategory::Gift.level_gain(), 2);
        assert_eq!(ItemCategory::Sleep.level_gain(), 1);
    }
}
