//! Error types for each layer of the simulation core.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("pet type is empty")]
    MissingVariant,

    #[error("unknown pet type: {0}")]
    UnknownVariant(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("item name cannot be empty")]
    EmptyName,

    #[error("item quantity cannot be negative: {name} x{quantity}")]
    NegativeQuantity { name: String, quantity: i64 },

    #[error("item {0} has no quantity")]
    MissingQuantity(String),

    #[error("not enough {name}: have {available}, need {requested}")]
    Insufficient {
        name: String,
        available: u32,
        requested: u32,
    },

    #[error("no such item: {0}")]
    UnknownItem(String),

    #[error("unknown item category: {0}")]
    UnknownCategory(String),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("save file I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("save file JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed save document: {0}")]
    Malformed(String),

    #[error("save slot {0} not found")]
    SlotNotFound(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("no game is loaded")]
    NoSession,

    #[error("busy: an action is still in progress")]
    Busy,

    #[error("the game is over")]
    GameOver,

    #[error("no {0} left")]
    NoItemLeft(String),

    #[error("save slot {0} not found")]
    SlotNotFound(u32),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotNotFound(id) => SessionError::SlotNotFound(id),
            other => SessionError::Store(other),
        }
    }
}
