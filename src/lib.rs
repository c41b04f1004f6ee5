//! Virtual pet simulation core.
//!
//! A [`session::SessionController`] owns one loaded pet at a time: its four stats decay on
//! per-variant timers ([`sim`]), player actions and items restore them, and the whole slot
//! round-trips through a JSON save file ([`storage`]).

pub mod config;
pub mod error;
pub mod inventory;
pub mod model;
pub mod session;
pub mod sim;
pub mod storage;
