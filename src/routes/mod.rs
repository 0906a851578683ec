pub mod admin;
pub mod events;
pub mod inventory;
pub mod manager;
pub mod public;
pub mod reception;
pub mod stylist;
