pub mod catalog;
pub mod health;
pub mod index;
pub mod items;
pub mod payments;
