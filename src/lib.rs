// Library interface for skill402
// The binary and the tests import the modules from here

pub mod catalog;
pub mod cli;
pub mod config;
pub mod credential;
pub mod gate;
pub mod lightning;
pub mod logging;
pub mod prelude;
pub mod settlement;
pub mod webapp;
