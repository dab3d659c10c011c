pub mod admission;
pub mod batch;
pub mod converter;
pub mod delivery;
pub mod error;
pub mod hook;
pub mod record;
pub mod service;
pub mod state;
pub mod writer;
