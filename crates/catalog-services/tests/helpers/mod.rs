#![allow(dead_code)]

pub mod faults;
pub mod fixtures;

pub use faults::{FaultyCatalogStore, FaultyStorage};
pub use fixtures::{attributes, setup_catalog, setup_catalog_with, upload, TestCatalog};
