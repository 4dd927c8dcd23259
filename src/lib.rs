#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate lazy_static;

mod frb_generated; /* AUTO INJECTED BY flutter_rust_bridge. This line may not be accurate, and you can change it according to your needs. */

pub mod api;
pub mod archive;
pub mod calibration;
pub mod logs;
pub mod map;
pub mod map_importer;
pub mod map_loader;
mod map_search;
pub mod marker;
pub mod projection;
pub mod settings;
mod utils;
