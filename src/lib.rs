//! union_dds: a small Data Distribution Service and the HelloWorldData union example built on it.

extern crate self as union_dds;

pub mod app;
pub mod config;
pub mod dds;
mod delivery;
pub mod error;
pub mod hello_world_data;
mod network;
pub mod structure;

pub use dds::key::DdsData;
pub use ddsdata_derive::DdsData;
