//! Batch maintenance for the Feniks wine catalog (`wines.json`).
//!
//! Each transform loads the whole catalog through a [`store::CatalogStore`],
//! works on it in memory and writes it back in one piece:
//!
//! - [`fetch`] downloads remote images,
//! - [`normalize`] turns them into padded square JPEGs,
//! - [`link`] records the local copies as `image_local`,
//! - [`translation`] exchanges `nl` text with a CSV table.

pub mod catalog;
pub mod config;
pub mod fetch;
pub mod link;
pub mod normalize;
pub mod status;
pub mod store;
pub mod translation;

#[cfg(test)]
mod tests;
