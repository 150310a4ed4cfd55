//! Built-in vendor plugins.

pub mod go;
pub mod manifest;
