//! Flutter bridge surface over `fieldops_core`.

pub mod api;
