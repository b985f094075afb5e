//! Delimited-table adapters: everything the pipeline persists or ingests is
//! a flat CSV table.

pub mod csv_read;
pub mod csv_write;
