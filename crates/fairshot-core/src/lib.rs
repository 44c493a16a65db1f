// Shared plumbing for the salary pipeline: configuration, tabular source
// loading, and currency normalization.

pub mod config;
pub mod currency;
pub mod table;
