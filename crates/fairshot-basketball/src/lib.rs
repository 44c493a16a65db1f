// Basketball salary domain: statistics and salary sources, duplicate
// reconciliation, the canonical player table, and the derived views.

pub mod canonical;
pub mod profile;
pub mod reconcile;
pub mod salary;
pub mod stats;
pub mod views;
