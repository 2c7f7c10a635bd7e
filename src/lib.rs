//! rentalscope: descriptive aggregates and additive decomposition of bike-share rentals
//!
//! This library loads daily or hourly rental records, computes the summary
//! tables a dashboard draws for a date range (daily totals, monthly, seasonal,
//! weekday, working-day and user-type means) and splits the daily totals into
//! trend, seasonal and residual components.

pub mod aggregate;
pub mod config;
pub mod data;
pub mod decompose;
pub mod error;
pub mod grouping;
pub mod range;
pub mod session;

// Re-export public items for easier access
pub use aggregate::{
    aggregate, aggregate_frame, frame_in_range, AggregateBundle, DailyRow, DailySummary,
    DailyTable, GroupedTable, UserType, UserTypeRow, UserTypeTable,
};
pub use config::PipelineConfig;
pub use data::{
    frame_from_records, load_rentals, records_from_frame, RentalDataset, RentalRecord, Season,
    WorkingDay,
};
pub use decompose::{
    decompose, Component, Decomposition, DecompositionModel, DecompositionPoint,
    DEFAULT_DAILY_PERIOD,
};
pub use error::{ConsistencyWarning, PipelineError};
pub use grouping::{
    column_means, group_reduce, group_totals, ColumnValues, CountTotals, GroupRow, KeyOrder,
    KeySelector, Reduction,
};
pub use range::DateRange;
pub use session::RentalSession;

/// Result type for loading and configuration
pub type Result<T> = anyhow::Result<T>;
