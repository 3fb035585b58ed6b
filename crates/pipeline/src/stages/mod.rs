//! Built-in stages, one per pipeline step.

mod aggregate;
mod filter;
mod filter_aggregates;
mod flatten;
mod group;
mod pivot;
mod sort;

pub use aggregate::{sum_fields, AggregateFn, AggregateStage};
pub use filter::{FilterStage, RowPredicate};
pub use filter_aggregates::FilterAggregatesStage;
pub use flatten::FlattenStage;
pub use group::GroupStage;
pub use pivot::{PivotFn, PivotStage};
pub use sort::SortStage;
