pub mod aggregator;
pub mod schedule_resolver;

pub use aggregator::{Aggregator, ContainerTotals};
pub use schedule_resolver::ScheduleResolver;
