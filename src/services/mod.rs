pub mod finalizer;
pub mod item_adapter;
pub mod safety_filter;
pub mod speculation;

pub use finalizer::{FinishOutcome, SessionFinalizer};
pub use item_adapter::{parse_item, ItemAdapter, Rejection};
pub use safety_filter::{SafetyFilter, SafetyVerdict};
pub use speculation::{CoordinatorSettings, SpeculationCoordinator};
