// Built-in experimenters. Both produce summary tables.

pub mod aggregator;
pub mod frequency;

pub use aggregator::AggregatorExperimenter;
pub use frequency::FrequencyExperimenter;
