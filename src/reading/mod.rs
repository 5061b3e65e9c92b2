pub mod series;
pub mod source;

pub use series::{FlowPoint, FlowSeries};
pub use source::{ArchiveVersion, FlowUnit, Source};
