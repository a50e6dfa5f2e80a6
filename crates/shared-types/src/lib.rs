pub mod types;

pub use types::{
    Confidence, Degradation, ExtractedText, ExtractionMetadata, LenderRequirements, PlanSummary,
    ReorganizationPlan, Section,
};
