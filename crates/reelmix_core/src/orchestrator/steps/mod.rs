//! Pipeline step implementations.
//!
//! Each step handles one phase of the assembly pipeline.

mod encode;
mod fetch;
mod mix;
mod normalize;
mod schedule;

pub use encode::EncodeStep;
pub use fetch::FetchStep;
pub use mix::MixStep;
pub use normalize::NormalizeStep;
pub use schedule::{preflight_visuals, schedule_for, ScheduleStep, MANIFEST_NAME};
