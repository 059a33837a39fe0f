// src/drivers/mod.rs
// Signal path: raw board windows in, (peak, ratio) statistics out.
pub mod buffer;
pub mod error;
pub mod features;
pub mod filter;
pub mod pipeline;
pub mod preprocess;
pub mod simulated;
pub mod source;
pub mod window;
pub use buffer::RingBuffer;
pub use error::{ProcessingError, SourceError};
pub use features::blink_activity;
pub use filter::{FilterChain, FilterKind};
pub use pipeline::{BlinkPipeline, Pump, PumpError};
pub use preprocess::Preprocessor;
pub use simulated::{SimulatedBoard, SimulationConfig};
pub use source::{ManualSource, RawWindow, SampleSource, SampleWindow};
pub use window::{peak_and_ratio, WindowStat};
