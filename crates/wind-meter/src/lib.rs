#![doc = "Debounced pulse counting and windowed rate sampling for wind sensors."]

pub mod clock;
pub mod counter;
pub mod delay;
pub mod indicator;
pub mod meter;
pub mod realtime;
pub mod report;
pub mod sampler;
pub mod source;

pub use clock::*;
pub use counter::*;
pub use delay::*;
pub use indicator::*;
pub use meter::*;
pub use realtime::*;
pub use report::*;
pub use sampler::*;
pub use source::*;
