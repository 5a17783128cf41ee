// Audio module - tone model, sink capability and its implementations

#[cfg(feature = "hardware_audio")]
pub mod engine_cpal;
pub mod recording;
pub mod sink;
pub mod synth;
pub mod tone;
pub mod wav;

// Re-export commonly used types for convenience
#[cfg(feature = "hardware_audio")]
pub use engine_cpal::CpalSink;
pub use recording::RecordingSink;
pub use sink::{AudioSink, SharedSink};
pub use tone::{Envelope, ToneKind, ToneRequest};
