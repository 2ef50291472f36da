//! Audio decoding and output

pub mod decoder;
pub mod gate;
pub mod output;
pub mod types;

pub use decoder::decode_pcm16le;
pub use gate::{
    AudioGate, ContextState, GateState, OutputBackend, OutputContext, PlaybackHandle, UserGesture,
};
pub use output::CpalBackend;
pub use types::{PcmBuffer, SAMPLE_RATE};
