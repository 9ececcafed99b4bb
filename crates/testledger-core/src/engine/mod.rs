pub mod recorder;

pub use recorder::RecordingEngine;
