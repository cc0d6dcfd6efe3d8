pub mod signal_pipeline;

pub use signal_pipeline::SignalPipeline;
