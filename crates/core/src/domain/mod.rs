//! Domain entities and business rules

pub mod audio;
pub mod config;
pub mod control;
pub mod dsp;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioEnumerator, AudioError, DeviceId, DeviceInfo, DeviceType, SampleRate};
pub use config::{
    AudioDeviceConfig, ConfigError, ConfigManager, ControlSourceKind, ControlsConfig,
    EngineConfig, TonestackConfig,
};
pub use control::{ControlReadings, ControlSource, PotPosition};
pub use dsp::{
    Band, BandDescriptor, BiquadSection, CoefficientCell, Effect, EqualizerControl,
    FilterCoefficients, FilterDesigner, FilterShape, FilterState, ThreeBandEqualizer, Topology,
};
