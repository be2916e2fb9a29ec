//! Tonestack core: the three-band equalizer filter core and its domain model

pub mod domain;
