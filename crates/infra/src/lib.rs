//! Tonestack infrastructure: audio hosting and control polling

pub mod audio;
pub mod control;
