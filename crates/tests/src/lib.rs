//! Cross-crate integration tests

#[cfg(test)]
mod equalizer_integration;

#[cfg(test)]
mod pipeline_integration;
