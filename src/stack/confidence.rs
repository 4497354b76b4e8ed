//! Signal weights and the confidence staircase.

use serde::{Deserialize, Serialize};

/// A corroborating piece of evidence found for a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ParentDeclaration,
    StarterDependency,
    PluginDeclaration,
    FrameworkAnnotation,
    RuntimeConfigFile,
    Manifest,
    NamedDependency,
    Lockfile,
    FrameworkMarkerFile,
}

impl Signal {
    pub fn weight(self) -> u32 {
        match self {
            Signal::ParentDeclaration | Signal::StarterDependency => 2,
            Signal::PluginDeclaration
            | Signal::FrameworkAnnotation
            | Signal::RuntimeConfigFile
            | Signal::Manifest
            | Signal::NamedDependency
            | Signal::Lockfile
            | Signal::FrameworkMarkerFile => 1,
        }
    }
}

/// Maps a total signal weight onto the confidence staircase.
///
/// Returns `None` for zero weight, which means "not found".
pub fn from_weight(weight: u32) -> Option<f64> {
    match weight {
        0 => None,
        1 => Some(0.5),
        2 | 3 => Some(0.8),
        _ => Some(1.0),
    }
}

/// Accumulates signals for one candidate.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
    signals: Vec<Signal>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, signal: Signal, present: bool) {
        if present && !self.signals.contains(&signal) {
            self.signals.push(signal);
        }
    }

    pub fn contains(&self, signal: Signal) -> bool {
        self.signals.contains(&signal)
    }

    pub fn weight(&self) -> u32 {
        self.signals.iter().map(|s| s.weight()).sum()
    }

    pub fn confidence(&self) -> Option<f64> {
        from_weight(self.weight())
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }
}
