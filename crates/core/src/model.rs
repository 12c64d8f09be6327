// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain types shared across the coordination, artifact, and training
//! crates: model identity, artifact extensions, and query granularities.

use smol_str::SmolStr;
use std::fmt;

/// Name of a trainable anomaly detector, derived from its config artifact's
/// filename stem (e.g. `traffic.config` -> `ModelName("traffic")`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelName(SmolStr);

impl ModelName {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelName({:?})", self.as_str())
    }
}

impl AsRef<str> for ModelName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for ModelName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ModelName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The two artifact objects that make up a model's persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Weights,
    Config,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Weights, ArtifactKind::Config];

    crate::simple_display! {
        ArtifactKind {
            Weights => "weights",
            Config => "config",
        }
    }

    /// The object-store filename extension for this artifact kind.
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Weights => "weights",
            ArtifactKind::Config => "config",
        }
    }

    /// The store key for `model` under `prefix`, e.g. `latest/traffic.config`.
    pub fn key(self, prefix: &str, model: &ModelName) -> String {
        format!("{}{}.{}", prefix, model.as_str(), self.extension())
    }
}

/// The enumerated Druid query granularities the training job issues per
/// model, from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    OneMin,
    TwoMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    OneHour,
    TwoHour,
    EightHour,
}

impl Granularity {
    /// All granularities in the fixed order the training job queries them.
    pub const ALL: [Granularity; 8] = [
        Granularity::OneMin,
        Granularity::TwoMin,
        Granularity::FiveMin,
        Granularity::FifteenMin,
        Granularity::ThirtyMin,
        Granularity::OneHour,
        Granularity::TwoHour,
        Granularity::EightHour,
    ];

    /// ISO-8601 duration token as the query engine expects it.
    pub fn iso8601(self) -> &'static str {
        match self {
            Granularity::OneMin => "PT1M",
            Granularity::TwoMin => "PT2M",
            Granularity::FiveMin => "PT5M",
            Granularity::FifteenMin => "PT15M",
            Granularity::ThirtyMin => "PT30M",
            Granularity::OneHour => "PT1H",
            Granularity::TwoHour => "PT2H",
            Granularity::EightHour => "PT8H",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.iso8601())
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
