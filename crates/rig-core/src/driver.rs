//! Driver factory surface.
//!
//! Concrete instrument drivers register through [`DriverFactory`]: validate
//! a TOML config fragment up front, then build asynchronously and hand back
//! a [`DriverComponents`] bag with the role trait objects the driver
//! implements. Storing each role separately avoids downcasting and lets one
//! driver serve several roles (a two-channel generator, for instance).

use crate::capabilities::{CurrentSource, SignalGenerator, SpectrumAnalyzer};
use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Bench roles a driver can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Source,
    Generator,
    Analyzer,
}

impl Role {
    /// Human-readable label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Source => "Source",
            Self::Generator => "Generator",
            Self::Analyzer => "Analyzer",
        }
    }
}

/// Container for role trait objects returned by a driver build.
#[derive(Default)]
pub struct DriverComponents {
    pub source: Option<Arc<dyn CurrentSource>>,
    pub generator: Option<Arc<dyn SignalGenerator>>,
    pub analyzer: Option<Arc<dyn SpectrumAnalyzer>>,
}

impl DriverComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roles actually populated by the driver.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = Vec::new();
        if self.source.is_some() {
            roles.push(Role::Source);
        }
        if self.generator.is_some() {
            roles.push(Role::Generator);
        }
        if self.analyzer.is_some() {
            roles.push(Role::Analyzer);
        }
        roles
    }

    pub fn with_source(mut self, s: Arc<dyn CurrentSource>) -> Self {
        self.source = Some(s);
        self
    }

    pub fn with_generator(mut self, g: Arc<dyn SignalGenerator>) -> Self {
        self.generator = Some(g);
        self
    }

    pub fn with_analyzer(mut self, a: Arc<dyn SpectrumAnalyzer>) -> Self {
        self.analyzer = Some(a);
        self
    }
}

/// Trait for driver factories that create instrument instances.
///
/// Factories are registered once at startup and live for the process
/// lifetime; `build()` takes `&self` and returns a `'static` future, so a
/// factory must not hold mutable state across builds.
pub trait DriverFactory: Send + Sync + 'static {
    /// Driver type name matching the config `type` field.
    fn driver_type(&self) -> &'static str;

    /// Human-readable name for error messages.
    fn name(&self) -> &'static str;

    /// Roles this driver type can provide.
    fn roles(&self) -> &'static [Role];

    /// Validate configuration without instantiating.
    fn validate(&self, config: &toml::Value) -> Result<()>;

    /// Async instantiation of the driver.
    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DriverComponents>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names() {
        assert_eq!(Role::Source.name(), "Source");
        assert_eq!(Role::Analyzer.name(), "Analyzer");
    }

    #[test]
    fn empty_components_have_no_roles() {
        assert!(DriverComponents::new().roles().is_empty());
    }
}
