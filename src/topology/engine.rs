//! Rule dispatch
//!
//! Resolves a rule by name, prepares the run context the way the rule's
//! descriptor asks for, and invokes the check.

use super::config::CheckerConfig;
use super::context::{progress_to_channel, CancellationToken, ProgressFn, RunContext};
use super::error::EngineError;
use super::layer::Layer;
use super::rules::RuleRegistry;
use super::types::TopologyViolation;
use geo_types::Rect;
use std::sync::mpsc::Sender;
use std::time::Instant;
use tracing::{info, warn};

/// Which features a run looks at
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValidationScope {
    WholeLayer,
    /// Features intersecting the view rectangle; conflicts are clipped to it
    Extent(Rect<f64>),
}

impl ValidationScope {
    pub fn extent(&self) -> Option<Rect<f64>> {
        match self {
            ValidationScope::WholeLayer => None,
            ValidationScope::Extent(rect) => Some(*rect),
        }
    }
}

pub struct TopologyEngine {
    registry: RuleRegistry,
    cancel: CancellationToken,
    context: RunContext,
}

impl Default for TopologyEngine {
    fn default() -> Self {
        Self::new(CheckerConfig::default())
    }
}

impl TopologyEngine {
    pub fn new(config: CheckerConfig) -> Self {
        let cancel = CancellationToken::new();
        Self {
            registry: RuleRegistry::new(),
            context: RunContext::new(config, cancel.clone()),
            cancel,
        }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Ask the running (or next) scan to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle for cancelling from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send processed-feature counts to `tx`
    pub fn set_progress_sender(&mut self, tx: Sender<usize>) {
        self.context.set_progress(Some(progress_to_channel(tx)));
    }

    pub fn set_progress_callback(&mut self, callback: ProgressFn) {
        self.context.set_progress(Some(callback));
    }

    pub fn clear_progress(&mut self) {
        self.context.set_progress(None);
    }

    /// Number of spatial indexes built by the last run
    pub fn index_count(&self) -> usize {
        self.context.index_count()
    }

    /// Run a rule. Missing layers and unknown rules are logged and yield no
    /// violations; a cancelled run yields what was found before the stop.
    pub fn run_test(
        &mut self,
        rule_name: &str,
        layer1: Option<&dyn Layer>,
        layer2: Option<&dyn Layer>,
        scope: ValidationScope,
    ) -> Vec<TopologyViolation> {
        match self.try_run_test(rule_name, layer1, layer2, scope) {
            Ok(violations) => violations,
            Err(EngineError::Cancelled(layer)) => {
                info!("'{}' cancelled while indexing {}", rule_name, layer);
                Vec::new()
            }
            Err(e) => {
                warn!("'{}' not run: {}", rule_name, e);
                Vec::new()
            }
        }
    }

    pub fn try_run_test(
        &mut self,
        rule_name: &str,
        layer1: Option<&dyn Layer>,
        layer2: Option<&dyn Layer>,
        scope: ValidationScope,
    ) -> Result<Vec<TopologyViolation>, EngineError> {
        let layer1 = layer1.ok_or(EngineError::MissingFirstLayer)?;
        let descriptor = *self
            .registry
            .get(rule_name)
            .ok_or_else(|| EngineError::UnknownRule(rule_name.to_string()))?;
        let layer2 = match (descriptor.use_second_layer, layer2) {
            (true, None) => return Err(EngineError::MissingSecondLayer(descriptor.rule.name())),
            (_, layer2) => layer2,
        };

        let start = Instant::now();
        // Features may have been edited since the last run
        self.context.reset(scope.extent());

        if descriptor.use_second_layer {
            if let Some(layer2) = layer2 {
                self.context.fill_feature_list(layer1)?;
                self.context.ensure_index(layer2)?;
            }
        } else if descriptor.use_spatial_index {
            self.context.ensure_index(layer1)?;
        } else {
            self.context.fill_feature_list(layer1)?;
        }

        let violations = (descriptor.check)(&self.context, layer1, layer2);

        info!(
            "'{}' on {}: {} violations in {:.2?} (scope: {})",
            rule_name,
            layer1.name(),
            violations.len(),
            start.elapsed(),
            if self.context.is_extent_scoped() { "extent" } else { "whole layer" }
        );
        Ok(violations)
    }
}
