//! Core process traits.
//!
//! A [`Process`] is the opaque unit of work a pipeline node wraps. The
//! scheduler never inspects process internals; it drives them through this
//! uniform contract and reads the [`StepStatus`] each step returns.

use crate::config::ConfigBlock;
use crate::status::StepStatus;
use std::any::Any;

/// An opaque unit of work with a uniform step/initialize/params/reset
/// contract.
///
/// # Lifecycle
///
/// - `initialize()` is called exactly once, before the first step
/// - `step()` is called once per pipeline cycle while the node is eligible
/// - `reset()` may be called after a failure so the graph can restart
///
/// The `Any` supertrait gives typed data ports their downcast at the
/// connection boundary; implementors get it for free on any `'static` type.
///
/// # Example
///
/// ```rust,ignore
/// struct FrameCounter {
///     name: String,
///     count: u64,
/// }
///
/// impl Process for FrameCounter {
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     fn step(&mut self) -> StepStatus {
///         self.count += 1;
///         StepStatus::Success
///     }
/// }
/// ```
pub trait Process: Any + Send {
    /// Instance name of this process, unique within a pipeline.
    fn name(&self) -> &str;

    /// Class name describing what processing this process performs.
    ///
    /// Multiple instances may share a class name while carrying distinct
    /// instance names.
    fn class_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// One-time setup before the first step.
    ///
    /// Return `false` to abort pipeline initialization.
    fn initialize(&mut self) -> bool {
        true
    }

    /// Perform one unit of work and report the outcome.
    fn step(&mut self) -> StepStatus;

    /// Current configuration parameters.
    fn params(&self) -> ConfigBlock {
        ConfigBlock::new()
    }

    /// Accept configuration parameters.
    ///
    /// Return `false` to report a configuration the process cannot accept.
    fn set_params(&mut self, _params: &ConfigBlock) -> bool {
        true
    }

    /// Clear internal state after a failure so the process can restart.
    fn reset(&mut self) -> bool {
        true
    }

    /// Capability query for container processes.
    ///
    /// A process that nests its own sub-pipeline overrides this to return
    /// `Some(self)`, exposing the recovery and post-step hooks of
    /// [`SuperProcess`]. Plain processes keep the default `None`.
    fn super_hooks(&mut self) -> Option<&mut dyn SuperProcess> {
        None
    }
}

/// Extra hooks for a process that contains a nested sub-pipeline.
///
/// The scheduler invokes these on any node whose process answers the
/// [`Process::super_hooks`] capability query.
pub trait SuperProcess: Process {
    /// Last-chance recovery after this process reports a failure.
    ///
    /// Return `true` if the internal sub-pipeline resynchronized (for
    /// example by discarding a corrupt frame); the node then reports
    /// [`StepStatus::Skip`] instead of propagating the failure outward.
    fn fail_recover(&mut self) -> bool {
        false
    }

    /// Called unconditionally after every step, regardless of status.
    ///
    /// Gives the container a place to finalize internal bookkeeping.
    fn post_step(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        name: String,
    }

    impl Process for Plain {
        fn name(&self) -> &str {
            &self.name
        }

        fn step(&mut self) -> StepStatus {
            StepStatus::Success
        }
    }

    struct Container {
        name: String,
        recovered: bool,
    }

    impl Process for Container {
        fn name(&self) -> &str {
            &self.name
        }

        fn step(&mut self) -> StepStatus {
            StepStatus::Failure
        }

        fn super_hooks(&mut self) -> Option<&mut dyn SuperProcess> {
            Some(self)
        }
    }

    impl SuperProcess for Container {
        fn fail_recover(&mut self) -> bool {
            self.recovered = true;
            true
        }
    }

    #[test]
    fn test_defaults() {
        let mut p = Plain {
            name: "plain".into(),
        };
        assert!(p.initialize());
        assert!(p.reset());
        assert!(p.params().is_empty());
        assert!(p.set_params(&ConfigBlock::new()));
        assert!(p.super_hooks().is_none());
        assert!(p.class_name().contains("Plain"));
    }

    #[test]
    fn test_super_hooks_capability() {
        let mut c = Container {
            name: "container".into(),
            recovered: false,
        };
        let hooks = c.super_hooks().expect("container exposes hooks");
        assert!(hooks.fail_recover());
        assert!(c.recovered);
    }
}
