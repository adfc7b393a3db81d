//! The LIFT core: path sandbox, tool registry, requirements model, report
//! parsers, agent runtime, the three agent specializations, the archive
//! manager and the top-level iteration engine. See `spec.md` §2 for the
//! component table this module layout mirrors 1:1.

pub mod agent;
pub mod agents;
pub mod archive;
pub mod iteration;
pub mod paths;
pub mod reports;
pub mod requirements;
pub mod sandbox;
pub mod tools;

pub use iteration::{check_inputs, setup_new_project, IterationEngine, IterationError, SetupError};
pub use paths::Paths;
pub use requirements::{Requirement, RequirementScope, ScopeChildren};
