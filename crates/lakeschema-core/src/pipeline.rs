//! Submission pipeline: one call from canonical schema to registry
//! decision.
//!
//! Runs the full flow for a submission: normalize names in place,
//! validate table structure, project every table to mapped columns,
//! diff against the registered current version, and enforce the drift
//! policy. Each table produces one outcome; a STRICT rejection aborts
//! the submission with nothing persisted for the offending table.
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::canonical::{CanonicalSchema, TableValidationError};
use crate::diff::{self, DiffReport};
use crate::mapping::{self, MappingError};
use crate::naming::{self, NamingError};
use crate::policy::{self, DriftPolicy, EnforcementAction, PolicyError};
use crate::registry::{SchemaRegistry, VersionId};

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while processing a submission.
#[derive(Debug, Snafu)]
pub enum PipelineError {
    /// Name normalization failed (missing identity, reserved collision).
    #[snafu(display("schema normalization failed: {source}"))]
    Naming {
        /// The underlying naming error.
        source: NamingError,
    },

    /// A table violated a structural invariant after normalization.
    #[snafu(display("table validation failed: {source}"))]
    Validation {
        /// The underlying validation error.
        source: TableValidationError,
    },

    /// Projection to mapped columns failed.
    #[snafu(display("schema projection failed: {source}"))]
    Projection {
        /// The underlying mapping error.
        source: MappingError,
    },

    /// Policy enforcement failed or rejected the submission.
    #[snafu(display("drift policy enforcement failed: {source}"))]
    Policy {
        /// The underlying policy error.
        source: PolicyError,
    },
}

/// Outcome of one table's submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Registry entity key (the normalized table name).
    pub entity: String,
    /// Version that is current after the decision.
    pub active_version: VersionId,
    /// What the policy enforcer did.
    pub action: EnforcementAction,
    /// The diff that drove the decision. Empty for first submissions.
    pub diff: DiffReport,
}

/// Process one schema submission end to end.
///
/// The schema is normalized in place, so rename lineage and final names
/// are available to the caller afterwards. Each table is keyed in the
/// registry by its normalized name.
///
/// # Errors
///
/// Any stage failure aborts the submission; tables already enforced in
/// this call stay persisted (per-table decisions are independent).
pub async fn submit(
    schema: &mut CanonicalSchema,
    registry: &mut SchemaRegistry,
    drift_policy: DriftPolicy,
) -> PipelineResult<Vec<SubmissionOutcome>> {
    naming::normalize_schema(schema).context(NamingSnafu)?;

    let mut outcomes = Vec::with_capacity(schema.tables.len());
    for table in &schema.tables {
        table.validate().context(ValidationSnafu)?;
        let mapped = mapping::project_table(table).context(ProjectionSnafu)?;
        let entity = table.name.as_str();

        let report = match registry.get_entity(entity) {
            Some(_) => {
                let current = registry.current_record(entity).map_err(|source| {
                    PipelineError::Policy {
                        source: PolicyError::Registry { source },
                    }
                })?;
                diff::diff(&current.schema, &mapped)
            }
            None => DiffReport::default(),
        };

        let outcome = policy::enforce(drift_policy, registry, entity, &report, mapped)
            .await
            .context(PolicySnafu)?;
        log::info!(
            "entity '{}': {:?} at version {}",
            outcome.entity,
            outcome.action,
            outcome.active_version
        );

        outcomes.push(SubmissionOutcome {
            entity: outcome.entity,
            active_version: outcome.active_version,
            action: outcome.action,
            diff: report,
        });
    }

    Ok(outcomes)
}
