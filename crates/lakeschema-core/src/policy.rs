//! Drift policy enforcement.
//!
//! Given a diff report and a policy mode, decides whether a submitted
//! schema is accepted as-is, folded into the current version, rejected,
//! or forked into a new version. The policy is configuration selected
//! once per request, not a runtime state machine.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::diff::{DiffReport, SchemaChange};
use crate::mapping::MappedColumn;
use crate::registry::{RegistryError, SchemaRegistry, VersionId};

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors raised by drift policy enforcement.
#[derive(Debug, Snafu)]
pub enum PolicyError {
    /// The configured policy value is not one of `STRICT | WARN | AUTO`.
    #[snafu(display("invalid drift policy '{raw}' (expected STRICT, WARN, or AUTO)"))]
    InvalidPolicy {
        /// The rejected configuration value.
        raw: String,
    },

    /// A breaking change was rejected under the STRICT policy. Nothing
    /// was persisted.
    #[snafu(display(
        "breaking schema changes rejected for entity '{entity}' under STRICT policy: {}",
        breaking.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    ))]
    BreakingRejected {
        /// The entity whose submission was rejected.
        entity: String,
        /// The breaking changes that caused the rejection.
        breaking: Vec<SchemaChange>,
    },

    /// A registry operation failed while applying the decision.
    #[snafu(display("registry operation failed during policy enforcement: {source}"))]
    Registry {
        /// The underlying registry error.
        source: RegistryError,
    },
}

/// How breaking schema drift is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriftPolicy {
    /// Reject breaking changes fatally; persist nothing.
    #[default]
    Strict,
    /// Log breaking changes and keep the current version unchanged.
    Warn,
    /// Fork a new version when breaking changes appear.
    Auto,
}

impl DriftPolicy {
    /// Canonical configuration name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftPolicy::Strict => "STRICT",
            DriftPolicy::Warn => "WARN",
            DriftPolicy::Auto => "AUTO",
        }
    }
}

impl fmt::Display for DriftPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DriftPolicy {
    type Err = PolicyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_uppercase().as_str() {
            "STRICT" => Ok(DriftPolicy::Strict),
            "WARN" => Ok(DriftPolicy::Warn),
            "AUTO" => Ok(DriftPolicy::Auto),
            _ => InvalidPolicySnafu {
                raw: input.to_string(),
            }
            .fail(),
        }
    }
}

/// What the enforcer did with a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementAction {
    /// First submission for the entity; `v1` was created.
    RegisteredEntity,
    /// The submitted schema matched the current version exactly.
    NoChange,
    /// Breaking changes were logged but not persisted (WARN policy).
    WarnedBreaking,
    /// A new version was forked for breaking changes (AUTO policy).
    RegisteredVersion,
    /// Non-breaking changes were folded into the current version.
    UpdatedCurrentVersion,
}

/// Outcome of one policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enforcement {
    /// The entity the decision applied to.
    pub entity: String,
    /// The version that is current after the decision.
    pub active_version: VersionId,
    /// What was done.
    pub action: EnforcementAction,
}

fn change_summary(changes: &[SchemaChange]) -> Vec<String> {
    changes.iter().map(ToString::to_string).collect()
}

/// Apply the drift policy decision procedure for one submission.
///
/// An unknown entity is always registered regardless of policy; an
/// empty diff is a no-op. Breaking changes are rejected under STRICT
/// (nothing persisted), logged and skipped under WARN, and forked into
/// a new version under AUTO. Non-breaking changes are always folded
/// into the current version.
///
/// # Errors
///
/// `BreakingRejected` on the STRICT-fatal path; `Registry` when
/// persisting the decision fails.
pub async fn enforce(
    policy: DriftPolicy,
    registry: &mut SchemaRegistry,
    entity: &str,
    report: &DiffReport,
    new_schema: Vec<MappedColumn>,
) -> PolicyResult<Enforcement> {
    if registry.get_entity(entity).is_none() {
        let version = registry
            .register_new_entity(entity, new_schema)
            .await
            .context(RegistrySnafu)?;
        return Ok(Enforcement {
            entity: entity.to_string(),
            active_version: version,
            action: EnforcementAction::RegisteredEntity,
        });
    }

    let current = registry.current_record(entity).context(RegistrySnafu)?;
    let current_version = current.version;

    if report.is_empty() {
        return Ok(Enforcement {
            entity: entity.to_string(),
            active_version: current_version,
            action: EnforcementAction::NoChange,
        });
    }

    if report.has_breaking() {
        return match policy {
            DriftPolicy::Strict => BreakingRejectedSnafu {
                entity: entity.to_string(),
                breaking: report.breaking_changes.clone(),
            }
            .fail(),
            DriftPolicy::Warn => {
                for change in &report.breaking_changes {
                    log::warn!("breaking schema drift for entity '{entity}' (not persisted): {change}");
                }
                Ok(Enforcement {
                    entity: entity.to_string(),
                    active_version: current_version,
                    action: EnforcementAction::WarnedBreaking,
                })
            }
            DriftPolicy::Auto => {
                let mut summary = change_summary(&report.breaking_changes);
                summary.extend(change_summary(&report.non_breaking_changes));
                let version = registry
                    .register_new_version(entity, new_schema, true, summary)
                    .await
                    .context(RegistrySnafu)?;
                Ok(Enforcement {
                    entity: entity.to_string(),
                    active_version: version,
                    action: EnforcementAction::RegisteredVersion,
                })
            }
        };
    }

    let version = registry
        .update_current_version_schema(entity, new_schema, change_summary(&report.non_breaking_changes))
        .await
        .context(RegistrySnafu)?;
    Ok(Enforcement {
        entity: entity.to_string(),
        active_version: version,
        action: EnforcementAction::UpdatedCurrentVersion,
    })
}
