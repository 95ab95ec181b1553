//! Declared plot variables.
//!
//! Every variable the node can draw is listed here with its role. The
//! configured `basic` and `advanced` name lists are checked against this
//! table at startup.

use crate::error::PlotError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a variable is aggregated and drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Single line: last value per window
    Basic,

    /// Band: min, average and max per window
    Advanced,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Basic => write!(f, "basic"),
            Role::Advanced => write!(f, "advanced"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: &'static str,
    pub role: Role,

    /// Axis label
    pub label: &'static str,
}

const VARIABLES: &[VariableSpec] = &[
    VariableSpec { name: "total_steps", role: Role::Basic, label: "Total steps" },
    VariableSpec { name: "learning_rate", role: Role::Basic, label: "Learning rate" },
    VariableSpec { name: "policy_loss", role: Role::Basic, label: "Policy loss" },
    VariableSpec { name: "value_loss", role: Role::Basic, label: "Value loss" },
    VariableSpec { name: "entropy", role: Role::Basic, label: "Entropy" },
    VariableSpec { name: "net_reward", role: Role::Advanced, label: "Net reward" },
    VariableSpec { name: "episode_length", role: Role::Advanced, label: "Episode length" },
    VariableSpec { name: "ball_goal_distance", role: Role::Advanced, label: "Final ball-goal distance" },
    VariableSpec { name: "outcome", role: Role::Advanced, label: "Outcome (win=1, loss=-1)" },
];

/// The static variable table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlotSchema;

impl PlotSchema {
    pub fn variables(&self) -> &'static [VariableSpec] {
        VARIABLES
    }

    pub fn lookup(&self, name: &str) -> Option<&'static VariableSpec> {
        VARIABLES.iter().find(|spec| spec.name == name)
    }

    /// Resolves configured names, in order: basic first, then advanced.
    pub fn resolve(
        &self,
        basic: &[String],
        advanced: &[String],
    ) -> Result<Vec<&'static VariableSpec>, PlotError> {
        let configured = basic
            .iter()
            .map(|name| (name, Role::Basic))
            .chain(advanced.iter().map(|name| (name, Role::Advanced)));

        let mut resolved: Vec<&'static VariableSpec> = Vec::new();
        for (name, role) in configured {
            let spec = self
                .lookup(name)
                .ok_or_else(|| PlotError::UnknownVariable(name.clone()))?;
            if spec.role != role {
                return Err(PlotError::RoleMismatch {
                    name: name.clone(),
                    configured: role,
                    declared: spec.role,
                });
            }
            if resolved.iter().any(|r| r.name == spec.name) {
                return Err(PlotError::InvalidConfig(format!("variable '{}' listed twice", name)));
            }
            resolved.push(spec);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_keeps_order() {
        let resolved = PlotSchema
            .resolve(&names(&["total_steps"]), &names(&["net_reward", "episode_length"]))
            .unwrap();

        let order: Vec<&str> = resolved.iter().map(|s| s.name).collect();
        assert_eq!(order, vec!["total_steps", "net_reward", "episode_length"]);
    }

    #[test]
    fn test_unknown_variable_fails_fast() {
        let result = PlotSchema.resolve(&names(&["reward_per_parsec"]), &[]);
        assert!(matches!(result, Err(PlotError::UnknownVariable(name)) if name == "reward_per_parsec"));
    }

    #[test]
    fn test_role_mismatch_fails_fast() {
        let result = PlotSchema.resolve(&names(&["net_reward"]), &[]);
        assert!(matches!(
            result,
            Err(PlotError::RoleMismatch {
                configured: Role::Basic,
                declared: Role::Advanced,
                ..
            })
        ));
    }

    #[test]
    fn test_duplicates_rejected() {
        let result = PlotSchema.resolve(&[], &names(&["outcome", "outcome"]));
        assert!(matches!(result, Err(PlotError::InvalidConfig(_))));
    }

    #[test]
    fn test_schema_names_unique() {
        let vars = PlotSchema.variables();
        for (i, a) in vars.iter().enumerate() {
            assert!(vars[i + 1..].iter().all(|b| b.name != a.name), "{}", a.name);
        }
    }
}
