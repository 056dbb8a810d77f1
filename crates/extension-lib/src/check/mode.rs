//! Check modes and their pass/fail rules

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How many ready replicas a check requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckMode {
    #[serde(alias = "podCountMin1")]
    ReadyAtLeastOne,
    #[serde(alias = "podCountEqualsDesiredCount")]
    ReadyEqualsDesired,
    /// Passes whenever ready differs from desired, including ready > desired
    #[serde(alias = "podCountLessThanDesiredCount")]
    ReadyLessThanDesired,
}

/// Counts observed for a check subject at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub ready: i32,
    pub desired: Option<i32>,
}

struct ModeRule {
    name: &'static str,
    needs_desired: bool,
    passes: fn(i32, i32) -> bool,
    failure: fn(&str, &str, i32, i32) -> String,
}

// indexed by `CheckMode as usize`
static RULES: [ModeRule; 3] = [
    ModeRule {
        name: "ready-at-least-one",
        needs_desired: false,
        passes: |ready, _| ready >= 1,
        failure: |target, unit, _, _| format!("{target} has no ready {unit}."),
    },
    ModeRule {
        name: "ready-equals-desired",
        needs_desired: true,
        passes: |ready, desired| ready == desired,
        failure: |target, unit, ready, desired| {
            format!("{target} has only {ready} of desired {desired} {unit} ready.")
        },
    },
    ModeRule {
        name: "ready-less-than-desired",
        needs_desired: true,
        passes: |ready, desired| ready != desired,
        failure: |target, unit, _, desired| format!("{target} has all {desired} desired {unit} ready."),
    },
];

impl CheckMode {
    pub const ALL: [CheckMode; 3] = [
        CheckMode::ReadyAtLeastOne,
        CheckMode::ReadyEqualsDesired,
        CheckMode::ReadyLessThanDesired,
    ];

    fn rule(self) -> &'static ModeRule {
        &RULES[self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        self.rule().name
    }

    pub fn needs_desired_count(&self) -> bool {
        self.rule().needs_desired
    }

    /// Failure title when `counts` do not satisfy the mode, `None` on pass.
    /// A missing desired count is treated as zero; callers reject it first
    /// for modes that need one.
    pub fn evaluate(&self, target: &str, unit: &str, counts: Counts) -> Option<String> {
        let rule = self.rule();
        let desired = counts.desired.unwrap_or(0);
        if (rule.passes)(counts.ready, desired) {
            None
        } else {
            Some((rule.failure)(target, unit, counts.ready, desired))
        }
    }
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown check mode {0:?}")]
pub struct UnknownMode(pub String);

impl FromStr for CheckMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}
