// ============================================================
// Layer 3 — SourceTarget Domain Type
// ============================================================
// Experiments are always run on an ordered pair of domains,
// written on the command line and in directory names as
// "<source>_<target>", e.g. "slate_travel" or "fiction_government".
//
// The source domain has labels we train on; the target domain
// is the one we want the model to transfer to.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceTarget {
    pub source: String,
    pub target: String,
}

impl SourceTarget {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { source: source.into(), target: target.into() }
    }
}

impl FromStr for SourceTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('_').collect();
        match parts.as_slice() {
            [source, target] if !source.is_empty() && !target.is_empty() => {
                Ok(Self::new(*source, *target))
            }
            _ => bail!(
                "invalid source/target '{s}': expected exactly '<source>_<target>'"
            ),
        }
    }
}

impl TryFrom<String> for SourceTarget {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SourceTarget> for String {
    fn from(st: SourceTarget) -> Self {
        st.to_string()
    }
}

impl fmt::Display for SourceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.source, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_pair() {
        let st: SourceTarget = "slate_travel".parse().unwrap();
        assert_eq!(st.source, "slate");
        assert_eq!(st.target, "travel");
        assert_eq!(st.to_string(), "slate_travel");
    }

    #[test]
    fn test_rejects_missing_or_extra_parts() {
        assert!("slate".parse::<SourceTarget>().is_err());
        assert!("slate_".parse::<SourceTarget>().is_err());
        assert!("_travel".parse::<SourceTarget>().is_err());
        assert!("a_b_c".parse::<SourceTarget>().is_err());
    }

    #[test]
    fn test_serialises_as_plain_string() {
        let st = SourceTarget::new("fiction", "government");
        let json = serde_json::to_string(&st).unwrap();
        assert_eq!(json, "\"fiction_government\"");
        let back: SourceTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(back, st);
    }
}
