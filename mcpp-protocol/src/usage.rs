use serde::Deserialize;
use serde::Serialize;

use crate::target::Target;

/// The usage hierarchy: `display < process < store < transfer`.
///
/// `Ord` is derived from declaration order, which is why the variants are
/// listed least to most restrictive — `display < Self::Transfer` holds
/// directly from the derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataUsage {
    Display,
    Process,
    Store,
    Transfer,
}

impl DataUsage {
    pub const ALL: [DataUsage; 4] = [
        DataUsage::Display,
        DataUsage::Process,
        DataUsage::Store,
        DataUsage::Transfer,
    ];

    /// Levels at or below `self` in the hierarchy, used when an `allow` at a
    /// higher level must imply `allow` at every lower level.
    pub fn implied_levels(self) -> impl Iterator<Item = DataUsage> {
        Self::ALL.into_iter().filter(move |lvl| *lvl <= self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataUsage::Display => "display",
            DataUsage::Process => "process",
            DataUsage::Store => "store",
            DataUsage::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for DataUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requester {
    pub host_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageContext {
    pub data_usage: DataUsage,
    pub requester: Requester,
    pub target: Target,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_orders_least_to_most_restrictive() {
        assert!(DataUsage::Display < DataUsage::Process);
        assert!(DataUsage::Process < DataUsage::Store);
        assert!(DataUsage::Store < DataUsage::Transfer);
    }

    #[test]
    fn implied_levels_are_monotonic() {
        let implied: Vec<_> = DataUsage::Store.implied_levels().collect();
        assert_eq!(implied, vec![DataUsage::Display, DataUsage::Process, DataUsage::Store]);
    }
}
