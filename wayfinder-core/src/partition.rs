//! Coarse spatial regions and the schemes that define them

use core::fmt;

use serde::{Deserialize, Serialize};

/// Label used by the unpartitioned scheme's single regressor pair
pub const FULL_LABEL: &str = "full";

/// Canonical region order of the five-partition scheme
pub const FIVE_PARTITION_LABELS: [&str; 5] = ["upperleft", "lowerleft", "middle", "upperright", "lowerright"];

/// How a building's floor is split into regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionScheme {
    /// One x/y regressor pair for the whole floor, no classifier
    Full,
    ThreePartition,
    #[default]
    FivePartition,
    SevenPartition,
}

impl PartitionScheme {
    /// Directory holding this scheme's model resources
    pub const fn dir_name(&self) -> &'static str {
        match self {
            PartitionScheme::Full => "full",
            PartitionScheme::ThreePartition => "3partition",
            PartitionScheme::FivePartition => "5partition",
            PartitionScheme::SevenPartition => "7partition",
        }
    }

    pub const fn uses_classifier(&self) -> bool {
        !matches!(self, PartitionScheme::Full)
    }

    /// Labels known without a classifier; `None` when only the classifier can say
    pub fn canonical_labels(&self) -> Option<Vec<PartitionLabel>> {
        let labels: &[&str] = match self {
            PartitionScheme::Full => &[FULL_LABEL],
            PartitionScheme::FivePartition => &FIVE_PARTITION_LABELS,
            PartitionScheme::ThreePartition | PartitionScheme::SevenPartition => return None,
        };
        Some(labels.iter().map(|l| PartitionLabel::new(*l)).collect())
    }
}

/// Region tag produced by the partition classifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionLabel(String);

impl PartitionLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn full() -> Self {
        Self::new(FULL_LABEL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}
