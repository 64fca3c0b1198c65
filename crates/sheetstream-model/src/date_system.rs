use serde::{Deserialize, Serialize};

/// Excel workbook date system used to interpret serial date values.
///
/// Excel supports two base date systems:
/// - `Excel1900` (default on Windows; includes the Lotus 1-2-3 leap year bug)
/// - `Excel1904` (default on older Mac versions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateSystem {
    #[default]
    #[serde(rename = "excel1900")]
    Excel1900,
    #[serde(rename = "excel1904")]
    Excel1904,
}

impl DateSystem {
    /// Whether `workbookPr/@date1904` must be set for this system.
    pub const fn is_1904(self) -> bool {
        matches!(self, DateSystem::Excel1904)
    }
}
