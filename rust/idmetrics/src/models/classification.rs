use crate::errors::{
    IdMetricsError,
    Result,
};
use serde::Serialize;

/// Classification tag attached to a scalar observation.
///
/// The taxonomy is a static two-level tree: target/decoy refine the
/// identified spectra, identified/unidentified refine the full spectrum set.
/// Siblings are mutually exclusive when a rendered view is single-select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DataClass {
    All,
    AllSpectra,
    IdentifiedSpectra,
    UnidentifiedSpectra,
    IdentifiedTarget,
    IdentifiedDecoy,
}

impl DataClass {
    pub const MEMBERS: [DataClass; 6] = [
        DataClass::All,
        DataClass::AllSpectra,
        DataClass::IdentifiedSpectra,
        DataClass::UnidentifiedSpectra,
        DataClass::IdentifiedTarget,
        DataClass::IdentifiedDecoy,
    ];

    /// Display title. Unique across members, so `find_by_title` is total.
    pub fn title(&self) -> &'static str {
        match self {
            DataClass::All => "All",
            DataClass::AllSpectra => "All Spectra",
            DataClass::IdentifiedSpectra => "Identified Spectra",
            DataClass::UnidentifiedSpectra => "Unidentified Spectra",
            DataClass::IdentifiedTarget => "Target",
            DataClass::IdentifiedDecoy => "Decoy",
        }
    }

    pub fn find_by_title(title: &str) -> Result<DataClass> {
        Self::MEMBERS
            .iter()
            .copied()
            .find(|c| c.title() == title)
            .ok_or_else(|| IdMetricsError::ClassificationNotFound {
                title: title.to_string(),
            })
    }

    pub fn parent(&self) -> Option<DataClass> {
        match self {
            DataClass::All => None,
            DataClass::AllSpectra => Some(DataClass::All),
            DataClass::IdentifiedSpectra | DataClass::UnidentifiedSpectra => {
                Some(DataClass::AllSpectra)
            }
            DataClass::IdentifiedTarget | DataClass::IdentifiedDecoy => {
                Some(DataClass::IdentifiedSpectra)
            }
        }
    }

    pub fn children(&self) -> &'static [DataClass] {
        match self {
            DataClass::All => &[DataClass::AllSpectra],
            DataClass::AllSpectra => {
                &[DataClass::IdentifiedSpectra, DataClass::UnidentifiedSpectra]
            }
            DataClass::IdentifiedSpectra => {
                &[DataClass::IdentifiedTarget, DataClass::IdentifiedDecoy]
            }
            _ => &[],
        }
    }

    /// All children of this member's parent, this member included.
    pub fn siblings(&self) -> &'static [DataClass] {
        match self.parent() {
            Some(parent) => parent.children(),
            None => &[],
        }
    }
}
