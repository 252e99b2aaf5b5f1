//! Grouping of unit descriptors by artifact, then by declaring class.

use std::collections::BTreeMap;

use crate::model::UnitDescriptor;

/// Units of one artifact keyed by class full name.
pub type ClassUnits = BTreeMap<String, Vec<UnitDescriptor>>;

/// `artifact -> class -> units`, in arrival order within each class.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    artifacts: BTreeMap<String, ClassUnits>,
}

impl Hierarchy {
    /// Group `units`. A unit whose id already appears under the same artifact is dropped, so each unit maps to at
    /// most one job.
    pub fn build<I>(units: I) -> Self
    where
        I: IntoIterator<Item = UnitDescriptor>,
    {
        let mut artifacts: BTreeMap<String, ClassUnits> = BTreeMap::new();
        for unit in units {
            let class = unit.class_name().to_string();
            let group = artifacts.entry(unit.artifact.clone()).or_default().entry(class).or_default();
            if group.iter().any(|u| u.id == unit.id) {
                continue;
            }
            group.push(unit);
        }
        Self { artifacts }
    }

    pub fn artifacts(&self) -> impl Iterator<Item = (&str, &ClassUnits)> {
        self.artifacts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn classes(&self, artifact: &str) -> Option<&ClassUnits> {
        self.artifacts.get(artifact)
    }

    pub fn unit_count(&self) -> usize {
        self.artifacts.values().flat_map(|classes| classes.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
