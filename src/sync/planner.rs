//! Reconciliation planning.
//!
//! Works out which source items the target lacks or holds with different
//! content. Both inventories key their entries relative to their own
//! namespace root, so a source path is looked up in the target unchanged.
//! Anchoring under the target prefix happens when locators are built.

use crate::sync::exclude::ExcludePatterns;
use crate::sync::inventory::Inventory;

/// Relative paths that must be copied from source to target, sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    paths: Vec<String>,
}

impl Plan {
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn into_paths(self) -> Vec<String> {
        self.paths
    }
}

/// A path is planned when the target has no entry for it or the digests
/// differ as strings. Output order is lexicographic.
pub fn plan(source: &Inventory, target: &Inventory) -> Plan {
    plan_filtered(source, target, &ExcludePatterns::new())
}

/// Same as [`plan`], leaving out source paths matched by `excludes`.
pub fn plan_filtered(source: &Inventory, target: &Inventory, excludes: &ExcludePatterns) -> Plan {
    let paths = source
        .iter()
        .filter(|(path, _)| !excludes.is_excluded(path))
        .filter(|(path, digest)| target.get(path) != Some(*digest))
        .map(|(path, _)| path.to_string())
        .collect();

    Plan { paths }
}
