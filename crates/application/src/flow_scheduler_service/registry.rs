use std::collections::HashMap;

use tempora_domain::FlowSpec;

/// Flows this node currently has scheduled, keyed by uri.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecRegistry {
    specs: HashMap<String, FlowSpec>,
}

impl SpecRegistry {
    /// Records one flow and returns the previous entry for its uri.
    pub fn insert(&mut self, flow_spec: FlowSpec) -> Option<FlowSpec> {
        self.specs.insert(flow_spec.uri().to_owned(), flow_spec)
    }

    /// Drops one uri and returns its entry.
    pub fn remove(&mut self, uri: &str) -> Option<FlowSpec> {
        self.specs.remove(uri)
    }

    /// Returns the entry for one uri.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&FlowSpec> {
        self.specs.get(uri)
    }

    /// Returns scheduled uris, sorted.
    #[must_use]
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.specs.keys().cloned().collect();
        uris.sort();
        uris
    }

    /// Returns `(uri, version)` pairs, sorted by uri.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .specs
            .values()
            .map(|spec| (spec.uri().to_owned(), spec.version().to_owned()))
            .collect();
        entries.sort();
        entries
    }

    /// Returns the number of scheduled flows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }
}
