use std::collections::BTreeMap;

/// An ordered stack of named key/value sources. Later layers override earlier ones,
/// so the merge order is the push order and can be inspected with `provenance`.
#[derive(Clone, Debug)]
pub struct LayeredLookup<V> {
    layers: Vec<(String, BTreeMap<String, V>)>,
}

impl<V> Default for LayeredLookup<V> {
    fn default() -> Self {
        LayeredLookup { layers: vec![] }
    }
}

impl<V: Clone> LayeredLookup<V> {
    pub fn new() -> Self {
        LayeredLookup { layers: vec![] }
    }

    /// Adds a layer above every existing one.
    pub fn push_layer(&mut self, name: impl Into<String>, values: BTreeMap<String, V>) {
        self.layers.push((name.into(), values));
    }

    pub fn with_layer(mut self, name: impl Into<String>, values: BTreeMap<String, V>) -> Self {
        self.push_layer(name, values);
        self
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.layers.iter().rev().find_map(|(_, m)| m.get(key))
    }

    /// Name of the layer that supplies `key`.
    pub fn provenance(&self, key: &str) -> Option<&str> {
        self.layers.iter().rev().find(|(_, m)| m.contains_key(key)).map(|(n, _)| n.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.layers.iter().any(|(_, m)| m.contains_key(key))
    }

    /// Collapses all layers into one map using the override order.
    pub fn flatten(&self) -> BTreeMap<String, V> {
        let mut merged = BTreeMap::new();
        for (_, values) in self.layers.iter() {
            for (k, v) in values.iter() {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    /// Number of keys each layer contributes to the flattened result.
    pub fn contributions(&self) -> Vec<(String, usize)> {
        let flat_sources: BTreeMap<&str, &str> = self
            .layers
            .iter()
            .flat_map(|(n, m)| m.keys().map(move |k| (k.as_str(), n.as_str())))
            .collect();
        self.layers
            .iter()
            .map(|(n, _)| (n.clone(), flat_sources.values().filter(|v| **v == n.as_str()).count()))
            .collect()
    }
}
