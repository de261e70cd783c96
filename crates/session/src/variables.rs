use std::collections::HashMap;

/// A mapping from variable name to its last observed stringified value,
/// overwritten on each capture (§3). Scope is the whole session; name
/// collisions across templates overwrite, matching the adapter's flat
/// "Context Variables" scope.
#[derive(Debug, Default)]
pub struct VariableStore {
    values: HashMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_capture_overwrites_earlier() {
        let mut store = VariableStore::new();
        store.capture("x", "1");
        store.capture("x", "2");
        assert_eq!(store.get("x"), Some("2"));
    }

    #[test]
    fn clear_empties_the_store() {
        let mut store = VariableStore::new();
        store.capture("x", "1");
        store.clear();
        assert_eq!(store.get("x"), None);
    }
}
