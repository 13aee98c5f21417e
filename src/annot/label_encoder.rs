use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use super::Column;

// Bijection between string labels and contiguous column ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelEncoder {
    labels: Vec<String>,
    index: HashMap<String, Column>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn insert_and_encode(&mut self, label: &str) -> Column {
        if let Some(&col) = self.index.get(label) {
            return col;
        }
        let col = self.labels.len() as Column;
        self.labels.push(label.to_owned());
        self.index.insert(label.to_owned(), col);
        col
    }

    pub fn encode(&self, label: &str) -> Option<Column> {
        self.index.get(label).copied()
    }

    pub fn decode(&self, col: Column) -> &str {
        &self.labels[col as usize]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    // Insert all labels of `other`; returns the column of each of `other`'s
    // labels in the merged encoder, in `other`'s column order.
    pub fn merge(&mut self, other: &LabelEncoder) -> Vec<Column> {
        other
            .labels
            .iter()
            .map(|l| self.insert_and_encode(l))
            .collect()
    }

    // Applies `old -> new` renames. Unknown source labels are skipped with a
    // warning; a duplicate label after renaming fails the whole operation and
    // leaves the encoder untouched.
    pub fn rename_labels(&mut self, renames: &HashMap<String, String>) -> Result<(), String> {
        let mut new_labels = self.labels.clone();
        for (from, to) in renames {
            match self.index.get(from) {
                Some(&col) => new_labels[col as usize] = to.clone(),
                None => warn!("Label '{}' not found, skipping rename", from),
            }
        }

        let mut seen = HashMap::new();
        for (i, label) in new_labels.iter().enumerate() {
            if let Some(prev) = seen.insert(label.clone(), i) {
                return Err(format!(
                    "Rename would map columns {} and {} to the same label '{}'",
                    prev, i, label
                ));
            }
        }

        self.index = new_labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i as Column))
            .collect();
        self.labels = new_labels;
        Ok(())
    }
}

impl From<Vec<String>> for LabelEncoder {
    fn from(labels: Vec<String>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i as Column))
            .collect();
        LabelEncoder { labels, index }
    }
}

impl From<LabelEncoder> for Vec<String> {
    fn from(enc: LabelEncoder) -> Self {
        enc.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let mut enc = LabelEncoder::new();
        assert_eq!(enc.insert_and_encode("sample_a"), 0);
        assert_eq!(enc.insert_and_encode("sample_b"), 1);
        assert_eq!(enc.insert_and_encode("sample_a"), 0);
        assert_eq!(enc.len(), 2);
        assert_eq!(enc.decode(1), "sample_b");
        assert_eq!(enc.encode("sample_b"), Some(1));
        assert_eq!(enc.encode("nope"), None);
    }

    #[test]
    fn merge_maps_columns() {
        let mut a = LabelEncoder::new();
        a.insert_and_encode("x");
        a.insert_and_encode("y");

        let mut b = LabelEncoder::new();
        b.insert_and_encode("y");
        b.insert_and_encode("z");

        let mapping = a.merge(&b);
        assert_eq!(mapping, vec![1, 2]);
        assert_eq!(a.decode(2), "z");
    }

    #[test]
    fn rename_duplicate_fails() {
        let mut enc = LabelEncoder::new();
        enc.insert_and_encode("a");
        enc.insert_and_encode("b");

        let renames = HashMap::from([("a".to_string(), "b".to_string())]);
        assert!(enc.rename_labels(&renames).is_err());
        // untouched on failure
        assert_eq!(enc.decode(0), "a");
    }

    #[test]
    fn rename_unknown_is_skipped() {
        let mut enc = LabelEncoder::new();
        enc.insert_and_encode("a");
        let renames = HashMap::from([
            ("a".to_string(), "a2".to_string()),
            ("ghost".to_string(), "boo".to_string()),
        ]);
        enc.rename_labels(&renames).unwrap();
        assert_eq!(enc.decode(0), "a2");
        assert_eq!(enc.encode("boo"), None);
    }

    #[test]
    fn serde_roundtrip() {
        let mut enc = LabelEncoder::new();
        enc.insert_and_encode("a");
        enc.insert_and_encode("b");
        let bytes = bincode::serialize(&enc).unwrap();
        let de: LabelEncoder = bincode::deserialize(&bytes).unwrap();
        assert_eq!(de, enc);
        assert_eq!(de.encode("b"), Some(1));
    }
}
