use std::{collections::HashMap, fmt, sync::Arc};

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

/// Seconds spent per application. Iteration follows the order in which applications were first
/// seen, so tables and reports stay stable between refreshes.
#[derive(Debug, Clone, Default)]
pub struct UsageTable {
    entries: Vec<(Arc<str>, u64)>,
    index: HashMap<Arc<str>, usize>,
}

impl UsageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one observed second for `app_name`.
    pub fn increment(&mut self, app_name: &str) {
        self.add(app_name, 1);
    }

    /// Adds `seconds` to `app_name`, inserting it at the end when it's new.
    pub fn add(&mut self, app_name: &str, seconds: u64) {
        match self.index.get(app_name) {
            Some(&position) => self.entries[position].1 += seconds,
            None => {
                let name: Arc<str> = app_name.into();
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, seconds));
            }
        }
    }

    /// Adds every entry of `other`, keeping this table's order and appending unseen names.
    pub fn merge(&mut self, other: &UsageTable) {
        for (name, seconds) in other.iter() {
            self.add(name, seconds);
        }
    }

    pub fn get(&self, app_name: &str) -> Option<u64> {
        self.index
            .get(app_name)
            .map(|&position| self.entries[position].1)
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, seconds)| seconds).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(name, seconds)| (name.as_ref(), *seconds))
    }
}

impl PartialEq for UsageTable {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for UsageTable {}

impl<S: AsRef<str>> FromIterator<(S, u64)> for UsageTable {
    fn from_iter<T: IntoIterator<Item = (S, u64)>>(iter: T) -> Self {
        let mut table = UsageTable::new();
        for (name, seconds) in iter {
            table.add(name.as_ref(), seconds);
        }
        table
    }
}

impl Serialize for UsageTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, seconds) in &self.entries {
            map.serialize_entry(name.as_ref(), seconds)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for UsageTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = UsageTable;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping application names to seconds")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = UsageTable::new();
                // Duplicate keys are summed rather than rejected.
                while let Some((name, seconds)) = access.next_entry::<String, u64>()? {
                    table.add(&name, seconds);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
