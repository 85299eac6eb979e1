//! Shared literal text constants.

use indexmap::IndexMap;

/// Prefix of generated literal constant names.
pub const LITERAL_PREFIX: &str = "builtin";

/// Distinct literal byte runs → constant name, in first-seen order.
///
/// Byte-identical text anywhere in one compile request resolves to the same
/// constant; nothing is normalized.
#[derive(Debug, Clone, Default)]
pub struct LiteralTable {
    entries: IndexMap<Vec<u8>, String>,
}

impl LiteralTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant name for `bytes`, allocating `builtinN` on first sight.
    pub fn intern(&mut self, bytes: &[u8]) -> String {
        if let Some(name) = self.entries.get(bytes) {
            return name.clone();
        }
        let name = format!("{LITERAL_PREFIX}{}", self.entries.len());
        self.entries.insert(bytes.to_vec(), name.clone());
        name
    }

    /// `(name, bytes)` pairs in insertion order.
    pub fn constants(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(bytes, name)| (name.as_str(), bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_share_a_constant() {
        let mut table = LiteralTable::new();
        assert_eq!(table.intern(b" "), "builtin0");
        assert_eq!(table.intern(b"hello"), "builtin1");
        assert_eq!(table.intern(b" "), "builtin0");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn no_normalization() {
        let mut table = LiteralTable::new();
        assert_ne!(table.intern(b"a\n"), table.intern(b"a\r\n"));
        assert_ne!(table.intern(b"A"), table.intern(b"a"));
    }

    #[test]
    fn constants_keep_insertion_order() {
        let mut table = LiteralTable::new();
        table.intern(b"z");
        table.intern(b"a");
        let names: Vec<&str> = table.constants().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["builtin0", "builtin1"]);
    }
}
