use bytes::Bytes;

/// Suffix that marks a metadata name as carrying binary values.
pub const BINARY_SUFFIX: &str = "-bin";

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Ascii(String),
    Binary(Bytes),
}

impl MetadataValue {
    /// The value as text, if it is an ASCII value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Ascii(value) => Some(value),
            Self::Binary(_) => None,
        }
    }

    /// The value as raw bytes, for either kind.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ascii(value) => value.as_bytes(),
            Self::Binary(value) => value.as_ref(),
        }
    }
}

/// Ordered multimap of header/trailer entries.
///
/// Names are stored lower-cased. Insertion order is preserved and the same
/// name may appear more than once. The container is opaque to the call
/// drivers: they hand it to the transport on `start` and surface whatever the
/// transport delivers back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ASCII value under `name`.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries.push((
            name.as_ref().to_ascii_lowercase(),
            MetadataValue::Ascii(value.into()),
        ));
    }

    /// Append a binary value under `name`, adding the `-bin` suffix if missing.
    pub fn insert_bin(&mut self, name: impl AsRef<str>, value: impl Into<Bytes>) {
        let mut name = name.as_ref().to_ascii_lowercase();
        if !name.ends_with(BINARY_SUFFIX) {
            name.push_str(BINARY_SUFFIX);
        }
        self.entries.push((name, MetadataValue::Binary(value.into())));
    }

    /// First ASCII value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_value(name).and_then(MetadataValue::as_str)
    }

    /// First binary value stored under `name`.
    pub fn get_bin(&self, name: &str) -> Option<&Bytes> {
        match self.get_value(name)? {
            MetadataValue::Binary(value) => Some(value),
            MetadataValue::Ascii(_) => None,
        }
    }

    /// First value of either kind stored under `name`.
    pub fn get_value(&self, name: &str) -> Option<&MetadataValue> {
        self.get_all(name).next()
    }

    /// All values stored under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a MetadataValue> + 'a {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(move |(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get_value(name).is_some()
    }

    /// Remove every value stored under `name`, returning how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let name = name.to_ascii_lowercase();
        let before = self.entries.len();
        self.entries.retain(|(key, _)| *key != name);
        before - self.entries.len()
    }

    /// Append all entries of `other`, keeping their order.
    pub fn merge(&mut self, other: Metadata) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (name, value) in iter {
            metadata.insert(name, value);
        }
        metadata
    }
}
