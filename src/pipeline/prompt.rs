//! Prompt building for pipeline steps
//!
//! A prompt is a structured context block (`label: value` lines) followed by
//! the step's instruction body. The body is opaque static text: it is never
//! scanned for placeholders, so characters in dynamic values can never collide
//! with a template syntax.

/// Ordered `label → value` mapping for the context block.
///
/// Insertion order is display order. Inserting an existing label is a no-op,
/// so later contributors can never overwrite earlier values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextFields {
    entries: Vec<(String, String)>,
}

impl ContextFields {
    /// Create an empty mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert a field unless the label is already present.
    ///
    /// Returns `true` when the field was added.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) -> bool {
        let label = label.into();
        if self.contains(&label) {
            return false;
        }
        self.entries.push((label, value.into()));
        true
    }

    /// Add every field of `other` that is not already present.
    pub fn merge(&mut self, other: &Self) {
        for (label, value) in other.iter() {
            self.insert(label, value);
        }
    }

    /// Look up a value by label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == label)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a label is present.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == label)
    }

    /// Iterate fields in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render one `label: value` line per field.
    #[must_use]
    pub fn render(&self) -> String {
        self.iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ContextFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (label, value) in iter {
            fields.insert(label, value);
        }
        fields
    }
}

/// A step prompt kept as its two parts until it is sent to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Dynamic context
    pub context: ContextFields,
    /// Static instruction body, passed through verbatim
    pub body: String,
}

impl Prompt {
    /// Pair a context block with an instruction body.
    #[must_use]
    pub fn new(context: ContextFields, body: impl Into<String>) -> Self {
        Self {
            context,
            body: body.into(),
        }
    }

    /// Render the full prompt text.
    #[must_use]
    pub fn render(&self) -> String {
        build(&self.context, &self.body)
    }
}

/// Concatenate the rendered context block with the literal instruction body.
///
/// With no context the body is returned unchanged. Pure: identical inputs
/// always produce identical output.
#[must_use]
pub fn build(context: &ContextFields, body: &str) -> String {
    if context.is_empty() {
        return body.to_string();
    }
    format!("{}\n\n---\n\n{body}", context.render())
}
