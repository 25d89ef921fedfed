use serde::{ser::SerializeMap, Serialize, Serializer};

/// Value of a form field: one value, or every value when the name repeats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FieldValue {
    fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => {
                let first = std::mem::take(first);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(values) => values.push(value),
        }
    }

    /// All values in submission order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Flattened form data, in order of first appearance of each field name.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormFields {
    entries: Vec<(String, FieldValue)>,
}

impl FormFields {
    /// Adds one submitted `(name, value)` pair.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, field)) => field.push(value),
            None => self.entries.push((name, FieldValue::Single(value))),
        }
    }

    /// Parses an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(body: &str) -> Self {
        serialize_form(url::form_urlencoded::parse(body.as_bytes()))
    }

    /// Value submitted under `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Fields in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object with the same key order as [`iter`](Self::iter).
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    FieldValue::Single(value) => serde_json::Value::from(value.as_str()),
                    FieldValue::Multiple(values) => serde_json::Value::from(values.clone()),
                };
                (name.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl Serialize for FormFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Collapses submitted `(name, value)` pairs into [`FormFields`].
///
/// Repeated names (checkbox groups, multi-selects) become an ordered
/// [`FieldValue::Multiple`].
pub fn serialize_form<I, K, V>(entries: I) -> FormFields
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut fields = FormFields::default();
    for (name, value) in entries {
        fields.push(name, value);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::{serialize_form, FieldValue, FormFields};

    #[test]
    fn repeated_names_collapse_into_ordered_sequence() {
        let fields = serialize_form([
            ("name", "Kit"),
            ("topping", "olive"),
            ("size", "large"),
            ("topping", "basil"),
            ("topping", "garlic"),
        ]);

        assert_eq!(fields.len(), 3);
        assert_eq!(
            fields.get("name"),
            Some(&FieldValue::Single("Kit".to_owned()))
        );
        assert_eq!(
            fields.get("topping").map(FieldValue::values),
            Some(vec!["olive", "basil", "garlic"])
        );
    }

    #[test]
    fn serializes_to_object_in_first_seen_order() {
        let fields = serialize_form([("z", "1"), ("a", "2"), ("z", "3")]);
        let json = serde_json::to_string(&fields).expect("form fields serialize");
        assert_eq!(json, r#"{"z":["1","3"],"a":"2"}"#);
    }

    #[test]
    fn to_json_keeps_first_seen_key_order() {
        let fields = serialize_form([("z", "1"), ("a", "2"), ("m", "3"), ("z", "4")]);
        let expected = r#"{"z":["1","4"],"a":"2","m":"3"}"#;
        assert_eq!(fields.to_json().to_string(), expected);
        assert_eq!(
            serde_json::to_string(&fields).expect("form fields serialize"),
            expected
        );
    }

    #[test]
    fn parses_urlencoded_body() {
        let fields = FormFields::from_urlencoded("q=rust+async&tag=a&tag=b%26c");
        assert_eq!(
            fields.get("q"),
            Some(&FieldValue::Single("rust async".to_owned()))
        );
        assert_eq!(
            fields.get("tag"),
            Some(&FieldValue::Multiple(vec!["a".to_owned(), "b&c".to_owned()]))
        );
        assert_eq!(
            fields.to_json(),
            serde_json::json!({ "q": "rust async", "tag": ["a", "b&c"] })
        );
    }

    #[test]
    fn empty_form_is_empty_object() {
        let fields = serialize_form(Vec::<(String, String)>::new());
        assert!(fields.is_empty());
        assert_eq!(fields.to_json(), serde_json::json!({}));
    }
}
