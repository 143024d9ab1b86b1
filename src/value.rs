//! The nested model value type shared by binding, validation and serialization.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::sync::Arc;

/// An in-memory binary attachment (the equivalent of a file selected in a
/// form). Carried by reference so cloning a model stays cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
	name: Option<String>,
	content_type: String,
	bytes: Arc<Vec<u8>>,
}

impl Blob {
	/// Create a blob from raw bytes and a MIME content type.
	///
	/// # Examples
	///
	/// ```
	/// use formbind::Blob;
	///
	/// let blob = Blob::new(b"%PDF-1.4".to_vec(), "application/pdf");
	/// assert_eq!(blob.content_type(), "application/pdf");
	/// assert_eq!(blob.len(), 8);
	/// ```
	pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
		Self {
			name: None,
			content_type: content_type.into(),
			bytes: Arc::new(bytes),
		}
	}

	/// Set the original file name.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	pub fn content_type(&self) -> &str {
		&self.content_type
	}

	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}

/// A value stored in a form model: a scalar, an ordered mapping, an array or
/// a binary blob.
///
/// Object entries preserve insertion order, which is what gives the
/// serialization engine its stable key ordering.
///
/// # Examples
///
/// ```
/// use formbind::ModelValue;
///
/// let model = ModelValue::object([
///     ("name", ModelValue::from("Ada")),
///     ("age", ModelValue::from(36)),
/// ]);
/// assert_eq!(model.get_path("name"), Some(&ModelValue::from("Ada")));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModelValue {
	#[default]
	Null,
	Bool(bool),
	Number(f64),
	String(String),
	Array(Vec<ModelValue>),
	Object(IndexMap<String, ModelValue>),
	Blob(Blob),
}

impl ModelValue {
	/// Build an object value from an ordered sequence of entries.
	pub fn object<K, I>(entries: I) -> Self
	where
		K: Into<String>,
		I: IntoIterator<Item = (K, ModelValue)>,
	{
		ModelValue::Object(
			entries
				.into_iter()
				.map(|(k, v)| (k.into(), v))
				.collect::<IndexMap<_, _>>(),
		)
	}

	/// Build an array value.
	pub fn array<I: IntoIterator<Item = ModelValue>>(items: I) -> Self {
		ModelValue::Array(items.into_iter().collect())
	}

	pub fn is_null(&self) -> bool {
		matches!(self, ModelValue::Null)
	}

	pub fn is_object(&self) -> bool {
		matches!(self, ModelValue::Object(_))
	}

	pub fn is_array(&self) -> bool {
		matches!(self, ModelValue::Array(_))
	}

	pub fn is_blob(&self) -> bool {
		matches!(self, ModelValue::Blob(_))
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			ModelValue::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&IndexMap<String, ModelValue>> {
		match self {
			ModelValue::Object(map) => Some(map),
			_ => None,
		}
	}

	/// Whether the value counts as "set" for model binding purposes.
	///
	/// Null and the empty string are unset; everything else (including
	/// `false`, `0` and empty arrays) is set.
	///
	/// # Examples
	///
	/// ```
	/// use formbind::ModelValue;
	///
	/// assert!(!ModelValue::Null.is_set());
	/// assert!(!ModelValue::from("").is_set());
	/// assert!(ModelValue::from(0).is_set());
	/// assert!(ModelValue::array([]).is_set());
	/// ```
	pub fn is_set(&self) -> bool {
		!matches!(self, ModelValue::Null)
			&& !matches!(self, ModelValue::String(s) if s.is_empty())
	}

	/// Script-style truthiness: null, `false`, `0`, `NaN` and the empty
	/// string are falsy; arrays, objects and blobs are always truthy.
	pub fn is_falsy(&self) -> bool {
		match self {
			ModelValue::Null => true,
			ModelValue::Bool(b) => !b,
			ModelValue::Number(n) => *n == 0.0 || n.is_nan(),
			ModelValue::String(s) => s.is_empty(),
			ModelValue::Array(_) | ModelValue::Object(_) | ModelValue::Blob(_) => false,
		}
	}

	pub fn is_truthy(&self) -> bool {
		!self.is_falsy()
	}

	/// Numeric coercion following `Number()` semantics: null and the empty
	/// string become `0`, booleans become `0`/`1`, unparsable or structured
	/// values yield `None` (the equivalent of `NaN`).
	pub fn to_number(&self) -> Option<f64> {
		match self {
			ModelValue::Null => Some(0.0),
			ModelValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
			ModelValue::Number(n) => {
				if n.is_nan() {
					None
				} else {
					Some(*n)
				}
			}
			ModelValue::String(s) => {
				let trimmed = s.trim();
				if trimmed.is_empty() {
					Some(0.0)
				} else {
					trimmed.parse::<f64>().ok()
				}
			}
			ModelValue::Array(_) | ModelValue::Object(_) | ModelValue::Blob(_) => None,
		}
	}

	/// Textual coercion used by the text validators and the serializers.
	///
	/// Numbers drop a trailing `.0`, arrays join their elements with commas
	/// and null renders as the empty string.
	pub fn to_text(&self) -> String {
		match self {
			ModelValue::Null => String::new(),
			ModelValue::Bool(b) => b.to_string(),
			ModelValue::Number(n) => format_number(*n),
			ModelValue::String(s) => s.clone(),
			ModelValue::Array(items) => items
				.iter()
				.map(|v| v.to_text())
				.collect::<Vec<_>>()
				.join(","),
			ModelValue::Object(_) => "[object]".to_string(),
			ModelValue::Blob(blob) => blob.name().unwrap_or("[blob]").to_string(),
		}
	}

	/// Serialize the value to a JSON string. Blobs render as empty objects
	/// (they carry no JSON-representable payload).
	pub fn json_string(&self) -> String {
		// ModelValue's Serialize impl is infallible
		serde_json::to_string(self).unwrap_or_default()
	}

	/// Loose scalar equality: numbers, numeric strings and booleans compare
	/// by numeric value, everything else by structure.
	///
	/// # Examples
	///
	/// ```
	/// use formbind::ModelValue;
	///
	/// assert!(ModelValue::from(1).loose_eq(&ModelValue::from("1")));
	/// assert!(!ModelValue::from("a").loose_eq(&ModelValue::from("b")));
	/// ```
	pub fn loose_eq(&self, other: &ModelValue) -> bool {
		use ModelValue::*;
		match (self, other) {
			(Number(_) | Bool(_), String(_))
			| (String(_), Number(_) | Bool(_))
			| (Number(_), Bool(_))
			| (Bool(_), Number(_)) => match (self.to_number(), other.to_number()) {
				(Some(a), Some(b)) => a == b,
				_ => false,
			},
			_ => self == other,
		}
	}

	/// Look up a nested value by dotted path. An empty path addresses the
	/// value itself.
	pub fn get_path(&self, path: &str) -> Option<&ModelValue> {
		if path.is_empty() {
			return Some(self);
		}
		let mut current = self;
		for segment in path.split('.') {
			current = current.as_object()?.get(segment)?;
		}
		Some(current)
	}

	/// Write a nested value at a dotted path, creating (or coercing) every
	/// missing intermediate object along the way. An empty path replaces the
	/// value wholesale.
	pub fn set_path(&mut self, path: &str, value: ModelValue) {
		if path.is_empty() {
			*self = value;
			return;
		}
		if !self.is_object() {
			*self = ModelValue::Object(IndexMap::new());
		}
		let mut current = self;
		let mut segments = path.split('.').peekable();
		while let Some(segment) = segments.next() {
			let ModelValue::Object(map) = current else {
				// coerced below before descending, so this cannot be hit
				return;
			};
			if segments.peek().is_none() {
				map.insert(segment.to_string(), value);
				return;
			}
			let entry = map
				.entry(segment.to_string())
				.or_insert_with(|| ModelValue::Object(IndexMap::new()));
			if !entry.is_object() {
				*entry = ModelValue::Object(IndexMap::new());
			}
			current = entry;
		}
	}
}

impl From<bool> for ModelValue {
	fn from(value: bool) -> Self {
		ModelValue::Bool(value)
	}
}

impl From<f64> for ModelValue {
	fn from(value: f64) -> Self {
		ModelValue::Number(value)
	}
}

impl From<i64> for ModelValue {
	fn from(value: i64) -> Self {
		ModelValue::Number(value as f64)
	}
}

impl From<i32> for ModelValue {
	fn from(value: i32) -> Self {
		ModelValue::Number(value as f64)
	}
}

impl From<&str> for ModelValue {
	fn from(value: &str) -> Self {
		ModelValue::String(value.to_string())
	}
}

impl From<String> for ModelValue {
	fn from(value: String) -> Self {
		ModelValue::String(value)
	}
}

impl From<Blob> for ModelValue {
	fn from(value: Blob) -> Self {
		ModelValue::Blob(value)
	}
}

impl From<serde_json::Value> for ModelValue {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => ModelValue::Null,
			serde_json::Value::Bool(b) => ModelValue::Bool(b),
			serde_json::Value::Number(n) => ModelValue::Number(n.as_f64().unwrap_or(f64::NAN)),
			serde_json::Value::String(s) => ModelValue::String(s),
			serde_json::Value::Array(items) => {
				ModelValue::Array(items.into_iter().map(ModelValue::from).collect())
			}
			serde_json::Value::Object(map) => ModelValue::Object(
				map.into_iter().map(|(k, v)| (k, ModelValue::from(v))).collect(),
			),
		}
	}
}

impl Serialize for ModelValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			ModelValue::Null => serializer.serialize_unit(),
			ModelValue::Bool(b) => serializer.serialize_bool(*b),
			ModelValue::Number(n) => {
				// JSON has no NaN/Infinity; follow JSON.stringify and emit null
				if n.is_finite() {
					if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
						serializer.serialize_i64(*n as i64)
					} else {
						serializer.serialize_f64(*n)
					}
				} else {
					serializer.serialize_unit()
				}
			}
			ModelValue::String(s) => serializer.serialize_str(s),
			ModelValue::Array(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			ModelValue::Object(map) => {
				let mut obj = serializer.serialize_map(Some(map.len()))?;
				for (key, value) in map {
					obj.serialize_entry(key, value)?;
				}
				obj.end()
			}
			// blobs have no JSON payload, matching JSON.stringify(blob) => {}
			ModelValue::Blob(_) => serializer.serialize_map(Some(0))?.end(),
		}
	}
}

/// Format a number the way script runtimes do: integral values print without
/// a decimal point.
pub(crate) fn format_number(n: f64) -> String {
	if n.is_nan() {
		"NaN".to_string()
	} else if n.is_infinite() {
		if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
	} else if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
		format!("{}", n as i64)
	} else {
		format!("{}", n)
	}
}
