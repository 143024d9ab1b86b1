//! The two-phase serialization pipeline.
//!
//! Phase 1 converts a nested model into an ordered list of [`KVPair`]s using
//! a *mode* (`plain`, `deep` or `json`); phase 2 encodes the pairs into a
//! transport [`Payload`] (`urlencoded`, `form-data`, `json`, `pairs` or
//! `map`). An already-serialized pairs list skips phase 1. An unrecognized
//! mode or encoding yields `None` with a diagnostic, never a panic.

use crate::value::{Blob, ModelValue};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::borrow::Cow;

/// `encodeURIComponent`-compatible escaping: alphanumerics and
/// `- _ . ! ~ * ' ( )` pass through, everything else is percent-encoded.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'!')
	.remove(b'~')
	.remove(b'*')
	.remove(b'\'')
	.remove(b'(')
	.remove(b')');

/// The value side of a serialized pair: already-rendered text, or a binary
/// blob carried by reference for multipart transports.
#[derive(Debug, Clone, PartialEq)]
pub enum KVValue {
	Text(String),
	Blob(Blob),
}

impl KVValue {
	pub fn is_blob(&self) -> bool {
		matches!(self, KVValue::Blob(_))
	}

	/// Textual rendering; blobs fall back to their file name.
	pub fn as_text(&self) -> Cow<'_, str> {
		match self {
			KVValue::Text(s) => Cow::Borrowed(s),
			KVValue::Blob(blob) => Cow::Borrowed(blob.name().unwrap_or("[blob]")),
		}
	}
}

/// The universal intermediate serialization unit.
#[derive(Debug, Clone, PartialEq)]
pub struct KVPair {
	pub key: String,
	pub value: KVValue,
}

impl KVPair {
	pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			value: KVValue::Text(value.into()),
		}
	}

	pub fn blob(key: impl Into<String>, blob: Blob) -> Self {
		Self {
			key: key.into(),
			value: KVValue::Blob(blob),
		}
	}
}

/// The encoded output of [`SerializationEngine::serialize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	/// Percent-encoded `k=v&...` string.
	UrlEncoded(String),
	/// Ordered multipart field list; the encoding whenever blobs are present.
	FormData(Vec<KVPair>),
	/// A JSON document string.
	Json(String),
	/// The unencoded intermediate pairs.
	Pairs(Vec<KVPair>),
	/// Flat key-to-value(s) map; repeated keys collapse to arrays.
	Map(serde_json::Value),
}

/// Input to the pipeline: a model to run through phase 1, or pairs that
/// already went through it.
#[derive(Debug, Clone)]
pub enum SerializeSource {
	Model(ModelValue),
	Pairs(Vec<KVPair>),
}

impl From<ModelValue> for SerializeSource {
	fn from(model: ModelValue) -> Self {
		SerializeSource::Model(model)
	}
}

impl From<Vec<KVPair>> for SerializeSource {
	fn from(pairs: Vec<KVPair>) -> Self {
		SerializeSource::Pairs(pairs)
	}
}

/// Serialization settings.
///
/// `mode` selects the phase 1 conversion (default `"plain"`); `encode_as`
/// selects the phase 2 encoding; when unset, the pairs are returned as-is.
/// The remaining knobs are mode-specific and documented on the fields.
///
/// # Examples
///
/// ```
/// use formbind::SerializeOptions;
///
/// let options = SerializeOptions::default()
///     .with_mode("plain")
///     .with_brackets()
///     .with_encoding("urlencoded");
/// assert_eq!(options.encode_as.as_deref(), Some("urlencoded"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
	pub mode: Option<String>,
	pub encode_as: Option<String>,
	/// Suffix `[]` to repeated array keys (plain) / bracket array indices
	/// (deep).
	pub use_brackets: bool,
	/// Deep mode: concatenate the array index to the key (`list0.value`)
	/// instead of dot-joining it.
	pub concat_arr_index: bool,
	/// Checkbox-style boolean handling: `false` omits the pair, `true` emits
	/// this literal.
	pub booleans: Option<String>,
	/// Plain mode: serialize arrays to JSON instead of unpacking them.
	pub json_arrays: bool,
	/// Plain mode: serialize every value to JSON.
	pub json_all: bool,
	/// Drop blob values instead of carrying them by reference.
	pub skip_files: bool,
	/// Json mode: the key holding the stringified model (default `"data"`).
	pub param_name: Option<String>,
	/// Deep mode: path prefix prepended to every key.
	pub prefix: Option<String>,
}

impl SerializeOptions {
	pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
		self.mode = Some(mode.into());
		self
	}

	pub fn with_encoding(mut self, encode_as: impl Into<String>) -> Self {
		self.encode_as = Some(encode_as.into());
		self
	}

	pub fn with_brackets(mut self) -> Self {
		self.use_brackets = true;
		self
	}

	pub fn with_concat_arr_index(mut self) -> Self {
		self.concat_arr_index = true;
		self
	}

	pub fn with_booleans(mut self, literal: impl Into<String>) -> Self {
		self.booleans = Some(literal.into());
		self
	}

	pub fn with_json_arrays(mut self) -> Self {
		self.json_arrays = true;
		self
	}

	pub fn with_json_all(mut self) -> Self {
		self.json_all = true;
		self
	}

	pub fn with_skip_files(mut self) -> Self {
		self.skip_files = true;
		self
	}

	pub fn with_param_name(mut self, name: impl Into<String>) -> Self {
		self.param_name = Some(name.into());
		self
	}

	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}
}

/// Internal pipeline failures; always logged and surfaced to the caller as
/// `None`.
#[derive(Debug, thiserror::Error)]
enum SerializeError {
	#[error("unrecognized serialization mode `{0}`")]
	UnknownMode(String),
	#[error("unrecognized encoding format `{0}`")]
	UnknownEncoding(String),
}

/// The model-to-payload converter.
///
/// # Examples
///
/// ```
/// use formbind::{ModelValue, Payload, SerializationEngine, SerializeOptions};
///
/// let engine = SerializationEngine::new();
/// let model = ModelValue::object([
///     ("a", ModelValue::from(1)),
///     ("list", ModelValue::array([ModelValue::from("x"), ModelValue::from("y")])),
/// ]);
/// let options = SerializeOptions::default()
///     .with_mode("plain")
///     .with_brackets()
///     .with_encoding("urlencoded");
///
/// let payload = engine.serialize(model.into(), &options).unwrap();
/// assert_eq!(payload, Payload::UrlEncoded("a=1&list%5B%5D=x&list%5B%5D=y".to_string()));
/// ```
#[derive(Debug, Default)]
pub struct SerializationEngine;

impl SerializationEngine {
	pub fn new() -> Self {
		Self
	}

	/// Run the two-phase pipeline. Returns `None` (after logging) for an
	/// unrecognized mode or encoding.
	///
	/// A pairs source with the `json` encoding is first collapsed to a map;
	/// a model source with the `json` encoding bypasses phase 1 and
	/// stringifies the model directly. When any pair carries a blob, the
	/// encoding is forced to form-data regardless of `encode_as`.
	pub fn serialize(
		&self,
		source: SerializeSource,
		options: &SerializeOptions,
	) -> Option<Payload> {
		match self.run(source, options) {
			Ok(payload) => Some(payload),
			Err(error) => {
				tracing::warn!(%error, "serialization failed");
				None
			}
		}
	}

	fn run(
		&self,
		source: SerializeSource,
		options: &SerializeOptions,
	) -> Result<Payload, SerializeError> {
		let encode_as = options.encode_as.as_deref();

		let pairs = match source {
			SerializeSource::Pairs(pairs) => {
				if encode_as == Some("json") {
					let map = pairs_to_map(&pairs);
					return Ok(Payload::Json(map.to_string()));
				}
				pairs
			}
			SerializeSource::Model(model) => {
				if encode_as == Some("json") {
					// the whole model goes out as one JSON document
					return Ok(Payload::Json(model.json_string()));
				}
				let mode = options.mode.as_deref().unwrap_or("plain");
				match mode {
					"plain" => mode_plain(&model, options),
					"deep" => mode_deep(&model, options),
					"json" => mode_json(&model, options),
					other => return Err(SerializeError::UnknownMode(other.to_string())),
				}
			}
		};

		let has_files = pairs.iter().any(|pair| pair.value.is_blob());

		match encode_as {
			None => Ok(Payload::Pairs(pairs)),
			// blobs only survive a multipart transport
			_ if has_files => Ok(Payload::FormData(pairs)),
			Some("urlencoded") => Ok(Payload::UrlEncoded(encode_urlencoded(&pairs))),
			Some("FormData") | Some("form-data") => Ok(Payload::FormData(pairs)),
			Some("pairs") => Ok(Payload::Pairs(pairs)),
			Some("map") => Ok(Payload::Map(pairs_to_map(&pairs))),
			Some(other) => Err(SerializeError::UnknownEncoding(other.to_string())),
		}
	}
}

/// One pair per top-level key; arrays unpack into repeated keys, objects are
/// JSON-stringified.
fn mode_plain(model: &ModelValue, options: &SerializeOptions) -> Vec<KVPair> {
	let mut pairs = Vec::new();
	let Some(map) = model.as_object() else {
		return pairs;
	};

	for (key, value) in map {
		match value {
			ModelValue::Array(items) if !options.json_arrays && !options.json_all => {
				let unpacked_key = if options.use_brackets {
					format!("{key}[]")
				} else {
					key.clone()
				};
				for item in items {
					if let Some(rendered) = plain_value(item, options) {
						pairs.push(KVPair {
							key: unpacked_key.clone(),
							value: rendered,
						});
					}
				}
			}
			_ => {
				if let Some(rendered) = plain_value(value, options) {
					pairs.push(KVPair {
						key: key.clone(),
						value: rendered,
					});
				}
			}
		}
	}
	pairs
}

/// Render one plain-mode value; `None` means the pair is omitted entirely.
fn plain_value(value: &ModelValue, options: &SerializeOptions) -> Option<KVValue> {
	if let ModelValue::Blob(blob) = value {
		if options.skip_files {
			return None;
		}
		return Some(KVValue::Blob(blob.clone()));
	}
	if options.json_all || value.is_object() || value.is_array() {
		return Some(KVValue::Text(value.json_string()));
	}
	if let ModelValue::Bool(b) = value
		&& let Some(literal) = &options.booleans
	{
		return b.then(|| KVValue::Text(literal.clone()));
	}
	if value.is_null() {
		return Some(KVValue::Text(String::new()));
	}
	Some(KVValue::Text(value.to_text()))
}

/// Recursive walk emitting one pair per leaf, keyed by the dot-joined path.
fn mode_deep(model: &ModelValue, options: &SerializeOptions) -> Vec<KVPair> {
	let mut pairs = Vec::new();
	if model.is_null() {
		return pairs;
	}
	deep_walk(
		options.prefix.clone().unwrap_or_default(),
		model,
		options,
		&mut pairs,
	);
	pairs
}

fn deep_walk(prefix: String, value: &ModelValue, options: &SerializeOptions, pairs: &mut Vec<KVPair>) {
	match value {
		ModelValue::Array(items) => {
			for (index, item) in items.iter().enumerate() {
				let segment = if options.use_brackets {
					format!("[{index}]")
				} else if options.concat_arr_index {
					index.to_string()
				} else {
					format!(".{index}")
				};
				deep_walk(format!("{prefix}{segment}"), item, options, pairs);
			}
		}
		ModelValue::Blob(blob) => {
			if !options.skip_files {
				pairs.push(KVPair::blob(prefix, blob.clone()));
			}
		}
		ModelValue::Object(map) => {
			for (key, nested) in map {
				let next = if prefix.is_empty() {
					key.clone()
				} else {
					format!("{prefix}.{key}")
				};
				deep_walk(next, nested, options, pairs);
			}
		}
		ModelValue::Bool(b) if options.booleans.is_some() => {
			if *b {
				let literal = options.booleans.clone().unwrap_or_default();
				pairs.push(KVPair::text(prefix, literal));
			}
		}
		ModelValue::Null => pairs.push(KVPair::text(prefix, "")),
		other => pairs.push(KVPair::text(prefix, other.to_text())),
	}
}

/// The whole model as one JSON-stringified pair keyed `param_name`; blob
/// fields split off into separate pairs so multipart transports can attach
/// them as binary parts.
fn mode_json(model: &ModelValue, options: &SerializeOptions) -> Vec<KVPair> {
	let param_name = options.param_name.as_deref().unwrap_or("data");

	let Some(map) = model.as_object() else {
		return vec![KVPair::text(param_name, model.json_string())];
	};

	let mut json_model = indexmap::IndexMap::new();
	let mut files = Vec::new();
	for (key, value) in map {
		if let ModelValue::Blob(blob) = value {
			files.push(KVPair::blob(key.clone(), blob.clone()));
		} else {
			json_model.insert(key.clone(), value.clone());
		}
	}

	let mut pairs = vec![KVPair::text(
		param_name,
		ModelValue::Object(json_model).json_string(),
	)];
	if !options.skip_files {
		pairs.extend(files);
	}
	pairs
}

fn encode_urlencoded(pairs: &[KVPair]) -> String {
	pairs
		.iter()
		.map(|pair| {
			format!(
				"{}={}",
				utf8_percent_encode(&pair.key, URL_COMPONENT),
				utf8_percent_encode(&pair.value.as_text(), URL_COMPONENT)
			)
		})
		.collect::<Vec<_>>()
		.join("&")
}

/// Collapse pairs to a flat JSON map; repeated keys become arrays in first
/// occurrence order.
fn pairs_to_map(pairs: &[KVPair]) -> serde_json::Value {
	let mut map = serde_json::Map::new();
	for pair in pairs {
		let rendered = match &pair.value {
			KVValue::Text(s) => serde_json::Value::String(s.clone()),
			// blobs carry no JSON payload
			KVValue::Blob(_) => serde_json::Value::Object(serde_json::Map::new()),
		};
		match map.get_mut(&pair.key) {
			None => {
				map.insert(pair.key.clone(), rendered);
			}
			Some(serde_json::Value::Array(existing)) => existing.push(rendered),
			Some(existing) => {
				let first = existing.take();
				*existing = serde_json::Value::Array(vec![first, rendered]);
			}
		}
	}
	serde_json::Value::Object(map)
}
