//! The pluggable validation pipeline.
//!
//! A [`ValidatorEngine`] is a registry of named, typed validator routines.
//! [`ValidatorEngine::new`] comes loaded with the built-in validators
//! (`required`, `pattern`, `email`, `minlength`, `maxlength`, `number`,
//! `min`, `max`); [`ValidatorEngine::empty`] gives an isolated registry for
//! tests and custom stacks. Engines are plain values meant to be constructed
//! once and injected wherever validation runs; there is no process-global
//! instance.

mod list;
mod number;
mod string;

use crate::node::{Node, ValidationConfig, ValidationState};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Fallback message when nothing more specific resolves.
const GENERIC_MESSAGE: &str = "Invalid value!";

/// Handle passed to validator routines; calling [`Stop::stop`] halts the
/// remaining validators without failing the current one. The `required`
/// validator uses it to skip further checks on an intentionally empty,
/// optional field.
pub struct Stop {
	requested: AtomicBool,
}

impl Stop {
	fn new() -> Self {
		Self {
			requested: AtomicBool::new(false),
		}
	}

	pub fn stop(&self) {
		self.requested.store(true, Ordering::Relaxed);
	}

	pub fn requested(&self) -> bool {
		self.requested.load(Ordering::Relaxed)
	}
}

/// Validator settings, normalized from the per-rule configuration value.
///
/// A bare scalar is shorthand for `{"validate": scalar, "message": null}`;
/// an object may carry the reference value, a custom failure message and
/// validator-specific keys (`modifiers`, `type`, ...).
#[derive(Debug, Clone)]
pub struct Settings {
	reference: serde_json::Value,
	message: Option<String>,
	raw: serde_json::Value,
}

impl Settings {
	pub fn normalize(raw: &serde_json::Value) -> Self {
		if let serde_json::Value::Object(map) = raw {
			Self {
				reference: map.get("validate").cloned().unwrap_or(serde_json::Value::Null),
				message: map
					.get("message")
					.and_then(serde_json::Value::as_str)
					.map(String::from),
				raw: raw.clone(),
			}
		} else {
			Self {
				reference: raw.clone(),
				message: None,
				raw: raw.clone(),
			}
		}
	}

	/// The reference value the validator compares against.
	pub fn reference(&self) -> &serde_json::Value {
		&self.reference
	}

	/// The reference value coerced to a number, when possible.
	pub fn reference_number(&self) -> Option<f64> {
		match &self.reference {
			serde_json::Value::Number(n) => n.as_f64(),
			serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
			serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
			_ => None,
		}
	}

	/// Explicit per-rule failure message, if configured.
	pub fn message(&self) -> Option<&str> {
		self.message.as_deref()
	}

	/// Extra validator-specific settings key.
	pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
		self.raw.as_object().and_then(|map| map.get(key))
	}

	/// A falsy reference value disables the validator.
	pub fn is_enabled(&self) -> bool {
		json_truthy(&self.reference)
	}
}

/// Script-style truthiness for JSON settings values.
pub(crate) fn json_truthy(value: &serde_json::Value) -> bool {
	match value {
		serde_json::Value::Null => false,
		serde_json::Value::Bool(b) => *b,
		serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
		serde_json::Value::String(s) => !s.is_empty(),
		serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
	}
}

/// The validation routine: receives the node's value, its normalized
/// settings, the node itself and the [`Stop`] handle.
pub type ValidateFn =
	Arc<dyn Fn(&crate::ModelValue, &Settings, &Node, &Stop) -> bool + Send + Sync>;

/// A named, typed validator routine.
///
/// Registered under `(name, type)` for every declared type; the special type
/// `"*"` matches any validation category.
#[derive(Clone)]
pub struct ValidatorDescriptor {
	pub name: String,
	pub types: Vec<String>,
	/// Built-in failure message, the last resolution step before the
	/// generic fallback.
	pub message: Option<String>,
	pub validate: ValidateFn,
}

impl ValidatorDescriptor {
	pub fn new<S: Into<String>>(
		name: impl Into<String>,
		types: impl IntoIterator<Item = S>,
		message: impl Into<String>,
		validate: impl Fn(&crate::ModelValue, &Settings, &Node, &Stop) -> bool + Send + Sync + 'static,
	) -> Self {
		Self {
			name: name.into(),
			types: types.into_iter().map(Into::into).collect(),
			message: Some(message.into()),
			validate: Arc::new(validate),
		}
	}
}

impl std::fmt::Debug for ValidatorDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ValidatorDescriptor")
			.field("name", &self.name)
			.field("types", &self.types)
			.field("message", &self.message)
			.finish()
	}
}

/// Registry and executor of validator routines.
///
/// # Examples
///
/// ```
/// use formbind::{ModelValue, Node, ValidatorEngine};
/// use serde_json::json;
///
/// let engine = ValidatorEngine::new();
/// let node = Node::builder()
///     .name("user.email")
///     .validation_rule("required", json!(true))
///     .validation_rule("email", json!(true))
///     .build();
///
/// node.set_value(ModelValue::from("not-an-email"));
/// assert!(!engine.validate(&node));
///
/// node.set_value(ModelValue::from("a@b.com"));
/// assert!(engine.validate(&node));
/// ```
pub struct ValidatorEngine {
	validators: HashMap<(String, String), Arc<ValidatorDescriptor>>,
	messages: HashMap<String, HashMap<String, String>>,
	language: String,
}

impl Default for ValidatorEngine {
	fn default() -> Self {
		Self::new()
	}
}

impl ValidatorEngine {
	/// An engine pre-loaded with the built-in validators.
	pub fn new() -> Self {
		let mut engine = Self::empty();
		string::register_builtins(&mut engine);
		number::register_builtins(&mut engine);
		list::register_builtins(&mut engine);
		engine
	}

	/// An engine with no validators registered.
	pub fn empty() -> Self {
		Self {
			validators: HashMap::new(),
			messages: HashMap::new(),
			language: String::new(),
		}
	}

	/// Register a validator routine under every type it declares.
	///
	/// Returns false (without touching the registry) when the descriptor has
	/// no name or no types, or when any `(name, type)` pair is already
	/// taken; registrations are additive, never replacing.
	pub fn register(&mut self, descriptor: ValidatorDescriptor) -> bool {
		if descriptor.name.is_empty() || descriptor.types.is_empty() {
			tracing::warn!(name = %descriptor.name, "rejecting validator registration without name or types");
			return false;
		}
		if descriptor
			.types
			.iter()
			.any(|t| self.validators.contains_key(&(descriptor.name.clone(), t.clone())))
		{
			tracing::warn!(name = %descriptor.name, "rejecting duplicate validator registration");
			return false;
		}

		let descriptor = Arc::new(descriptor);
		for validation_type in &descriptor.types {
			self.validators.insert(
				(descriptor.name.clone(), validation_type.clone()),
				Arc::clone(&descriptor),
			);
		}
		true
	}

	/// Resolve a validator for a validation category: exact `(name, type)`
	/// match first, then the `(name, "*")` wildcard.
	pub fn resolve(&self, validation_type: &str, name: &str) -> Option<Arc<ValidatorDescriptor>> {
		self.validators
			.get(&(name.to_string(), validation_type.to_string()))
			.or_else(|| self.validators.get(&(name.to_string(), "*".to_string())))
			.cloned()
	}

	/// Register translated failure messages for a language. The first
	/// registered language becomes the active one; the `"_default"` key is
	/// the per-language fallback message.
	pub fn register_messages(
		&mut self,
		language: impl Into<String>,
		messages: HashMap<String, String>,
	) {
		let language = language.into();
		if self.language.is_empty() {
			self.language = language.clone();
		}
		self.messages.insert(language, messages);
	}

	pub fn set_language(&mut self, language: impl Into<String>) {
		self.language = language.into();
	}

	pub fn language(&self) -> &str {
		&self.language
	}

	/// Restore a node's validation state to valid/empty.
	pub fn reset_validation(&self, node: &Node) {
		node.set_validation_state(ValidationState::default());
	}

	/// Run the node's validation pipeline and write the verdict into its
	/// validation state and invalid flag.
	///
	/// A node without a validation configuration passes trivially. The
	/// native check (when configured) runs first and short-circuits custom
	/// validators on failure. Validators then run in `validation_order`
	/// (defaulting to `["required"]`) followed by any remaining configured
	/// rules in insertion order; unresolved names are skipped silently. The
	/// first failure stops the loop and fails validation; a [`Stop`] request
	/// halts the loop without failing.
	pub fn validate(&self, node: &Node) -> bool {
		let Some(config) = node.validation() else {
			return true;
		};

		self.reset_validation(node);

		let value = node.value();
		if let Some(check) = &config.native_check
			&& let Err(native_message) = check(&value)
		{
			let message = self.resolve_message(&config, None, Some(&native_message));
			node.set_validation_state(ValidationState {
				valid: false,
				message,
			});
			return false;
		}

		let mut order = config
			.order
			.clone()
			.unwrap_or_else(|| vec!["required".to_string()]);
		for name in config.rules.keys() {
			if !order.iter().any(|existing| existing == name) {
				order.push(name.clone());
			}
		}

		let stop = Stop::new();
		let mut failed: Option<(String, Settings)> = None;
		for name in &order {
			let Some(raw) = config.rules.get(name) else {
				continue;
			};
			let Some(descriptor) = self.resolve(&config.validation_type, name) else {
				continue;
			};
			let settings = Settings::normalize(raw);
			if !(descriptor.validate)(&value, &settings, node, &stop) {
				failed = Some((name.clone(), settings));
				break;
			}
			if stop.requested() {
				break;
			}
		}

		match failed {
			Some((name, settings)) => {
				let message = self.resolve_message(&config, Some((&name, &settings)), None);
				node.set_validation_state(ValidationState {
					valid: false,
					message,
				});
				false
			}
			None => {
				node.set_validation_state(ValidationState::default());
				true
			}
		}
	}

	/// Failure message resolution, in priority order: explicit per-rule
	/// message, the node's default validation message, the native failure
	/// message, the i18n message for the failed validator, the language's
	/// `"_default"` message, the validator's built-in message, then the
	/// generic fallback.
	fn resolve_message(
		&self,
		config: &ValidationConfig,
		failed: Option<(&str, &Settings)>,
		native_message: Option<&str>,
	) -> String {
		if let Some((_, settings)) = failed
			&& let Some(message) = settings.message()
		{
			return message.to_string();
		}
		if let Some(message) = &config.default_message {
			return message.clone();
		}
		if let Some(message) = native_message
			&& !message.is_empty()
		{
			return message.to_string();
		}
		if let Some(translations) = self.messages.get(&self.language) {
			if let Some((name, _)) = failed
				&& let Some(message) = translations.get(name)
			{
				return message.clone();
			}
			if let Some(message) = translations.get("_default") {
				return message.clone();
			}
		}
		if let Some((name, _)) = failed
			&& let Some(descriptor) = self.resolve(&config.validation_type, name)
			&& let Some(message) = &descriptor.message
		{
			return message.clone();
		}
		GENERIC_MESSAGE.to_string()
	}
}

impl std::fmt::Debug for ValidatorEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ValidatorEngine")
			.field("validators", &self.validators.len())
			.field("languages", &self.messages.keys().collect::<Vec<_>>())
			.field("language", &self.language)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ModelValue;
	use rstest::rstest;
	use serde_json::json;

	fn noop_descriptor(name: &str, types: &[&str]) -> ValidatorDescriptor {
		ValidatorDescriptor::new(name, types.iter().copied(), "nope", |_, _, _, _| true)
	}

	#[rstest]
	fn test_register_rejects_missing_name_or_types() {
		// Arrange
		let mut engine = ValidatorEngine::empty();

		// Act & Assert
		assert!(!engine.register(noop_descriptor("", &["text"])));
		assert!(!engine.register(noop_descriptor("x", &[])));
	}

	#[rstest]
	fn test_register_rejects_duplicate_name_type_pair() {
		// Arrange
		let mut engine = ValidatorEngine::empty();
		assert!(engine.register(noop_descriptor("custom", &["text"])));

		// Act & Assert
		assert!(!engine.register(noop_descriptor("custom", &["text", "multiple"])));
		// the losing registration must not have claimed the free slot
		assert!(engine.resolve("multiple", "custom").is_none());
	}

	#[rstest]
	fn test_resolve_falls_back_to_wildcard() {
		// Arrange
		let engine = ValidatorEngine::new();

		// Act & Assert: "required" is registered for "*" and "multiple"
		let for_text = engine.resolve("text", "required").unwrap();
		assert_eq!(for_text.types, vec!["*"]);
		let for_multiple = engine.resolve("multiple", "required").unwrap();
		assert_eq!(for_multiple.types, vec!["multiple"]);
	}

	#[rstest]
	fn test_validate_passes_trivially_without_config() {
		// Arrange
		let engine = ValidatorEngine::new();
		let node = Node::builder().name("a").build();

		// Act & Assert
		assert!(engine.validate(&node));
		assert!(node.validation_state().valid);
	}

	#[rstest]
	fn test_email_scenario() {
		// Arrange
		let engine = ValidatorEngine::new();
		let node = Node::builder()
			.name("user.email")
			.default_value("")
			.validation_rule("required", json!(true))
			.validation_rule("email", json!(true))
			.build();

		// Act & Assert: invalid address fails on the email validator
		node.set_value(ModelValue::from("not-an-email"));
		assert!(!engine.validate(&node));
		assert!(node.is_invalid());
		assert_eq!(node.validation_state().message, "Invalid email!");

		// Act & Assert: valid address passes
		node.set_value(ModelValue::from("a@b.com"));
		assert!(engine.validate(&node));
		assert!(!node.is_invalid());
		assert_eq!(node.validation_state().message, "");
	}

	#[rstest]
	fn test_explicit_order_overrides_implicit_required_head() {
		// Arrange: both validators would fail; order decides which reports
		let engine = ValidatorEngine::new();
		let node = Node::builder()
			.name("a")
			.validation_rule("required", json!(true))
			.validation_rule("minlength", json!(5))
			.validation_order(["minlength", "required"])
			.build();
		node.set_value(ModelValue::from("ab"));

		// Act
		let valid = engine.validate(&node);

		// Assert: minlength ran first, so its message won
		assert!(!valid);
		assert_eq!(node.validation_state().message, "The value is too short!");
	}

	#[rstest]
	fn test_required_stop_skips_remaining_validators_on_empty_optional() {
		// Arrange: empty value, required=false, minlength would fail
		let engine = ValidatorEngine::new();
		let node = Node::builder()
			.name("a")
			.validation_rule("required", json!(false))
			.validation_rule("minlength", json!(5))
			.build();
		node.set_value(ModelValue::from(""));

		// Act & Assert
		assert!(engine.validate(&node));
	}

	#[rstest]
	fn test_unresolved_validator_names_are_skipped() {
		// Arrange
		let engine = ValidatorEngine::new();
		let node = Node::builder()
			.name("a")
			.validation_rule("no-such-validator", json!(true))
			.build();
		node.set_value(ModelValue::from("anything"));

		// Act & Assert
		assert!(engine.validate(&node));
	}

	#[rstest]
	fn test_native_check_short_circuits_custom_validators() {
		// Arrange: the required rule would pass, but the native check fails
		let engine = ValidatorEngine::new();
		let node = Node::builder()
			.name("a")
			.validation_rule("required", json!(true))
			.native_check(|_| Err("Platform says no".to_string()))
			.build();
		node.set_value(ModelValue::from("fine"));

		// Act
		let valid = engine.validate(&node);

		// Assert
		assert!(!valid);
		assert_eq!(node.validation_state().message, "Platform says no");
	}

	#[rstest]
	fn test_message_resolution_priority() {
		// Arrange
		let mut engine = ValidatorEngine::new();
		engine.register_messages(
			"en",
			HashMap::from([
				("required".to_string(), "Please fill this in".to_string()),
				("_default".to_string(), "Something is off".to_string()),
			]),
		);
		let node = Node::builder()
			.name("a")
			.validation_rule(
				"required",
				json!({"validate": true, "message": "Custom wins"}),
			)
			.build();
		node.set_value(ModelValue::from(""));

		// Act & Assert: explicit settings message beats everything
		assert!(!engine.validate(&node));
		assert_eq!(node.validation_state().message, "Custom wins");

		// Arrange: no explicit message, i18n entry applies
		let plain = Node::builder()
			.name("b")
			.validation_rule("required", json!(true))
			.build();
		plain.set_value(ModelValue::from(""));

		// Act & Assert
		assert!(!engine.validate(&plain));
		assert_eq!(plain.validation_state().message, "Please fill this in");

		// Arrange: unknown validator name falls through to "_default"
		let minlen = Node::builder()
			.name("c")
			.validation_rule("minlength", json!(3))
			.build();
		minlen.set_value(ModelValue::from("xy"));

		// Act & Assert
		assert!(!engine.validate(&minlen));
		assert_eq!(minlen.validation_state().message, "Something is off");
	}

	#[rstest]
	fn test_default_validation_message_beats_i18n() {
		// Arrange
		let mut engine = ValidatorEngine::new();
		engine.register_messages(
			"en",
			HashMap::from([("_default".to_string(), "i18n".to_string())]),
		);
		let node = Node::builder()
			.name("a")
			.validation_rule("required", json!(true))
			.default_validation_message("Node default")
			.build();
		node.set_value(ModelValue::from(""));

		// Act & Assert
		assert!(!engine.validate(&node));
		assert_eq!(node.validation_state().message, "Node default");
	}

	#[rstest]
	fn test_validation_state_replaced_on_each_call() {
		// Arrange
		let engine = ValidatorEngine::new();
		let node = Node::builder()
			.name("a")
			.validation_rule("required", json!(true))
			.build();
		node.set_value(ModelValue::from(""));
		assert!(!engine.validate(&node));

		// Act: fix the value and revalidate
		node.set_value(ModelValue::from("ok"));
		let valid = engine.validate(&node);

		// Assert: the failed state was fully replaced
		assert!(valid);
		assert_eq!(node.validation_state(), ValidationState::default());
		assert!(!node.is_invalid());
	}
}
