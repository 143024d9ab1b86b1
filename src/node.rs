//! The bindable input abstraction.
//!
//! A [`Node`] owns one addressable value plus its default, and optionally a
//! validation configuration. Widget layers wrap a node, write user input into
//! it with [`Node::set_value`] and report the change to the owning
//! [`ModelBinder`](crate::ModelBinder); the binder pushes model-side changes
//! back in, tagged indirect.
//!
//! Capabilities are chosen at construction through [`NodeBuilder`]: a node
//! without a name does not bind, a node without a [`ValidationConfig`] passes
//! validation trivially, and a node whose value holds a
//! [`Blob`](crate::Blob) is a file-carrying node.

use crate::envelope::ChangeEnvelope;
use crate::value::ModelValue;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identifies one binder instance; nodes record the id of the binder they are
/// attached to instead of holding a reference back into it.
pub type BinderId = u64;

/// Observer invoked after every value mutation, direct or indirect.
pub type ChangeObserver = Arc<dyn Fn(&ModelValue, &ChangeEnvelope) + Send + Sync>;

/// Optional platform-native validity check, consulted before any custom
/// validators run. Returning `Err` short-circuits validation with the given
/// message (the browser `checkValidity()` equivalent).
pub type NativeCheck = Arc<dyn Fn(&ModelValue) -> Result<(), String> + Send + Sync>;

/// The validation verdict of one node, replaced wholesale on every
/// `validate()` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationState {
	pub valid: bool,
	pub message: String,
}

impl Default for ValidationState {
	fn default() -> Self {
		Self {
			valid: true,
			message: String::new(),
		}
	}
}

/// Per-node validation configuration.
///
/// `rules` maps validator names to their settings value: either a bare
/// scalar (the reference value) or an object with `validate`, `message` and
/// validator-specific keys. Rule insertion order is significant: validators
/// not listed in `order` run in it.
#[derive(Clone)]
pub struct ValidationConfig {
	pub rules: IndexMap<String, serde_json::Value>,
	/// Explicit execution order; validators missing from it run afterwards
	/// in rule insertion order. Defaults to `["required"]`.
	pub order: Option<Vec<String>>,
	/// The validation category of the node's value (`"text"`, `"multiple"`,
	/// `"file"`, ...). Validators register per category, with `"*"` matching
	/// any.
	pub validation_type: String,
	/// Overrides every resolved failure message except an explicit
	/// per-rule `message` setting.
	pub default_message: Option<String>,
	pub native_check: Option<NativeCheck>,
}

impl Default for ValidationConfig {
	fn default() -> Self {
		Self {
			rules: IndexMap::new(),
			order: None,
			validation_type: "text".to_string(),
			default_message: None,
			native_check: None,
		}
	}
}

impl std::fmt::Debug for ValidationConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ValidationConfig")
			.field("rules", &self.rules)
			.field("order", &self.order)
			.field("validation_type", &self.validation_type)
			.field("default_message", &self.default_message)
			.field("native_check", &self.native_check.is_some())
			.finish()
	}
}

/// A bindable input: one named value with a default, observers and an
/// optional validation configuration.
///
/// Nodes are created standalone via [`Node::builder`], become *attached* when
/// registered with a binder and *unattached* again on detach; a node belongs
/// to at most one binder at a time. The name is fixed while attached; rename
/// by detaching, building a new node (or [`Node::set_name`]) and re-attaching.
///
/// # Examples
///
/// ```
/// use formbind::{ModelValue, Node};
///
/// let email = Node::builder()
///     .name("user.email")
///     .default_value("")
///     .build();
/// email.set_value(ModelValue::from("a@b.com"));
/// assert_eq!(email.value(), ModelValue::from("a@b.com"));
/// ```
pub struct Node {
	name: RwLock<String>,
	value: RwLock<ModelValue>,
	default_value: RwLock<ModelValue>,
	has_model_value: bool,
	parent: RwLock<Option<BinderId>>,
	validation: RwLock<Option<ValidationConfig>>,
	state: RwLock<ValidationState>,
	invalid: AtomicBool,
	observers: RwLock<Vec<ChangeObserver>>,
}

impl Node {
	pub fn builder() -> NodeBuilder {
		NodeBuilder::default()
	}

	/// The node's dotted model path; empty for unbound nodes.
	pub fn name(&self) -> String {
		self.name.read().clone()
	}

	/// Rename the node. Ignored with a diagnostic while attached, because
	/// the binder's path index is keyed by the registration-time name.
	pub fn set_name(&self, name: impl Into<String>) {
		if self.parent().is_some() {
			tracing::warn!(name = %self.name(), "ignoring rename of an attached node");
			return;
		}
		*self.name.write() = name.into();
	}

	pub fn value(&self) -> ModelValue {
		self.value.read().clone()
	}

	/// Set the value directly (user/programmatic origin) and notify
	/// observers with a direct envelope.
	pub fn set_value(&self, value: ModelValue) {
		self.apply_value(value, &ChangeEnvelope::direct());
	}

	/// Set the value with an explicit envelope. Binders use this to push
	/// model values in, tagged indirect + skip-echo.
	pub fn apply_value(&self, value: ModelValue, envelope: &ChangeEnvelope) {
		*self.value.write() = value.clone();
		let observers: Vec<ChangeObserver> = self.observers.read().clone();
		for observer in observers {
			observer(&value, envelope);
		}
	}

	pub fn default_value(&self) -> ModelValue {
		self.default_value.read().clone()
	}

	pub fn set_default_value(&self, value: ModelValue) {
		*self.default_value.write() = value;
	}

	/// Whether this node participates in model binding at all.
	pub fn has_model_value(&self) -> bool {
		self.has_model_value
	}

	/// Whether the node's current value carries a binary blob.
	pub fn is_file_carrying(&self) -> bool {
		self.value.read().is_blob()
	}

	/// The id of the binder this node is attached to, if any.
	pub fn parent_binder(&self) -> Option<BinderId> {
		self.parent()
	}

	pub(crate) fn parent(&self) -> Option<BinderId> {
		*self.parent.read()
	}

	pub(crate) fn set_parent(&self, parent: Option<BinderId>) {
		*self.parent.write() = parent;
	}

	/// The validation configuration, if this node is validatable.
	pub fn validation(&self) -> Option<ValidationConfig> {
		self.validation.read().clone()
	}

	pub fn set_validation(&self, config: Option<ValidationConfig>) {
		*self.validation.write() = config;
	}

	pub fn validation_state(&self) -> ValidationState {
		self.state.read().clone()
	}

	/// The invalid flag, mirroring `!validation_state().valid` after the
	/// last `validate()` call.
	pub fn is_invalid(&self) -> bool {
		self.invalid.load(Ordering::Relaxed)
	}

	pub(crate) fn set_validation_state(&self, state: ValidationState) {
		self.invalid.store(!state.valid, Ordering::Relaxed);
		*self.state.write() = state;
	}

	/// Subscribe to value changes; the observer receives the new value and
	/// the envelope describing the change.
	pub fn on_change(&self, observer: impl Fn(&ModelValue, &ChangeEnvelope) + Send + Sync + 'static) {
		self.observers.write().push(Arc::new(observer));
	}
}

impl std::fmt::Debug for Node {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Node")
			.field("name", &*self.name.read())
			.field("value", &*self.value.read())
			.field("default_value", &*self.default_value.read())
			.field("has_model_value", &self.has_model_value)
			.field("parent", &*self.parent.read())
			.finish()
	}
}

/// Builder for [`Node`]; capabilities are fixed at construction.
#[derive(Default)]
pub struct NodeBuilder {
	name: String,
	value: ModelValue,
	default_value: ModelValue,
	no_model_value: bool,
	validation: Option<ValidationConfig>,
}

impl NodeBuilder {
	/// The dotted model path this node binds to. Leave unset for an unbound
	/// node.
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn value(mut self, value: impl Into<ModelValue>) -> Self {
		self.value = value.into();
		self
	}

	pub fn default_value(mut self, value: impl Into<ModelValue>) -> Self {
		self.default_value = value.into();
		self
	}

	/// Exclude the node from model binding (it still validates and emits
	/// change notifications).
	pub fn without_model_value(mut self) -> Self {
		self.no_model_value = true;
		self
	}

	/// Attach a full validation configuration.
	pub fn validation(mut self, config: ValidationConfig) -> Self {
		self.validation = Some(config);
		self
	}

	/// Add one validation rule, creating a default configuration on first
	/// use. Settings may be a bare scalar or a `{validate, message, ...}`
	/// object.
	///
	/// # Examples
	///
	/// ```
	/// use formbind::Node;
	/// use serde_json::json;
	///
	/// let node = Node::builder()
	///     .name("user.email")
	///     .validation_rule("required", json!(true))
	///     .validation_rule("email", json!(true))
	///     .build();
	/// assert_eq!(node.validation().unwrap().rules.len(), 2);
	/// ```
	pub fn validation_rule(mut self, name: impl Into<String>, settings: serde_json::Value) -> Self {
		self.validation
			.get_or_insert_with(ValidationConfig::default)
			.rules
			.insert(name.into(), settings);
		self
	}

	/// Override the validator execution order.
	pub fn validation_order<S: Into<String>>(mut self, order: impl IntoIterator<Item = S>) -> Self {
		self.validation
			.get_or_insert_with(ValidationConfig::default)
			.order = Some(order.into_iter().map(Into::into).collect());
		self
	}

	/// The validation category of this node's value (default `"text"`).
	pub fn validation_type(mut self, validation_type: impl Into<String>) -> Self {
		self.validation
			.get_or_insert_with(ValidationConfig::default)
			.validation_type = validation_type.into();
		self
	}

	pub fn default_validation_message(mut self, message: impl Into<String>) -> Self {
		self.validation
			.get_or_insert_with(ValidationConfig::default)
			.default_message = Some(message.into());
		self
	}

	/// Install a platform-native validity check, consulted before custom
	/// validators.
	pub fn native_check(
		mut self,
		check: impl Fn(&ModelValue) -> Result<(), String> + Send + Sync + 'static,
	) -> Self {
		self.validation
			.get_or_insert_with(ValidationConfig::default)
			.native_check = Some(Arc::new(check));
		self
	}

	pub fn build(self) -> Arc<Node> {
		Arc::new(Node {
			name: RwLock::new(self.name),
			value: RwLock::new(self.value),
			default_value: RwLock::new(self.default_value),
			has_model_value: !self.no_model_value,
			parent: RwLock::new(None),
			validation: RwLock::new(self.validation),
			state: RwLock::new(ValidationState::default()),
			invalid: AtomicBool::new(false),
			observers: RwLock::new(Vec::new()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;
	use std::sync::Mutex;

	#[rstest]
	fn test_builder_defaults() {
		// Arrange & Act
		let node = Node::builder().build();

		// Assert
		assert_eq!(node.name(), "");
		assert_eq!(node.value(), ModelValue::Null);
		assert!(node.has_model_value());
		assert!(node.validation().is_none());
		assert!(node.parent_binder().is_none());
	}

	#[rstest]
	fn test_set_value_notifies_observers_with_direct_envelope() {
		// Arrange
		let node = Node::builder().name("a").build();
		let seen: Arc<Mutex<Vec<(ModelValue, bool)>>> = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		node.on_change(move |value, envelope| {
			sink.lock().unwrap().push((value.clone(), envelope.indirect));
		});

		// Act
		node.set_value(ModelValue::from("x"));

		// Assert
		let seen = seen.lock().unwrap();
		assert_eq!(seen.len(), 1);
		assert_eq!(seen[0], (ModelValue::from("x"), false));
	}

	#[rstest]
	fn test_apply_value_preserves_envelope_tags() {
		// Arrange
		let node = Node::builder().name("a").build();
		let indirect_seen = Arc::new(Mutex::new(false));
		let sink = Arc::clone(&indirect_seen);
		node.on_change(move |_, envelope| {
			*sink.lock().unwrap() = envelope.is_echo();
		});

		// Act
		node.apply_value(
			ModelValue::from(1),
			&ChangeEnvelope::indirect().with_skip_echo(),
		);

		// Assert
		assert!(*indirect_seen.lock().unwrap());
		assert_eq!(node.value(), ModelValue::from(1));
	}

	#[rstest]
	fn test_rename_rejected_while_attached() {
		// Arrange
		let node = Node::builder().name("before").build();
		node.set_parent(Some(7));

		// Act
		node.set_name("after");

		// Assert
		assert_eq!(node.name(), "before");
	}

	#[rstest]
	fn test_validation_rule_preserves_insertion_order() {
		// Arrange & Act
		let node = Node::builder()
			.validation_rule("minlength", json!(5))
			.validation_rule("required", json!(true))
			.build();

		// Assert
		let config = node.validation().unwrap();
		let names: Vec<_> = config.rules.keys().cloned().collect();
		assert_eq!(names, vec!["minlength", "required"]);
	}
}
