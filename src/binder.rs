//! The container side of model binding.
//!
//! A [`ModelBinder`] owns the nested model object, the path index over its
//! attached nodes and the dirty-path set, and drives change propagation in
//! both directions:
//!
//! - *outward* ([`ModelBinder::report_value_changed`]): a node's new value is
//!   written into the model; the write is terminal and never re-enters
//!   inward propagation.
//! - *inward* ([`ModelBinder::model_changed`]): a model mutation is pushed to
//!   every affected node, tagged indirect + skip-echo so the node's own
//!   observers cannot write it straight back.
//!
//! There are no locks guarding this dance: propagation is synchronous and
//! re-entrancy is prevented structurally by the envelope tagging.

use crate::envelope::ChangeEnvelope;
use crate::node::{BinderId, Node};
use crate::path::{PathIndex, is_valid_path};
use crate::validation::ValidatorEngine;
use crate::value::ModelValue;
use indexmap::IndexMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BINDER_ID: AtomicU64 = AtomicU64::new(1);

/// Handler invoked with the first failing node after an unsuccessful
/// [`ModelBinder::validate_all`] pass, so the UI layer can focus it.
pub type FocusHandler = Box<dyn Fn(&Arc<Node>) + Send + Sync>;

/// Controls how inward propagation applies a model change to each affected
/// node (step (c) of the propagation contract).
pub enum ChangeEffect<'a> {
	/// Push the node its model value, tagged indirect + skip-echo.
	Propagate,
	/// Seed defaults and recompute dirty state only; push nothing. The
	/// caller-facing hook for refreshing bookkeeping after a mutation the
	/// affected nodes already display.
	Suppress,
	/// Apply a caller-supplied effect per affected node; receives the node
	/// and its current model value.
	With(&'a dyn Fn(&Arc<Node>, &ModelValue)),
}

/// Keeps a nested model and a set of attached [`Node`]s mutually consistent.
///
/// # Examples
///
/// ```
/// use formbind::{ChangeEnvelope, ModelBinder, ModelValue, Node};
///
/// let mut binder = ModelBinder::new();
/// let node = Node::builder().name("user.email").default_value("").build();
/// binder.attach(&node);
///
/// node.set_value(ModelValue::from("a@b.com"));
/// binder.report_value_changed(&node, &ChangeEnvelope::direct());
/// assert_eq!(
///     binder.model().get_path("user.email"),
///     Some(&ModelValue::from("a@b.com")),
/// );
/// assert!(binder.is_dirty());
/// ```
pub struct ModelBinder {
	id: BinderId,
	model: ModelValue,
	nodes: Vec<Arc<Node>>,
	index: PathIndex,
	dirty_paths: Vec<String>,
	focus_handler: Option<FocusHandler>,
	/// When true, attach/detach/value-change reports are not considered
	/// consumed, letting an outer container observe them as well.
	expose_nodes: bool,
}

impl Default for ModelBinder {
	fn default() -> Self {
		Self::new()
	}
}

impl ModelBinder {
	/// A binder over an empty model object.
	pub fn new() -> Self {
		Self::with_model(ModelValue::Object(IndexMap::new()))
	}

	/// A binder over an existing model. Non-object values are coerced to an
	/// empty object (an anonymous model).
	pub fn with_model(model: ModelValue) -> Self {
		let model = if model.is_object() {
			model
		} else {
			ModelValue::Object(IndexMap::new())
		};
		Self {
			id: NEXT_BINDER_ID.fetch_add(1, Ordering::Relaxed),
			model,
			nodes: Vec::new(),
			index: PathIndex::new(),
			dirty_paths: Vec::new(),
			focus_handler: None,
			expose_nodes: false,
		}
	}

	pub fn id(&self) -> BinderId {
		self.id
	}

	pub fn model(&self) -> &ModelValue {
		&self.model
	}

	/// The attached nodes, in attach order.
	pub fn nodes(&self) -> &[Arc<Node>] {
		&self.nodes
	}

	/// Expose attach/detach/value-change reports to outer containers instead
	/// of consuming them.
	pub fn set_expose_nodes(&mut self, expose: bool) {
		self.expose_nodes = expose;
	}

	/// Install the "focus first invalid node" handler consulted by
	/// [`ModelBinder::validate_all`].
	pub fn on_focus_request(&mut self, handler: impl Fn(&Arc<Node>) + Send + Sync + 'static) {
		self.focus_handler = Some(Box::new(handler));
	}

	/// Register a node with this binder.
	///
	/// Already-parented nodes are rejected with a diagnostic (detach first;
	/// there is no re-parenting through this path). A model-bound node is
	/// indexed by path, its default (or current) value is seeded into the
	/// model where the model has none, and the model's current value is then
	/// pushed back into it tagged indirect + skip-echo, so after attach the
	/// node and the model always agree.
	///
	/// Returns whether the registration event was consumed.
	pub fn attach(&mut self, node: &Arc<Node>) -> bool {
		if node.parent().is_some() {
			tracing::debug!(name = %node.name(), "ignoring attach of an already-parented node");
			return false;
		}

		node.set_parent(Some(self.id));
		self.nodes.push(Arc::clone(node));

		if self.node_is_model_bound(node) {
			self.index.register(node);

			// seed the model, then push its (possibly pre-existing) value
			let default = node.default_value();
			let seed = if default.is_set() { default } else { node.value() };
			self.update_model_value(node, Some(seed));
			self.apply_model_change(&node.name(), ChangeEffect::Propagate);
		} else if !node.name().is_empty() && node.has_model_value() {
			tracing::warn!(name = %node.name(), "node name is not a valid dotted path; binding disabled");
		}

		!self.expose_nodes
	}

	/// Unregister a node. The model value at its path is left untouched;
	/// the model persists independent of node lifetime.
	///
	/// Returns whether the unregistration event was consumed.
	pub fn detach(&mut self, node: &Arc<Node>) -> bool {
		if let Some(position) = self.nodes.iter().position(|other| Arc::ptr_eq(other, node)) {
			self.nodes.remove(position);
			node.set_parent(None);
		}
		self.index.unregister(node);

		!self.expose_nodes
	}

	/// Outward propagation: commit a node's current value to the model.
	///
	/// Ignored for nodes not attached here, unnamed nodes and echo envelopes
	/// (indirect + skip-echo, the node reporting back a value this binder
	/// just pushed). The model write is terminal: no indirect notifications
	/// are emitted for it. Dirty state is recomputed for the path.
	///
	/// Returns whether the change event was consumed.
	pub fn report_value_changed(&mut self, node: &Arc<Node>, envelope: &ChangeEnvelope) -> bool {
		if node.parent() != Some(self.id) {
			return false;
		}
		if !self.node_is_model_bound(node) {
			tracing::debug!("ignoring value change from an unbound node");
			return false;
		}
		if envelope.is_echo() {
			return false;
		}

		self.model.set_path(&node.name(), node.value());
		self.recompute_dirty(node);

		!self.expose_nodes
	}

	/// Inward propagation: notify the binder that the model changed at
	/// `path` (empty = the whole model). Every affected node gets its
	/// default seeded where the model value is unset, its dirty contribution
	/// recomputed, and the model's current value pushed in tagged indirect +
	/// skip-echo.
	pub fn model_changed(&mut self, path: &str) {
		self.apply_model_change(path, ChangeEffect::Propagate);
	}

	/// Inward propagation with an explicit [`ChangeEffect`] overriding how
	/// the refreshed value is applied to each node.
	pub fn model_changed_with(&mut self, path: &str, effect: ChangeEffect<'_>) {
		self.apply_model_change(path, effect);
	}

	/// Write a value into the model and run inward propagation for that
	/// path (the programmatic model mutation entry point).
	pub fn set_model_value(&mut self, path: &str, value: ModelValue) {
		self.model.set_path(path, value);
		self.apply_model_change(path, ChangeEffect::Propagate);
	}

	/// Replace the whole model and refresh every attached node.
	pub fn set_model(&mut self, model: ModelValue) {
		self.model = if model.is_object() {
			model
		} else {
			ModelValue::Object(IndexMap::new())
		};
		self.apply_model_change("", ChangeEffect::Propagate);
	}

	/// The model value at a dotted path.
	pub fn model_value(&self, path: &str) -> Option<&ModelValue> {
		self.model.get_path(path)
	}

	/// The first attached node whose name equals `name` exactly.
	pub fn node_by_name(&self, name: &str) -> Option<Arc<Node>> {
		self.index.find_by_exact_name(name)
	}

	/// Reset the model at `path` (empty = root) to `value`.
	///
	/// A missing value coerces to an empty object when the path is the root
	/// or does not address one bound node (a sub-tree reset). Implemented as
	/// a normal model write driving the standard inward propagation, so all
	/// affected nodes receive one indirect, skip-echo refresh tagged with
	/// `reset`.
	pub fn reset(&mut self, path: &str, value: Option<ModelValue>) {
		let mut value = value;
		if value.is_none() && (path.is_empty() || self.node_by_name(path).is_none()) {
			value = Some(ModelValue::Object(IndexMap::new()));
		}
		self.model.set_path(path, value.unwrap_or(ModelValue::Null));

		let push = |node: &Arc<Node>, value: &ModelValue| {
			node.apply_value(
				value.clone(),
				&ChangeEnvelope::indirect()
					.with_source("binder")
					.with_skip_echo()
					.with_extra("reset", ModelValue::from(true)),
			);
		};
		self.apply_model_change(path, ChangeEffect::With(&push));
	}

	/// Recompute one node's dirty contribution from the current model value.
	///
	/// A leaf path is dirty iff its model value is set (not null / empty
	/// string) and the node's default is unset or differs (loosely) from it.
	/// Idempotent: calling it twice without an intervening change leaves the
	/// dirty set unchanged.
	pub fn recompute_dirty(&mut self, node: &Arc<Node>) {
		let name = node.name();
		if name.is_empty() {
			return;
		}
		let value = self.model.get_path(&name).cloned().unwrap_or(ModelValue::Null);
		let default = node.default_value();
		let path_is_dirty = value.is_set() && (!default.is_set() || !value.loose_eq(&default));

		let position = self.dirty_paths.iter().position(|path| *path == name);
		match (position, path_is_dirty) {
			(Some(index), false) => {
				self.dirty_paths.remove(index);
			}
			(None, true) => {
				self.dirty_paths.push(name);
			}
			_ => {}
		}
	}

	/// Whether any model leaf currently differs from its node's default.
	pub fn is_dirty(&self) -> bool {
		!self.dirty_paths.is_empty()
	}

	/// The dirty leaf paths, in the order they became dirty.
	pub fn dirty_paths(&self) -> &[String] {
		&self.dirty_paths
	}

	/// Validate every attached validatable node, in attach order, collecting
	/// all failures. Returns true iff none failed. On failure with
	/// `focus_first_invalid`, the registered focus handler receives the
	/// first failing node.
	pub fn validate_all(&self, engine: &ValidatorEngine, focus_first_invalid: bool) -> bool {
		let mut passed = true;
		let mut first_invalid: Option<&Arc<Node>> = None;

		for node in &self.nodes {
			if node.validation().is_none() {
				continue;
			}
			if !engine.validate(node) {
				if first_invalid.is_none() {
					first_invalid = Some(node);
				}
				passed = false;
			}
		}

		if let Some(node) = first_invalid
			&& focus_first_invalid
			&& let Some(handler) = &self.focus_handler
		{
			handler(node);
		}

		passed
	}

	fn node_is_model_bound(&self, node: &Arc<Node>) -> bool {
		node.has_model_value() && is_valid_path(&node.name())
	}

	fn apply_model_change(&mut self, path: &str, effect: ChangeEffect<'_>) {
		let targets: Vec<Arc<Node>> = if path.is_empty() {
			self.nodes
				.iter()
				.filter(|node| self.node_is_model_bound(node))
				.cloned()
				.collect()
		} else {
			self.index.lookup(path).to_vec()
		};

		// make sure every affected path has a value before notifying
		for node in &targets {
			self.update_model_value(node, None);
		}

		match effect {
			ChangeEffect::Suppress => {}
			ChangeEffect::Propagate => {
				for node in &targets {
					let value = self.current_value_for(node);
					node.apply_value(
						value,
						&ChangeEnvelope::indirect().with_source("binder").with_skip_echo(),
					);
				}
			}
			ChangeEffect::With(apply) => {
				for node in &targets {
					let value = self.current_value_for(node);
					apply(node, &value);
				}
			}
		}
	}

	fn current_value_for(&self, node: &Arc<Node>) -> ModelValue {
		self.model
			.get_path(&node.name())
			.cloned()
			.unwrap_or(ModelValue::Null)
	}

	/// Seed the model at the node's path when unset (with `seed` or the
	/// node's default), then recompute the node's dirty contribution.
	fn update_model_value(&mut self, node: &Arc<Node>, seed: Option<ModelValue>) {
		let name = node.name();
		if !is_valid_path(&name) {
			return;
		}
		let current_is_set = self
			.model
			.get_path(&name)
			.map(ModelValue::is_set)
			.unwrap_or(false);
		if !current_is_set {
			let seed = seed.unwrap_or_else(|| node.default_value());
			self.model.set_path(&name, seed);
		}
		self.recompute_dirty(node);
	}
}

impl std::fmt::Debug for ModelBinder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModelBinder")
			.field("id", &self.id)
			.field("model", &self.model)
			.field("nodes", &self.nodes.len())
			.field("dirty_paths", &self.dirty_paths)
			.finish()
	}
}
