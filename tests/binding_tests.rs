//! Model binding integration tests
//!
//! End-to-end coverage of attach/detach, the propagation contract and
//! dirty-state bookkeeping.

use formbind::{ChangeEnvelope, ModelBinder, ModelValue, Node};
use proptest::prelude::*;
use rstest::rstest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[rstest]
fn test_model_matches_node_value_immediately_after_attach() {
	// Arrange
	let mut binder = ModelBinder::new();
	let nodes = [
		Node::builder().name("plain").default_value("d1").build(),
		Node::builder().name("nested.path").default_value("d2").build(),
		Node::builder().name("preset").value("typed-early").build(),
	];

	// Act
	for node in &nodes {
		binder.attach(node);
	}

	// Assert
	for node in &nodes {
		assert_eq!(
			binder.model_value(&node.name()),
			Some(&node.value()),
			"model and node disagree at {}",
			node.name()
		);
	}
}

#[rstest]
fn test_path_index_prefix_and_exact_lookup() {
	// Arrange
	let mut binder = ModelBinder::new();
	let addr = Node::builder().name("addr").build();
	let city = Node::builder().name("addr.city").build();
	binder.attach(&addr);
	binder.attach(&city);

	// Act: mutate the subtree; both buckets must be refreshed
	let pushes = Arc::new(AtomicUsize::new(0));
	for node in [&addr, &city] {
		let counter = Arc::clone(&pushes);
		node.on_change(move |_, _| {
			counter.fetch_add(1, Ordering::Relaxed);
		});
	}
	binder.model_changed("addr");

	// Assert: "addr" addresses both nodes, "addr.city" only the nested one
	assert_eq!(pushes.load(Ordering::Relaxed), 2);
	pushes.store(0, Ordering::Relaxed);
	binder.model_changed("addr.city");
	assert_eq!(pushes.load(Ordering::Relaxed), 1);
}

#[rstest]
fn test_no_feedback_loop_through_a_report_everything_widget() {
	// Arrange: a widget layer that dutifully reports every change it sees
	let mut binder = ModelBinder::new();
	let node = Node::builder().name("a").default_value("").build();
	binder.attach(&node);

	let model_writes = Arc::new(AtomicUsize::new(0));

	// Act: one genuine change, then replay every notification back at the
	// binder the way a naive widget would
	node.set_value(ModelValue::from("v1"));
	binder.report_value_changed(&node, &ChangeEnvelope::direct());
	model_writes.fetch_add(1, Ordering::Relaxed);

	let echoes: Arc<Mutex<Vec<ChangeEnvelope>>> = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&echoes);
	node.on_change(move |_, envelope| sink.lock().unwrap().push(envelope.clone()));
	binder.model_changed("a");

	for envelope in echoes.lock().unwrap().iter() {
		if binder.report_value_changed(&node, envelope) {
			model_writes.fetch_add(1, Ordering::Relaxed);
		}
	}

	// Assert: the replayed echoes produced no second write
	assert_eq!(model_writes.load(Ordering::Relaxed), 1);
	assert_eq!(binder.model_value("a"), Some(&ModelValue::from("v1")));
}

#[rstest]
fn test_reset_root_restores_defaults_and_clears_dirty() {
	// Arrange
	let mut binder = ModelBinder::new();
	let name = Node::builder().name("user.name").default_value("anon").build();
	let mail = Node::builder().name("user.mail").default_value("").build();
	binder.attach(&name);
	binder.attach(&mail);

	name.set_value(ModelValue::from("Ada"));
	binder.report_value_changed(&name, &ChangeEnvelope::direct());
	mail.set_value(ModelValue::from("ada@b.com"));
	binder.report_value_changed(&mail, &ChangeEnvelope::direct());
	assert_eq!(binder.dirty_paths().len(), 2);

	// Act
	binder.reset("", None);

	// Assert
	assert!(!binder.is_dirty());
	assert_eq!(name.value(), ModelValue::from("anon"));
	// an unset default seeds back as the default itself
	assert_eq!(binder.model_value("user.name"), Some(&ModelValue::from("anon")));
}

#[rstest]
fn test_detached_node_reports_are_ignored() {
	// Arrange
	let mut binder = ModelBinder::new();
	let node = Node::builder().name("a").default_value("").build();
	binder.attach(&node);
	binder.detach(&node);

	// Act
	node.set_value(ModelValue::from("late"));
	let consumed = binder.report_value_changed(&node, &ChangeEnvelope::direct());

	// Assert
	assert!(!consumed);
	assert_ne!(binder.model_value("a"), Some(&ModelValue::from("late")));
}

#[rstest]
fn test_value_cleared_back_to_default_leaves_dirty_set_empty() {
	// Arrange
	let mut binder = ModelBinder::new();
	let node = Node::builder().name("a").default_value("base").build();
	binder.attach(&node);
	node.set_value(ModelValue::from("changed"));
	binder.report_value_changed(&node, &ChangeEnvelope::direct());
	assert!(binder.is_dirty());

	// Act: the user types the default back in
	node.set_value(ModelValue::from("base"));
	binder.report_value_changed(&node, &ChangeEnvelope::direct());

	// Assert
	assert!(!binder.is_dirty());
}

proptest! {
	#[test]
	fn prop_recompute_dirty_is_idempotent(
		value in "[a-z0-9]{0,12}",
		default in "[a-z0-9]{0,12}",
	) {
		// Arrange
		let mut binder = ModelBinder::new();
		let node = Node::builder().name("field").default_value(default).build();
		binder.attach(&node);
		node.set_value(ModelValue::from(value));
		binder.report_value_changed(&node, &ChangeEnvelope::direct());

		// Act
		let first = binder.dirty_paths().to_vec();
		binder.recompute_dirty(&node);
		let second = binder.dirty_paths().to_vec();
		binder.recompute_dirty(&node);

		// Assert
		prop_assert_eq!(&first, &second);
		prop_assert_eq!(binder.dirty_paths(), second.as_slice());
	}
}
