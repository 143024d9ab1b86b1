//! Built-in validators for multi-valued (array) inputs, registered under the
//! `"multiple"` validation category.

use super::{ValidatorDescriptor, ValidatorEngine};
use crate::value::ModelValue;

pub(super) fn register_builtins(engine: &mut ValidatorEngine) {
	engine.register(ValidatorDescriptor::new(
		"required",
		["multiple"],
		"This field is mandatory!",
		|value, settings, _node, stop| {
			// a multi-valued input must hold an array, even when optional
			let ModelValue::Array(items) = value else {
				return false;
			};
			if settings.is_enabled() {
				return !items.is_empty();
			}
			if items.is_empty() {
				stop.stop();
			}
			true
		},
	));

	engine.register(ValidatorDescriptor::new(
		"minlength",
		["multiple"],
		"Too few items selected!",
		|value, settings, _node, _stop| {
			if !settings.is_enabled() {
				return true;
			}
			let ModelValue::Array(items) = value else {
				return false;
			};
			settings
				.reference_number()
				.is_some_and(|bound| items.len() as f64 >= bound)
		},
	));

	engine.register(ValidatorDescriptor::new(
		"maxlength",
		["multiple"],
		"Too many items selected!",
		|value, settings, _node, _stop| {
			if !settings.is_enabled() {
				return true;
			}
			let ModelValue::Array(items) = value else {
				return false;
			};
			settings
				.reference_number()
				.is_some_and(|bound| items.len() as f64 <= bound)
		},
	));
}

#[cfg(test)]
mod tests {
	use crate::node::Node;
	use crate::validation::ValidatorEngine;
	use crate::value::ModelValue;
	use rstest::rstest;
	use serde_json::json;

	fn check(rule: &str, settings: serde_json::Value, value: ModelValue) -> bool {
		let engine = ValidatorEngine::new();
		let node = Node::builder()
			.name("field")
			.validation_type("multiple")
			.validation_rule(rule, settings)
			.build();
		node.set_value(value);
		engine.validate(&node)
	}

	#[rstest]
	fn test_required_rejects_non_array_even_when_optional() {
		assert!(!check("required", json!(false), ModelValue::from("text")));
		assert!(!check("required", json!(true), ModelValue::Null));
	}

	#[rstest]
	fn test_required_on_arrays() {
		// Arrange
		let empty = ModelValue::array([]);
		let filled = ModelValue::array([ModelValue::from("a")]);

		// Act & Assert
		assert!(!check("required", json!(true), empty.clone()));
		assert!(check("required", json!(true), filled.clone()));
		assert!(check("required", json!(false), empty));
		assert!(check("required", json!(false), filled));
	}

	#[rstest]
	fn test_optional_empty_array_stops_remaining_validators() {
		// Arrange: minlength would fail on the empty selection
		let engine = ValidatorEngine::new();
		let node = Node::builder()
			.name("tags")
			.validation_type("multiple")
			.validation_rule("required", json!(false))
			.validation_rule("minlength", json!(2))
			.build();
		node.set_value(ModelValue::array([]));

		// Act & Assert
		assert!(engine.validate(&node));
	}

	#[rstest]
	#[case(1, true)]
	#[case(2, true)]
	#[case(3, false)]
	fn test_minlength_counts_items(#[case] bound: i64, #[case] expected: bool) {
		// Arrange
		let selection = ModelValue::array([ModelValue::from("a"), ModelValue::from("b")]);

		// Act & Assert
		assert_eq!(check("minlength", json!(bound), selection), expected);
	}

	#[rstest]
	#[case(3, true)]
	#[case(2, true)]
	#[case(1, false)]
	fn test_maxlength_counts_items(#[case] bound: i64, #[case] expected: bool) {
		// Arrange
		let selection = ModelValue::array([ModelValue::from("a"), ModelValue::from("b")]);

		// Act & Assert
		assert_eq!(check("maxlength", json!(bound), selection), expected);
	}

	#[rstest]
	fn test_length_bounds_reject_non_arrays_when_enabled() {
		assert!(!check("minlength", json!(1), ModelValue::from("ab")));
		assert!(check("minlength", json!(0), ModelValue::from("ab")));
	}
}
