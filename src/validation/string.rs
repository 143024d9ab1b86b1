//! Built-in validators for scalar text values.

use super::{Settings, ValidatorDescriptor, ValidatorEngine};
use crate::value::ModelValue;
use regex::Regex;
use std::sync::LazyLock;

/// Permissive e-mail shape check: printable local part, at least one dot in
/// the domain, unicode letters allowed on both sides.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r#"(?i)^[-!#$%&'*+/0-9=?A-Z^_a-z{|}~\x{A0}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}](\.?[-!#$%&'*+/0-9=?A-Z^_a-z{|}~\x{A0}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}])*@[a-zA-Z0-9\x{A0}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}](-*\.?[a-zA-Z0-9\x{A0}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}])*\.[a-zA-Z\x{A0}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}](-?[a-zA-Z0-9\x{A0}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}])*$"#,
	)
	.expect("email regex must compile")
});

/// Run a compiled pattern against the value: arrays must match element-wise,
/// scalars match their textual form.
fn matches_all(regex: &Regex, value: &ModelValue) -> bool {
	match value {
		ModelValue::Array(items) => items.iter().all(|item| regex.is_match(&item.to_text())),
		other => regex.is_match(&other.to_text()),
	}
}

/// Character count of the value's textual form.
fn text_length(value: &ModelValue) -> usize {
	value.to_text().chars().count()
}

fn validate_pattern(value: &ModelValue, settings: &Settings) -> bool {
	if !settings.is_enabled() {
		return true;
	}
	let Some(pattern) = settings.reference().as_str() else {
		tracing::error!("pattern validator needs a string pattern");
		return false;
	};
	let flags: String = settings
		.get("modifiers")
		.and_then(serde_json::Value::as_str)
		.unwrap_or("")
		.chars()
		.filter(|c| matches!(c, 'i' | 'm' | 's'))
		.collect();
	let anchored = if flags.is_empty() {
		pattern.to_string()
	} else {
		format!("(?{flags}){pattern}")
	};
	match Regex::new(&anchored) {
		Ok(regex) => matches_all(&regex, value),
		Err(error) => {
			tracing::error!(pattern, %error, "malformed validation pattern");
			false
		}
	}
}

pub(super) fn register_builtins(engine: &mut ValidatorEngine) {
	engine.register(ValidatorDescriptor::new(
		"required",
		["*"],
		"This field is mandatory!",
		|value, settings, _node, stop| {
			if settings.is_enabled() {
				return !value.is_falsy();
			}
			// optional field left empty: nothing further to check
			if value.is_falsy() {
				stop.stop();
			}
			true
		},
	));

	engine.register(ValidatorDescriptor::new(
		"pattern",
		["text"],
		"Invalid value!",
		|value, settings, _node, _stop| validate_pattern(value, settings),
	));

	engine.register(ValidatorDescriptor::new(
		"email",
		["text", "multiple"],
		"Invalid email!",
		|value, settings, _node, _stop| !settings.is_enabled() || matches_all(&EMAIL, value),
	));

	engine.register(ValidatorDescriptor::new(
		"minlength",
		["text"],
		"The value is too short!",
		|value, settings, _node, _stop| {
			if !settings.is_enabled() {
				return true;
			}
			settings
				.reference_number()
				.is_some_and(|bound| text_length(value) as f64 >= bound)
		},
	));

	engine.register(ValidatorDescriptor::new(
		"maxlength",
		["text"],
		"The text is too large!",
		|value, settings, _node, _stop| {
			if !settings.is_enabled() {
				return true;
			}
			settings
				.reference_number()
				.is_some_and(|bound| text_length(value) as f64 <= bound)
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
			.validation_rule(rule, settings)
			.build();
		node.set_value(value);
		engine.validate(&node)
	}

	#[rstest]
	#[case(ModelValue::from("hello"), true)]
	#[case(ModelValue::from(""), false)]
	#[case(ModelValue::Null, false)]
	#[case(ModelValue::from(0.0), false)]
	#[case(ModelValue::from(false), false)]
	#[case(ModelValue::from("0"), true)]
	fn test_required(#[case] value: ModelValue, #[case] expected: bool) {
		assert_eq!(check("required", json!(true), value), expected);
	}

	#[rstest]
	fn test_required_disabled_passes_anything() {
		assert!(check("required", json!(false), ModelValue::Null));
		assert!(check("required", json!(false), ModelValue::from("x")));
	}

	#[rstest]
	#[case("a@b.com", true)]
	#[case("first.last@example.co.uk", true)]
	#[case("not-an-email", false)]
	#[case("a@b", false)]
	#[case("@example.com", false)]
	#[case("ütf8@exämple.com", true)]
	fn test_email(#[case] input: &str, #[case] expected: bool) {
		assert_eq!(check("email", json!(true), ModelValue::from(input)), expected);
	}

	#[rstest]
	fn test_email_on_array_requires_every_element_valid() {
		// Arrange
		let all_good = ModelValue::Array(vec![
			ModelValue::from("a@b.com"),
			ModelValue::from("c@d.org"),
		]);
		let one_bad = ModelValue::Array(vec![ModelValue::from("a@b.com"), ModelValue::from("oops")]);

		// Act & Assert
		assert!(check("email", json!(true), all_good));
		assert!(!check("email", json!(true), one_bad));
	}

	#[rstest]
	#[case(json!("^[a-z]+$"), "abc", true)]
	#[case(json!("^[a-z]+$"), "Abc", false)]
	#[case(json!({"validate": "^[a-z]+$", "modifiers": "i"}), "Abc", true)]
	fn test_pattern(#[case] settings: serde_json::Value, #[case] input: &str, #[case] expected: bool) {
		assert_eq!(check("pattern", settings, ModelValue::from(input)), expected);
	}

	#[rstest]
	fn test_pattern_malformed_fails_closed() {
		assert!(!check("pattern", json!("([unclosed"), ModelValue::from("x")));
	}

	#[rstest]
	#[case("abcde", true)]
	#[case("abc", false)]
	fn test_minlength(#[case] input: &str, #[case] expected: bool) {
		assert_eq!(check("minlength", json!(5), ModelValue::from(input)), expected);
	}

	#[rstest]
	fn test_minlength_counts_characters_not_bytes() {
		assert!(check("minlength", json!(3), ModelValue::from("äöü")));
	}

	#[rstest]
	#[case("abc", true)]
	#[case("abcdef", false)]
	fn test_maxlength(#[case] input: &str, #[case] expected: bool) {
		assert_eq!(check("maxlength", json!(5), ModelValue::from(input)), expected);
	}

	#[rstest]
	fn test_length_bounds_disabled_by_falsy_settings() {
		assert!(check("minlength", json!(0), ModelValue::from("")));
		assert!(check("maxlength", json!(null), ModelValue::from("however long this is")));
	}
}
