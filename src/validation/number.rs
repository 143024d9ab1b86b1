//! Built-in numeric validators.

use super::{ValidatorDescriptor, ValidatorEngine};
use regex::Regex;
use std::sync::LazyLock;

static INTEGER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("integer regex must compile"));

static FLOAT: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+(\.[0-9]*)?$").expect("float regex must compile"));

pub(super) fn register_builtins(engine: &mut ValidatorEngine) {
	engine.register(ValidatorDescriptor::new(
		"number",
		["text"],
		"The value needs to be a number!",
		|value, settings, _node, _stop| {
			if !settings.is_enabled() {
				return true;
			}
			let fractional = settings
				.get("type")
				.and_then(serde_json::Value::as_str)
				.is_some_and(|t| t == "float" || t == "double");
			let regex = if fractional { &*FLOAT } else { &*INTEGER };
			regex.is_match(&value.to_text())
		},
	));

	engine.register(ValidatorDescriptor::new(
		"min",
		["text"],
		"The number is too small!",
		|value, settings, _node, _stop| {
			if !settings.is_enabled() {
				return true;
			}
			match (value.to_number(), settings.reference_number()) {
				(Some(number), Some(bound)) => number >= bound,
				_ => false,
			}
		},
	));

	engine.register(ValidatorDescriptor::new(
		"max",
		["text"],
		"The number is too large!",
		|value, settings, _node, _stop| {
			if !settings.is_enabled() {
				return true;
			}
			match (value.to_number(), settings.reference_number()) {
				(Some(number), Some(bound)) => number <= bound,
				_ => false,
			}
		},
	));
}
