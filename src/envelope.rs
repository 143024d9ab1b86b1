//! The change-notification envelope accompanying every node value mutation.

use crate::value::ModelValue;
use std::collections::HashMap;

/// Describes one value-change event.
///
/// A *direct* change originates from the user or from application code; an
/// *indirect* change was propagated from the model side by a binder. Indirect
/// envelopes carrying `skip_echo` identify values the binder itself just
/// pushed, and must not be written back into the model; this tagging is what
/// keeps model/node propagation acyclic.
///
/// # Examples
///
/// ```
/// use formbind::ChangeEnvelope;
///
/// let direct = ChangeEnvelope::direct();
/// assert!(!direct.indirect);
///
/// let pushed = ChangeEnvelope::indirect().with_source("binder").with_skip_echo();
/// assert!(pushed.indirect && pushed.skip_echo);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChangeEnvelope {
	/// True when the change was propagated from the model rather than made
	/// by the user or application code.
	pub indirect: bool,
	/// True when this envelope echoes a value the binder itself pushed; the
	/// binder ignores such notifications on the outward path.
	pub skip_echo: bool,
	/// Optional origin tag, for diagnostics.
	pub source: Option<String>,
	/// Arbitrary extra metadata attached by the emitter.
	pub extra: HashMap<String, ModelValue>,
}

impl ChangeEnvelope {
	/// An envelope for a user- or application-originated change.
	pub fn direct() -> Self {
		Self::default()
	}

	/// An envelope for a model-originated change.
	pub fn indirect() -> Self {
		Self {
			indirect: true,
			..Self::default()
		}
	}

	pub fn with_source(mut self, source: impl Into<String>) -> Self {
		self.source = Some(source.into());
		self
	}

	pub fn with_skip_echo(mut self) -> Self {
		self.skip_echo = true;
		self
	}

	pub fn with_extra(mut self, key: impl Into<String>, value: ModelValue) -> Self {
		self.extra.insert(key.into(), value);
		self
	}

	/// Whether the binder's outward path must ignore this notification.
	pub fn is_echo(&self) -> bool {
		self.indirect && self.skip_echo
	}
}
