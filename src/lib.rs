//! Reactive data binding, validation and serialization for form models
//!
//! This crate keeps a set of independently-owned input nodes synchronized
//! with one nested model object and turns that model into wire-ready
//! payloads:
//! - Path-indexed model binding with direct/indirect change propagation and
//!   echo suppression
//! - Dirty-state tracking against per-node default values
//! - A pluggable, ordered validation pipeline with typed validators and
//!   translatable failure messages
//! - A two-phase serialization pipeline (model to key/value pairs to encoded
//!   payload) with urlencoded, multipart, JSON and map encodings
//!
//! # Examples
//!
//! ```
//! use formbind::{ChangeEnvelope, ModelBinder, ModelValue, Node, ValidatorEngine};
//! use serde_json::json;
//!
//! let mut binder = ModelBinder::new();
//! let email = Node::builder()
//!     .name("user.email")
//!     .default_value("")
//!     .validation_rule("required", json!(true))
//!     .validation_rule("email", json!(true))
//!     .build();
//! binder.attach(&email);
//!
//! email.set_value(ModelValue::from("a@b.com"));
//! binder.report_value_changed(&email, &ChangeEnvelope::direct());
//! assert_eq!(binder.model_value("user.email"), Some(&ModelValue::from("a@b.com")));
//!
//! let engine = ValidatorEngine::new();
//! assert!(engine.validate(&email));
//! ```

pub mod binder;
pub mod envelope;
pub mod node;
pub mod path;
pub mod serialize;
pub mod validation;
pub mod value;

pub use binder::{ChangeEffect, FocusHandler, ModelBinder};
pub use envelope::ChangeEnvelope;
pub use node::{
	BinderId, ChangeObserver, NativeCheck, Node, NodeBuilder, ValidationConfig, ValidationState,
};
pub use path::PathIndex;
pub use serialize::{
	KVPair, KVValue, Payload, SerializationEngine, SerializeOptions, SerializeSource,
};
pub use validation::{Settings, Stop, ValidateFn, ValidatorDescriptor, ValidatorEngine};
pub use value::{Blob, ModelValue};
