//! Message classification and the handler registry.
//!
//! - [`kind`]: `InterceptKind` and `KindFilter`
//! - [`classifier`]: maps outbound messages to kinds
//! - [`registry`]: lifecycle-scoped handler table and dispatch
//! - [`context`]: what a handler sees (`MessageContext`) and answers (`Verdict`)

pub mod classifier;
pub mod context;
pub mod kind;
pub mod registry;

pub use classifier::MessageClassifier;
pub use context::{MessageContext, Verdict};
pub use kind::{InterceptKind, KindFilter, KindTag, SpawnKind, SubChannel};
pub use registry::{Callback, HandlerRegistry, OwnerId, RegistrationHandle};
