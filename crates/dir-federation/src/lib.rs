//! # dir-federation
//!
//! Bridges directory users and local accounts.
//!
//! A [`UserResolver`] finds directory entries through the [`Directory`]
//! facade and binds as them, an [`Importer`] maps entries onto local
//! accounts through the hydrator pipeline, and a [`RuleChain`] decides
//! whether an authenticated user may log in. The [`AuthenticationPipeline`]
//! strings these together for credential and Windows logins, while the
//! [`BatchImporter`] imports users in bulk.
//!
//! Every component reports what it does as [`DirectoryEvent`]s on the
//! [`EventSink`] it was constructed with.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
pub mod error;
pub mod event;
pub mod hydrator;
pub mod importer;
pub mod password;
pub mod pipeline;
pub mod resolver;
pub mod scope;
pub mod sync;
pub mod validation;
pub mod windows;

pub use directory::{Criterion, Directory, MemoryDirectory, UserQuery, ALL_ATTRIBUTES};
pub use error::{FederationError, FederationResult};
pub use event::{
    ChannelEventSink, CompositeEventSink, DirectoryEvent, EventKind, EventSink, LogEventSink,
    MemoryEventSink, NullEventSink, SharedEventSink,
};
pub use hydrator::{AttributeHandler, HandlerRegistry, HydrationContext, Hydrator, HydratorPipeline};
pub use importer::Importer;
pub use password::{CredentialMutator, PasswordSynchronizer, SyncContext};
pub use pipeline::{
    AuthOutcome, AuthSource, AuthenticatedUser, AuthenticationPipeline, ImportOrder,
    PipelineBuilder,
};
pub use resolver::UserResolver;
pub use scope::{QueryScope, ScopeRegistry};
pub use sync::{BatchImporter, BatchOptions, SyncError, SyncResult};
pub use validation::{Rule, RuleChain, RuleRegistry};
pub use windows::WindowsIdentity;
