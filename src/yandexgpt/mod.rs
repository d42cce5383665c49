//! Yandex Foundation Models integration.
//!
//! Each client is a leaf adapter over one endpoint: no state is shared between
//! them beyond the wire helpers in [`provider`] and [`transport`].

/// Text completion client with soft failure semantics.
pub mod completion;
/// Document and query embedding client.
pub mod embeddings;
/// Pluggable text-generation interface and its Yandex implementation.
pub mod llm;
/// Endpoints, authorization, messages and the shared error type.
pub mod provider;
pub(crate) mod transport;
