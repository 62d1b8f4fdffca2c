//! # vox-files
//!
//! Bidirectional mapping between a [`vox_core::CanonicalState`] and the
//! managed directory tree: serialization with rich-text and position
//! extraction, deserialization with placeholder resolution, and a
//! hash-gated atomic writer that cleans up stale files from previous writes.

pub mod deserialize;
pub mod error;
pub mod extract;
pub mod frontmatter;
pub mod identity;
pub mod layout;
pub mod manifest;
pub mod serialize;
pub mod writer;

pub use deserialize::read_state;
pub use error::FileError;
pub use serialize::{serialize_state, FileMap, SerializedTree};
pub use writer::{write_tree, WriteResult, WriteScope, WriteSummary};
