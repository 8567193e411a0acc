//! Server Type Capabilities
//!
//! Core types for the server type plugins.

use maildirmerge_storage::MaildirFolder;
use std::path::Path;
use thiserror::Error;

/// Server type error types
#[derive(Debug, Error)]
pub enum TypeError {
    #[error("{label} does not support {capability:?}")]
    Unsupported {
        label: &'static str,
        capability: TypeCapability,
    },
    #[error("{path}: {message}")]
    Format { path: String, message: String },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}: locked by another process")]
    Locked(String),
}

impl TypeError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        TypeError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// A side file that couldn't be understood
    pub fn format(path: &Path, message: impl Into<String>) -> Self {
        TypeError::Format {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

/// Server type result type
pub type TypeResult<T> = Result<T, TypeError>;

/// Optional operations a server type may provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCapability {
    /// Tell whether the folder is used through POP3
    Pop3State,
    /// Look up the POP3 UIDL of a message
    GetUidl,
    /// Record the POP3 UIDL of a message
    SetUidl,
    /// Tell whether a subfolder is subscribed over IMAP
    QuerySubscription,
    /// Subscribe a subfolder over IMAP
    Subscribe,
}

/// Server type metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub capabilities: Vec<TypeCapability>,
}

impl TypeInfo {
    /// Whether the type provides an operation
    pub fn supports(&self, capability: TypeCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// A mail server product managing maildir folders.
///
/// Implementations are registered once at startup and shared by every
/// folder they detect.
pub trait ServerType {
    /// Get type information
    fn info(&self) -> &TypeInfo;

    /// Whether the folder at `path` is managed by this server
    fn detect(&self, path: &Path) -> bool;

    /// Open the per-folder context
    fn open(&self, _folder: &MaildirFolder) -> Box<dyn TypeContext> {
        Box::new(NoContext)
    }
}

/// Per-folder state of one server type.
///
/// Operations a type doesn't list in [`TypeInfo::capabilities`] keep the
/// default bodies and are never called by the merge engine.
pub trait TypeContext {
    /// Whether the folder is in use by a POP3 client
    fn is_pop3(&mut self) -> bool {
        false
    }

    /// POP3 UIDL recorded for the message with this base name
    fn pop3_uidl(&mut self, _base_name: &str) -> TypeResult<Option<String>> {
        Ok(None)
    }

    /// Record a POP3 UIDL for the message with this base name
    fn set_pop3_uidl(&mut self, _base_name: &str, _uidl: &str) -> TypeResult<()> {
        Ok(())
    }

    /// Whether the subfolder is subscribed
    fn is_subscribed(&mut self, _subfolder: &str) -> TypeResult<bool> {
        Ok(false)
    }

    /// Subscribe the subfolder
    fn subscribe(&mut self, _subfolder: &str) -> TypeResult<()> {
        Ok(())
    }

    /// Flush pending changes and release the context
    fn close(self: Box<Self>) -> TypeResult<()> {
        Ok(())
    }
}

/// Context for types without per-folder state
#[derive(Debug, Default)]
pub struct NoContext;

impl TypeContext for NoContext {}
