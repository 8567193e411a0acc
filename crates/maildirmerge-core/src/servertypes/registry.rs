//! Server Type Registry
//!
//! Holds the known server types and detects which of them manage a folder.

use super::types::{ServerType, TypeCapability, TypeContext, TypeError, TypeResult};
use maildirmerge_storage::MaildirFolder;
use tracing::{debug, error};

/// Ordered list of known server types.
///
/// Filled once at startup, then only read while merging.
#[derive(Default)]
pub struct TypeRegistry {
    types: Vec<Box<dyn ServerType>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server type
    pub fn register(&mut self, server_type: impl ServerType + 'static) {
        debug!(id = server_type.info().id, "Registered server type");
        self.types.push(Box::new(server_type));
    }

    /// Labels of the registered types
    pub fn labels(&self) -> Vec<&'static str> {
        self.types.iter().map(|t| t.info().label).collect()
    }

    /// Detect the types managing `folder`, opening a context for each match
    pub fn detect(&self, folder: &MaildirFolder) -> Vec<TypeInstance<'_>> {
        self.types
            .iter()
            .filter(|t| t.detect(folder.path()))
            .map(|t| {
                debug!(path = %folder.path().display(), label = t.info().label, "Detected type");
                TypeInstance {
                    server_type: &**t,
                    context: Some(t.open(folder)),
                }
            })
            .collect()
    }
}

/// A server type paired with its context for one folder.
///
/// The context is closed exactly once: explicitly through [`close`](Self::close),
/// or when the instance is dropped.
pub struct TypeInstance<'r> {
    server_type: &'r dyn ServerType,
    context: Option<Box<dyn TypeContext>>,
}

impl<'r> TypeInstance<'r> {
    /// Human readable type label
    pub fn label(&self) -> &'static str {
        self.server_type.info().label
    }

    /// Whether the type provides an operation
    pub fn supports(&self, capability: TypeCapability) -> bool {
        self.server_type.info().supports(capability)
    }

    /// Whether this instance reports the folder as POP3-managed
    pub fn is_pop3(&mut self) -> bool {
        if !self.supports(TypeCapability::Pop3State) {
            return false;
        }
        self.context.as_mut().is_some_and(|ctx| ctx.is_pop3())
    }

    /// Fetch the POP3 UIDL of a message
    pub fn pop3_uidl(&mut self, base_name: &str) -> TypeResult<Option<String>> {
        self.context_for(TypeCapability::GetUidl)?
            .pop3_uidl(base_name)
    }

    /// Record the POP3 UIDL of a message
    pub fn set_pop3_uidl(&mut self, base_name: &str, uidl: &str) -> TypeResult<()> {
        self.context_for(TypeCapability::SetUidl)?
            .set_pop3_uidl(base_name, uidl)
    }

    /// Whether a subfolder is subscribed
    pub fn is_subscribed(&mut self, subfolder: &str) -> TypeResult<bool> {
        self.context_for(TypeCapability::QuerySubscription)?
            .is_subscribed(subfolder)
    }

    /// Subscribe a subfolder
    pub fn subscribe(&mut self, subfolder: &str) -> TypeResult<()> {
        self.context_for(TypeCapability::Subscribe)?
            .subscribe(subfolder)
    }

    /// Close the context, reporting any failure to flush it
    pub fn close(mut self) -> TypeResult<()> {
        match self.context.take() {
            Some(ctx) => ctx.close(),
            None => Ok(()),
        }
    }

    fn context_for(
        &mut self,
        capability: TypeCapability,
    ) -> TypeResult<&mut Box<dyn TypeContext>> {
        let label = self.label();
        if !self.supports(capability) {
            return Err(TypeError::Unsupported { label, capability });
        }
        match self.context.as_mut() {
            Some(ctx) => Ok(ctx),
            None => Err(TypeError::Unsupported { label, capability }),
        }
    }
}

impl Drop for TypeInstance<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.context.take() {
            if let Err(e) = ctx.close() {
                error!(label = self.label(), error = %e, "Failed to close server type context");
            }
        }
    }
}

impl std::fmt::Debug for TypeInstance<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeInstance")
            .field("label", &self.label())
            .field("open", &self.context.is_some())
            .finish()
    }
}

/// Comma separated labels, for diagnostics
pub fn describe(instances: &[TypeInstance<'_>]) -> String {
    instances
        .iter()
        .map(TypeInstance::label)
        .collect::<Vec<_>>()
        .join(", ")
}
