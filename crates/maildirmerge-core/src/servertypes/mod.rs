//! Server Types
//!
//! Mail servers keep state next to their maildir folders: POP3 usage,
//! UIDLs, IMAP subscriptions. Each supported server is a [`ServerType`]
//! registered in a [`TypeRegistry`], which detects the servers managing
//! a given folder.

mod account;
mod courier;
mod dovecot;
mod registry;
mod sidefile;
mod types;

pub use courier::Courier;
pub use dovecot::Dovecot;
pub use registry::{describe, TypeInstance, TypeRegistry};
pub use types::{
    NoContext, ServerType, TypeCapability, TypeContext, TypeError, TypeInfo, TypeResult,
};

/// Registry holding every server type shipped with maildirmerge
pub fn builtin_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register(Courier::new());
    registry.register(Dovecot::new());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = builtin_registry();
        assert_eq!(registry.labels(), vec!["Courier", "Dovecot"]);
    }
}
