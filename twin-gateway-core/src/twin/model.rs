//! Model-level resource declarations shared by all providers of a model.

use std::collections::HashMap;
use std::sync::Arc;
use twin_gateway_error::TGResult;
use twin_gateway_models::{DataType, ResourceKind, TwinValue};

/// Handler bound to an action resource, run on the engine worker.
pub type ActionHandler = Arc<dyn Fn(&[TwinValue]) -> TGResult<TwinValue> + Send + Sync>;

/// A declared resource on a model: its kind and, for data, its value type.
#[derive(Clone, Debug)]
pub struct ResourceDecl {
    pub kind: ResourceKind,
    pub declared_type: Option<DataType>,
}

type DeclKey = (String, String, String);

/// Registry of per-model resource declarations and action bindings.
///
/// Lives inside the engine state so declarations and twin mutations stay
/// consistent without extra locking. Providers of the same model share
/// declarations; the twin materializes them lazily per provider.
#[derive(Default)]
pub struct ModelRegistry {
    decls: HashMap<DeclKey, ResourceDecl>,
    actions: HashMap<DeclKey, ActionHandler>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn key(model: &str, service: &str, resource: &str) -> DeclKey {
        (model.to_string(), service.to_string(), resource.to_string())
    }

    /// Declare (or re-declare) a resource on a model.
    pub fn declare(&mut self, model: &str, service: &str, resource: &str, decl: ResourceDecl) {
        self.decls.insert(Self::key(model, service, resource), decl);
    }

    pub fn declared(&self, model: &str, service: &str, resource: &str) -> Option<&ResourceDecl> {
        self.decls.get(&Self::key(model, service, resource))
    }

    /// Bind an action handler, declaring the resource as an action.
    pub fn bind_action(
        &mut self,
        model: &str,
        service: &str,
        resource: &str,
        handler: ActionHandler,
    ) {
        self.declare(
            model,
            service,
            resource,
            ResourceDecl {
                kind: ResourceKind::Action,
                declared_type: None,
            },
        );
        self.actions
            .insert(Self::key(model, service, resource), handler);
    }

    pub fn action(&self, model: &str, service: &str, resource: &str) -> Option<ActionHandler> {
        self.actions
            .get(&Self::key(model, service, resource))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_action_declares_an_action_resource() {
        let mut models = ModelRegistry::new();
        models.bind_action("m", "svc", "ring", Arc::new(|_| Ok(TwinValue::Boolean(true))));
        let decl = models.declared("m", "svc", "ring").unwrap();
        assert_eq!(decl.kind, ResourceKind::Action);
        assert!(models.action("m", "svc", "ring").is_some());
        assert!(models.action("m", "svc", "other").is_none());
    }
}
