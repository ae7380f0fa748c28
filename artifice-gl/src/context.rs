use crate::{
    api::{GlApi, Limits},
    binding::{BindingState, BindingStats, BindingTable, BindingTarget, FramebufferTarget, TargetCategory},
    config::ContextConfig,
    error::{GlResult, UsageError},
    handle::Handle,
};
use std::{cell::RefCell, fmt, rc::Rc};
use tracing::{debug, trace};

struct ContextInner {
    api: Rc<dyn GlApi>,
    config: ContextConfig,
    limits: Limits,
    bindings: RefCell<BindingTable>,
}

/// A graphics context: the API it drives and the binding state of that API.
///
/// Cheap to clone; all clones share the same binding table. Contexts are bound to the thread
/// that created them.
#[derive(Clone)]
pub struct Context(Rc<ContextInner>);

impl Context {
    pub fn new(api: Rc<dyn GlApi>, config: ContextConfig) -> Context {
        let limits = api.limits().capped(&config);
        debug!(?limits, ?config, "context_created");
        Context(Rc::new(ContextInner {
            api,
            config,
            limits,
            bindings: RefCell::new(BindingTable::new()),
        }))
    }

    /// Creates a context over a fresh in-memory API. Returns the API as well, for inspection.
    #[cfg(feature = "headless")]
    pub fn headless(config: ContextConfig) -> (Context, Rc<crate::api::HeadlessGl>) {
        let api = Rc::new(crate::api::HeadlessGl::new());
        (Context::new(api.clone(), config), api)
    }

    pub fn api(&self) -> &dyn GlApi {
        &*self.0.api
    }

    pub fn config(&self) -> &ContextConfig {
        &self.0.config
    }

    /// Effective limits (API limits, capped by the configuration).
    pub fn limits(&self) -> &Limits {
        &self.0.limits
    }

    /// What the cache knows about `target`.
    pub fn binding(&self, target: BindingTarget) -> BindingState {
        self.0.bindings.borrow().state(&target)
    }

    /// The object current on `target`, if known.
    pub fn currently_bound(&self, target: BindingTarget) -> Option<Handle> {
        self.binding(target).handle()
    }

    pub fn is_bound(&self, handle: Handle, target: BindingTarget) -> bool {
        self.currently_bound(target) == Some(handle)
    }

    fn validate(&self, object: Option<Handle>, target: &BindingTarget) -> Result<(), UsageError> {
        if let Some(handle) = object {
            if !handle.kind().supports(&target.category()) {
                return Err(UsageError::UnsupportedTarget {
                    kind: handle.kind(),
                    target: *target,
                });
            }
        }
        match (target.category(), target.slot()) {
            (TargetCategory::Texture(_), Some(unit)) => {
                let limit = self.0.limits.max_texture_units;
                if unit >= limit {
                    return Err(UsageError::SlotOutOfRange {
                        target: *target,
                        index: unit,
                        limit,
                    });
                }
            }
            (TargetCategory::Buffer(buffer_target), Some(index)) => {
                if !buffer_target.is_indexable() {
                    return Err(UsageError::NotIndexable(buffer_target));
                }
                let limit = self.0.limits.indexed_bindings(buffer_target);
                if index >= limit {
                    return Err(UsageError::SlotOutOfRange {
                        target: *target,
                        index,
                        limit,
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Makes `object` current on `target` (or detaches the current object if `None`).
    ///
    /// Returns `false` if the binding table shows the activation would not change anything, in
    /// which case the API is not called. On API failure the binding table is left untouched.
    pub fn activate(&self, object: Option<Handle>, target: BindingTarget) -> GlResult<bool> {
        self.validate(object, &target)?;
        let mut bindings = self.0.bindings.borrow_mut();
        if self.0.config.elide_redundant_binds && bindings.holds(&target, object) {
            bindings.record_elided();
            trace!(%target, ?object, "activate_elided");
            return Ok(false);
        }
        self.0.api.activate(target, object.map(|h| h.raw()))?;
        bindings.record(&target, object);
        trace!(%target, ?object, "activate");
        Ok(true)
    }

    /// Detaches `handle` from `target` if it is the object current there. No-op otherwise.
    pub fn unbind(&self, handle: Handle, target: BindingTarget) -> GlResult<bool> {
        if self.is_bound(handle, target) {
            self.activate(None, target)
        } else {
            Ok(false)
        }
    }

    /// Makes the default framebuffer current on `target`.
    pub fn bind_default_framebuffer(&self, target: FramebufferTarget) -> GlResult<bool> {
        self.activate(None, BindingTarget::framebuffer(target))
    }

    /// Forgets all binding state. Call this after something outside of this context changed
    /// the bindings of the API.
    pub fn invalidate_bindings(&self) {
        debug!("invalidate_bindings");
        self.0.bindings.borrow_mut().clear();
    }

    pub fn binding_stats(&self) -> BindingStats {
        self.0.bindings.borrow().stats()
    }

    /// Known binding entries, for diagnostics.
    pub fn bindings_snapshot(&self) -> Vec<(BindingTarget, Option<Handle>)> {
        self.0.bindings.borrow().snapshot()
    }

    pub(crate) fn invalidate_binding(&self, target: BindingTarget) {
        self.0.bindings.borrow_mut().invalidate(&target);
    }

    pub(crate) fn forget(&self, handle: Handle) {
        self.0.bindings.borrow_mut().forget(handle);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.0.config)
            .field("limits", &self.0.limits)
            .finish_non_exhaustive()
    }
}
