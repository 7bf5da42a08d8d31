//! Ordered hook registries and stage execution

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Hook, HookFlow, HookStage, MiddlewareError};
use crate::context::ExecutionContext;
use crate::error::RpcError;

/// Handle returned by [`MiddlewareManager::use_hook`], used to remove the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

struct RegisteredHook {
    id: HookId,
    hook: Arc<dyn Hook>,
}

/// Five ordered hook lists, one per [`HookStage`]
///
/// Registration happens during setup (`&mut self`); execution only needs
/// `&self`, so a built endpoint can be shared freely.
#[derive(Default)]
pub struct MiddlewareManager {
    stages: HashMap<HookStage, Vec<RegisteredHook>>,
    next_id: u64,
}

impl MiddlewareManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to `stage`; it runs after every hook already registered there
    pub fn use_hook<H>(&mut self, stage: HookStage, hook: H) -> HookId
    where
        H: Hook + 'static,
    {
        self.use_arc(stage, Arc::new(hook))
    }

    pub fn use_arc(&mut self, stage: HookStage, hook: Arc<dyn Hook>) -> HookId {
        let id = HookId(self.next_id);
        self.next_id += 1;
        self.stages
            .entry(stage)
            .or_default()
            .push(RegisteredHook { id, hook });
        debug!("Registered {} hook {:?}", stage, id);
        id
    }

    /// Register by stage name (`"beforeCall"`, `"onError"`, ...)
    pub fn use_named<H>(&mut self, stage: &str, hook: H) -> Result<HookId, MiddlewareError>
    where
        H: Hook + 'static,
    {
        let stage = stage.parse::<HookStage>()?;
        Ok(self.use_hook(stage, hook))
    }

    /// Remove a previously registered hook; returns whether it was found
    pub fn remove(&mut self, stage: HookStage, id: HookId) -> bool {
        let Some(hooks) = self.stages.get_mut(&stage) else {
            return false;
        };
        let before = hooks.len();
        hooks.retain(|h| h.id != id);
        before != hooks.len()
    }

    /// Clear one stage, or every stage with `None`
    pub fn clear(&mut self, stage: Option<HookStage>) {
        match stage {
            Some(stage) => {
                self.stages.remove(&stage);
            }
            None => self.stages.clear(),
        }
    }

    pub fn count(&self, stage: HookStage) -> usize {
        self.stages.get(&stage).map_or(0, Vec::len)
    }

    /// Hook count per stage, keyed by stage name
    pub fn hook_counts(&self) -> BTreeMap<&'static str, usize> {
        HookStage::ALL
            .into_iter()
            .map(|stage| (stage.as_str(), self.count(stage)))
            .collect()
    }

    /// Run every hook of `stage` in order against `ctx`.
    ///
    /// Returns `HookFlow::Stop` if a hook stopped the chain. In the `onError`
    /// stage a failing hook is logged and skipped; in any other stage the
    /// first failure is returned.
    pub async fn execute(
        &self,
        stage: HookStage,
        ctx: &mut ExecutionContext,
    ) -> Result<HookFlow, RpcError> {
        let Some(hooks) = self.stages.get(&stage) else {
            return Ok(HookFlow::Continue);
        };

        for registered in hooks {
            match registered.hook.run(ctx).await {
                Ok(HookFlow::Continue) => {}
                Ok(HookFlow::Stop) => {
                    debug!(
                        "{} hook {:?} stopped the chain for method {}",
                        stage, registered.id, ctx.method
                    );
                    return Ok(HookFlow::Stop);
                }
                Err(err) if stage == HookStage::OnError => {
                    warn!(
                        "onError hook {:?} failed for method {}: {}",
                        registered.id, ctx.method, err
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(HookFlow::Continue)
    }
}
