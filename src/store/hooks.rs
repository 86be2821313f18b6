//! Lifecycle hooks
//!
//! Hooks run sequentially in registration order. A synchronous hook
//! fails by returning `Err`; a callback hook completes through
//! [`HookDone`], which can be consumed at most once.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::oneshot;

use super::document::Document;
use super::errors::{StoreError, StoreResult};

/// Named points in a record's life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Init,
    Validate,
    Save,
    Remove,
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 4] = [
        Lifecycle::Init,
        Lifecycle::Validate,
        Lifecycle::Save,
        Lifecycle::Remove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Init => "init",
            Lifecycle::Validate => "validate",
            Lifecycle::Save => "save",
            Lifecycle::Remove => "remove",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Lifecycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lifecycle::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| format!("unknown lifecycle hook '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Pre,
    Post,
}

/// Completion handle for callback-style hooks
pub struct HookDone {
    tx: oneshot::Sender<Result<(), String>>,
}

impl HookDone {
    /// Continue with the next hook
    pub fn next(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Abort the operation
    pub fn fail(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(message.into()));
    }
}

type SyncHook = dyn Fn(&Document) -> Result<(), String> + Send + Sync;
type CallbackHook = dyn Fn(&Document, HookDone) + Send + Sync;

/// A hook as the engine invokes it
#[derive(Clone)]
pub enum DocHook {
    Sync(Arc<SyncHook>),
    Callback(Arc<CallbackHook>),
}

impl DocHook {
    pub fn sync(f: impl Fn(&Document) -> Result<(), String> + Send + Sync + 'static) -> Self {
        DocHook::Sync(Arc::new(f))
    }

    pub fn callback(f: impl Fn(&Document, HookDone) + Send + Sync + 'static) -> Self {
        DocHook::Callback(Arc::new(f))
    }

    pub(crate) async fn run(&self, doc: &Document, lifecycle: Lifecycle) -> StoreResult<()> {
        match self {
            DocHook::Sync(f) => f(doc).map_err(|message| StoreError::hook(lifecycle, message)),
            DocHook::Callback(f) => {
                let (tx, rx) = oneshot::channel();
                f(doc, HookDone { tx });
                match rx.await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(message)) => Err(StoreError::hook(lifecycle, message)),
                    Err(_) => Err(StoreError::hook(lifecycle, "hook finished without calling next")),
                }
            }
        }
    }
}

impl fmt::Debug for DocHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocHook::Sync(_) => write!(f, "DocHook::Sync"),
            DocHook::Callback(_) => write!(f, "DocHook::Callback"),
        }
    }
}

/// Pre/post hook lists per lifecycle
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: HashMap<(HookPhase, Lifecycle), Vec<DocHook>>,
}

impl Hooks {
    pub fn register(&mut self, phase: HookPhase, lifecycle: Lifecycle, hook: DocHook) {
        self.hooks.entry((phase, lifecycle)).or_default().push(hook);
    }

    pub fn count(&self, phase: HookPhase, lifecycle: Lifecycle) -> usize {
        self.hooks.get(&(phase, lifecycle)).map(Vec::len).unwrap_or(0)
    }

    pub(crate) async fn run(
        &self,
        phase: HookPhase,
        lifecycle: Lifecycle,
        doc: &Document,
    ) -> StoreResult<()> {
        if let Some(hooks) = self.hooks.get(&(phase, lifecycle)) {
            for hook in hooks {
                hook.run(doc, lifecycle).await?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .hooks
            .iter()
            .map(|((phase, lifecycle), hooks)| format!("{:?} {}: {}", phase, lifecycle, hooks.len()))
            .collect();
        counts.sort();
        f.debug_list().entries(counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Schema;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc() -> Document {
        Document::detached(Arc::new(Schema::empty()), json!({}))
    }

    #[test]
    fn test_lifecycle_names() {
        assert_eq!("save".parse::<Lifecycle>().unwrap(), Lifecycle::Save);
        assert_eq!(Lifecycle::Init.to_string(), "init");
        assert!("destroy".parse::<Lifecycle>().is_err());
    }

    #[tokio::test]
    async fn test_hooks_run_in_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut hooks = Hooks::default();
        for i in 0..3 {
            let order = Arc::clone(&order);
            hooks.register(
                HookPhase::Pre,
                Lifecycle::Save,
                DocHook::sync(move |_| {
                    order.lock().unwrap().push(i);
                    Ok(())
                }),
            );
        }
        hooks.run(HookPhase::Pre, Lifecycle::Save, &doc()).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(hooks.count(HookPhase::Pre, Lifecycle::Save), 3);
        assert_eq!(hooks.count(HookPhase::Post, Lifecycle::Save), 0);
    }

    #[tokio::test]
    async fn test_failing_hook_stops_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut hooks = Hooks::default();
        hooks.register(HookPhase::Pre, Lifecycle::Remove, DocHook::sync(|_| Err("nope".into())));
        let counter = Arc::clone(&calls);
        hooks.register(
            HookPhase::Pre,
            Lifecycle::Remove,
            DocHook::sync(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let err = hooks
            .run(HookPhase::Pre, Lifecycle::Remove, &doc())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "remove hook failed: nope");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_hook_completion() {
        let ok = DocHook::callback(|_, done| done.next());
        assert!(ok.run(&doc(), Lifecycle::Save).await.is_ok());

        let failed = DocHook::callback(|_, done| done.fail("rejected"));
        assert!(failed.run(&doc(), Lifecycle::Save).await.is_err());

        let dropped = DocHook::callback(|_, _done| {});
        assert!(dropped.run(&doc(), Lifecycle::Save).await.is_err());
    }

    #[tokio::test]
    async fn test_callback_hook_completed_from_task() {
        let hook = DocHook::callback(|_, done| {
            tokio::spawn(async move { done.next() });
        });
        assert!(hook.run(&doc(), Lifecycle::Validate).await.is_ok());
    }
}
