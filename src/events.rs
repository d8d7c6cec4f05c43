// src/events.rs
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::error;

/// バスに流せるイベント。型ごとに購読者が分かれる
pub trait Event: Any + Send + Sync {
    /// ログ用の名前 (例: "theme:changed")
    const NAME: &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unauthorized;

impl Event for Unauthorized {
    const NAME: &'static str = "auth:unauthorized";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub user_id: String,
    pub username: String,
}

impl Event for Login {
    const NAME: &'static str = "auth:login";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logout;

impl Event for Logout {
    const NAME: &'static str = "auth:logout";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeChanged {
    pub theme: String,
}

impl Event for ThemeChanged {
    const NAME: &'static str = "theme:changed";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageChanged {
    pub locale: String,
}

impl Event for LanguageChanged {
    const NAME: &'static str = "i18n:language-changed";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyKind {
    Success,
    Error,
    #[default]
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notify {
    pub message: String,
    pub kind: NotifyKind,
}

impl Event for Notify {
    const NAME: &'static str = "notify";
}

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// 購読解除に使うハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    event: TypeId,
    id: u64,
}

/// 型付きの軽量イベントバス
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<TypeId, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 購読する。戻り値を `off` に渡すと解除できる
    pub fn on<E: Event>(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let erased: Handler = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, erased));
        Subscription {
            event: TypeId::of::<E>(),
            id,
        }
    }

    pub fn off(&self, subscription: Subscription) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = handlers.get_mut(&subscription.event) {
            list.retain(|(id, _)| *id != subscription.id);
            if list.is_empty() {
                handlers.remove(&subscription.event);
            }
        }
    }

    /// 登録順に全ハンドラを呼ぶ。panic したハンドラはログに残して次へ進む
    ///
    /// 戻り値は正常に終わったハンドラの数。
    pub fn emit<E: Event>(&self, event: &E) -> usize {
        // ハンドラ内から on/off できるよう、呼ぶ前にロックを手放す
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event as &dyn Any))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(event = E::NAME, "event bus handler panicked"),
            }
        }
        delivered
    }

    /// そのイベント型の購読者をすべて外す
    pub fn clear<E: Event>(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&TypeId::of::<E>());
    }

    pub fn handler_count<E: Event>(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

/// プロセス共通のバス
pub fn global() -> &'static EventBus {
    static BUS: OnceLock<EventBus> = OnceLock::new();
    BUS.get_or_init(EventBus::new)
}
