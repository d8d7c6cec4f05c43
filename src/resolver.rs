use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::registry::{LazyView, RegistryId, ViewRegistry};

/// 試すプレフィックス (Vite などの典型的なプロジェクト構成)
pub const PREFIXES: [&str; 8] = [
    "",
    "./",
    "/",
    "pages/",
    "./pages/",
    "/pages/",
    "src/pages/",
    "/src/pages/",
];

/// 試すサフィックス (拡張子と index ファイル)
pub const SUFFIXES: [&str; 9] = [
    "",
    ".tsx",
    ".jsx",
    ".ts",
    ".js",
    "/index.tsx",
    "/index.jsx",
    "/index.ts",
    "/index.js",
];

/// component 識別子から候補キーを優先順に列挙する
///
/// 例: "user/list" → "user/list", "user/list.tsx", ..., "pages/user/list.tsx", ...
pub fn candidate_keys(identifier: &str) -> impl Iterator<Item = String> + '_ {
    // 先頭の "./" または "/" を 1 つだけ取り除く
    let clean = identifier
        .strip_prefix("./")
        .or_else(|| identifier.strip_prefix('/'))
        .unwrap_or(identifier);

    PREFIXES.iter().flat_map(move |prefix| {
        SUFFIXES
            .iter()
            .map(move |suffix| format!("{prefix}{clean}{suffix}"))
    })
}

/// 最初に存在した候補キーを返す (どれも無ければ None)
pub fn resolve_component_key(identifier: &str, registry: &ViewRegistry) -> Option<String> {
    candidate_keys(identifier).find(|candidate| registry.contains_key(candidate))
}

/// component 識別子を遅延ビューに解決し、(レジストリ, 識別子) 単位で使い回す
#[derive(Debug, Default)]
pub struct ComponentResolver {
    cache: RwLock<HashMap<(RegistryId, String), Arc<LazyView>>>,
}

impl ComponentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解決できた場合は同じ識別子に対して常に同じ `Arc` を返す
    pub fn resolve(&self, identifier: &str, registry: &ViewRegistry) -> Option<Arc<LazyView>> {
        let cache_key = (registry.id(), identifier.to_string());
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key)
        {
            return Some(hit.clone());
        }

        let key = resolve_component_key(identifier, registry)?;
        let loader = registry.get(&key)?.clone();

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // 別スレッドが先に登録していればそちらを使う
        let view = cache
            .entry(cache_key)
            .or_insert_with(|| Arc::new(LazyView::new(key, loader)));
        Some(view.clone())
    }

    /// レジストリを差し替えたときに古いエントリを捨てる
    pub fn forget_registry(&self, registry: RegistryId) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _), _| *id != registry);
    }

    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::stub_registry;

    #[test]
    fn finds_pages_prefix_with_extension() {
        let registry = stub_registry(&["pages/user/list.tsx"]);
        assert_eq!(
            resolve_component_key("user/list", &registry).as_deref(),
            Some("pages/user/list.tsx")
        );
        assert_eq!(
            resolve_component_key("/user/list", &registry).as_deref(),
            Some("pages/user/list.tsx")
        );
        assert_eq!(resolve_component_key("user/missing", &registry), None);
    }

    #[test]
    fn prefix_outranks_suffix() {
        // "./pages/" の方がプレフィックス順では前、".js" はサフィックス順で後
        let registry = stub_registry(&["/src/pages/home.tsx", "./pages/home.js"]);
        assert_eq!(
            resolve_component_key("home", &registry).as_deref(),
            Some("./pages/home.js")
        );
    }

    #[test]
    fn index_files_are_candidates() {
        let registry = stub_registry(&["src/pages/dashboard/index.tsx"]);
        assert_eq!(
            resolve_component_key("./dashboard", &registry).as_deref(),
            Some("src/pages/dashboard/index.tsx")
        );
    }

    #[test]
    fn candidate_order_is_prefix_major() {
        let candidates: Vec<String> = candidate_keys("a").take(10).collect();
        assert_eq!(candidates[0], "a");
        assert_eq!(candidates[1], "a.tsx");
        assert_eq!(candidates[8], "a/index.js");
        assert_eq!(candidates[9], "./a");
        assert_eq!(candidate_keys("a").count(), PREFIXES.len() * SUFFIXES.len());
    }

    #[test]
    fn same_identifier_same_view() {
        let registry = stub_registry(&["pages/user/list.tsx"]);
        let resolver = ComponentResolver::new();
        let a = resolver.resolve("user/list", &registry).unwrap();
        let b = resolver.resolve("user/list", &registry).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.key(), "pages/user/list.tsx");
        assert!(resolver.resolve("user/missing", &registry).is_none());
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn registries_do_not_share_views() {
        let first = stub_registry(&["pages/user/list.tsx"]);
        let second = stub_registry(&["pages/user/list.tsx"]);
        let resolver = ComponentResolver::new();
        let a = resolver.resolve("user/list", &first).unwrap();
        let b = resolver.resolve("user/list", &second).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        resolver.forget_registry(first.id());
        assert_eq!(resolver.len(), 1);
        resolver.clear();
        assert!(resolver.is_empty());
    }
}
