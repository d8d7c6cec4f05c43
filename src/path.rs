// src/path.rs
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::StructuralAnomaly;
use crate::model::PermissionNode;

/// 親チェーンを辿る最大段数。これを超えたら循環とみなす
pub const MAX_DEPTH: usize = 64;

/// 完全修飾パスの解決結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// 正規化済みの絶対パス (例: "/management/user/list")
    pub path: String,
    /// 親が見つからない / 深すぎる場合、途中で打ち切った理由
    pub anomaly: Option<StructuralAnomaly>,
}

/// 森の形 (各ノードの id / parentId / route) から作る指紋
///
/// テナントが違えば同じ id と route でも親チェーンが違うので、キャッシュはこの単位で分ける。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForestKey(u64);

impl ForestKey {
    pub fn of(flattened: &[&PermissionNode]) -> Self {
        let mut hasher = DefaultHasher::new();
        for node in flattened {
            node.id.hash(&mut hasher);
            node.parent_id.hash(&mut hasher);
            node.route.hash(&mut hasher);
        }
        ForestKey(hasher.finish())
    }
}

/// パーミッションノードの完全修飾パスを求め、(森, id, route) 単位でキャッシュする
#[derive(Debug, Default)]
pub struct RoutePathResolver {
    cache: RwLock<HashMap<(ForestKey, String, String), ResolvedPath>>,
    /// 親探索 (フラット配列の走査) を行った回数
    lookups: AtomicUsize,
}

impl RoutePathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `node` からルートまで親を辿ってパスを組み立てる
    ///
    /// - 親が見つからなければその地点をルートとして扱い、`anomaly` に理由を残す
    /// - 同じ森の同じ (id, route) の 2 回目以降はキャッシュから返す
    pub fn resolve(&self, node: &PermissionNode, flattened: &[&PermissionNode]) -> ResolvedPath {
        self.resolve_in(ForestKey::of(flattened), node, flattened)
    }

    /// 森の指紋を計算済みの呼び出し元向け (コンパイル 1 回につき 1 度だけ計算する)
    pub fn resolve_in(
        &self,
        forest: ForestKey,
        node: &PermissionNode,
        flattened: &[&PermissionNode],
    ) -> ResolvedPath {
        let key = (forest, node.id.clone(), node.route.clone());
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return hit.clone();
        }

        let resolved = self.walk(node, flattened);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, resolved.clone());
        resolved
    }

    fn walk(&self, node: &PermissionNode, flattened: &[&PermissionNode]) -> ResolvedPath {
        // 1) 自分の route から始めて、親の route を前に積んでいく
        let mut segments: Vec<&str> = vec![node.route.as_str()];
        let mut current = node;
        let mut anomaly = None;

        while let Some(parent_id) = current.parent_id.as_deref() {
            if segments.len() > MAX_DEPTH {
                anomaly = Some(StructuralAnomaly::DepthExceeded {
                    id: node.id.clone(),
                    max_depth: MAX_DEPTH,
                });
                break;
            }

            self.lookups.fetch_add(1, Ordering::Relaxed);
            let Some(parent) = flattened.iter().find(|p| p.id == parent_id) else {
                anomaly = Some(StructuralAnomaly::ParentNotFound {
                    id: current.id.clone(),
                    parent_id: parent_id.to_string(),
                });
                break;
            };
            segments.push(parent.route.as_str());
            current = parent;
        }

        // 2) ルート側から並べ直して結合し、連続スラッシュを潰す
        segments.reverse();
        ResolvedPath {
            path: normalize(&format!("/{}", segments.join("/"))),
            anomaly,
        }
    }

    /// 指定 id のキャッシュを捨てる (route を書き換えた場合に呼ぶ)
    pub fn invalidate(&self, id: &str) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(_, cached_id, _), _| cached_id != id);
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

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

/// 連続するスラッシュを 1 つにまとめる
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::menu;

    fn chain() -> Vec<PermissionNode> {
        vec![
            menu("1", None, "root"),
            menu("2", Some("1"), "settings"),
            menu("3", Some("2"), "detail"),
        ]
    }

    #[test]
    fn walks_to_the_root_and_caches() {
        let nodes = chain();
        let flat: Vec<&PermissionNode> = nodes.iter().collect();
        let resolver = RoutePathResolver::new();

        let first = resolver.resolve(&nodes[2], &flat);
        assert_eq!(first.path, "/root/settings/detail");
        assert_eq!(first.anomaly, None);
        let lookups = resolver.lookup_count();
        assert_eq!(lookups, 2);

        let second = resolver.resolve(&nodes[2], &flat);
        assert_eq!(second, first);
        assert_eq!(resolver.lookup_count(), lookups);
    }

    #[test]
    fn root_node_is_slash_segment() {
        let node = menu("1", None, "dashboard");
        let resolver = RoutePathResolver::new();
        assert_eq!(resolver.resolve(&node, &[&node]).path, "/dashboard");
    }

    #[test]
    fn collapses_repeated_slashes() {
        let parent = menu("1", None, "//settings");
        let child = menu("2", Some("1"), "/profile/");
        let flat = vec![&parent, &child];
        let resolver = RoutePathResolver::new();
        assert_eq!(resolver.resolve(&child, &flat).path, "/settings/profile/");
        assert_eq!(normalize("//a///b"), "/a/b");
    }

    #[test]
    fn dangling_parent_truncates() {
        let orphan = menu("9", Some("404"), "orphan");
        let resolver = RoutePathResolver::new();
        let resolved = resolver.resolve(&orphan, &[&orphan]);
        assert_eq!(resolved.path, "/orphan");
        assert_eq!(
            resolved.anomaly,
            Some(StructuralAnomaly::ParentNotFound {
                id: "9".into(),
                parent_id: "404".into()
            })
        );
    }

    #[test]
    fn cyclic_parents_stop_at_max_depth() {
        let a = menu("a", Some("b"), "a");
        let b = menu("b", Some("a"), "b");
        let flat = vec![&a, &b];
        let resolver = RoutePathResolver::new();
        let resolved = resolver.resolve(&a, &flat);
        assert!(matches!(
            resolved.anomaly,
            Some(StructuralAnomaly::DepthExceeded { .. })
        ));
    }

    #[test]
    fn invalidate_drops_only_that_id() {
        let nodes = chain();
        let flat: Vec<&PermissionNode> = nodes.iter().collect();
        let resolver = RoutePathResolver::new();
        for n in &nodes {
            resolver.resolve(n, &flat);
        }
        assert_eq!(resolver.len(), 3);

        resolver.invalidate("2");
        assert_eq!(resolver.len(), 2);

        resolver.clear();
        assert!(resolver.is_empty());
    }

    #[test]
    fn same_ids_in_other_forests_do_not_share_paths() {
        let admin = vec![menu("1", None, "admin"), menu("2", Some("1"), "users")];
        let staff = vec![menu("1", None, "staff"), menu("2", Some("1"), "users")];
        let admin_flat: Vec<&PermissionNode> = admin.iter().collect();
        let staff_flat: Vec<&PermissionNode> = staff.iter().collect();
        let resolver = RoutePathResolver::new();

        assert_eq!(resolver.resolve(&admin[1], &admin_flat).path, "/admin/users");
        assert_eq!(resolver.resolve(&staff[1], &staff_flat).path, "/staff/users");
        assert_eq!(resolver.resolve(&admin[1], &admin_flat).path, "/admin/users");
        assert_ne!(ForestKey::of(&admin_flat), ForestKey::of(&staff_flat));
    }
}
