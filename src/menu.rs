// src/menu.rs
use std::collections::HashMap;

use crate::model::{MenuMeta, RoutableNode};

/// order 昇順。order が無い (または 0 の) ノードは最後に、元の順序のまま並ぶ
pub fn sort_siblings(nodes: &mut [RoutableNode]) {
    // sort_by_key は安定ソートなので同順位は入力順が保たれる
    nodes.sort_by_key(|node| node.order.filter(|order| *order != 0).unwrap_or(i64::MAX));
}

/// サイドバー用のメニュー木を返す
///
/// - meta を持たないノード (index リダイレクト) を除く
/// - 各階層を order で並べ替える
pub fn menu_routes(routes: &[RoutableNode]) -> Vec<RoutableNode> {
    let mut items: Vec<RoutableNode> = routes
        .iter()
        .filter(|route| route.meta.is_some())
        .map(|route| RoutableNode {
            children: menu_routes(&route.children),
            ..route.clone()
        })
        .collect();
    sort_siblings(&mut items);
    items
}

/// ルート木の meta を先行順で 1 列に並べる
pub fn flatten_menu_meta(routes: &[RoutableNode]) -> Vec<&MenuMeta> {
    crate::tree::flatten(routes)
        .into_iter()
        .filter_map(|route| route.meta.as_ref())
        .collect()
}

/// `/user/:id` のような動的パラメータを実際の値で置き換える
///
/// 値が無いパラメータはそのまま残す。
pub fn replace_dynamic_params(key: &str, params: &HashMap<String, String>) -> String {
    key.split('/')
        .map(|segment| {
            let Some(name) = segment.strip_prefix(':') else {
                return segment.to_string();
            };
            // ":id?" や ":id.json" のような後続文字は残す
            let end = name
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(name.len());
            match params.get(&name[..end]).filter(|v| !v.is_empty()) {
                Some(value) => format!("{}{}", value, &name[end..]),
                None => segment.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// 現在の pathname に対応する meta を探す (末尾スラッシュ付きも一致とみなす)
pub fn current_route_meta<'a>(
    pathname: &str,
    params: &HashMap<String, String>,
    metas: &[&'a MenuMeta],
) -> Option<&'a MenuMeta> {
    metas.iter().copied().find(|meta| {
        let replaced = replace_dynamic_params(&meta.key, params);
        replaced == pathname || format!("{replaced}/") == pathname
    })
}
