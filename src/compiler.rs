// src/compiler.rs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, warn};

use crate::error::{CompileError, StructuralAnomaly};
use crate::model::{MenuMeta, PermissionKind, PermissionNode, RoutableNode, RouteElement};
use crate::path::{ForestKey, RoutePathResolver};
use crate::registry::ViewRegistry;
use crate::resolver::ComponentResolver;
use crate::tree::flatten;

/// 描画側から渡される UI 部品。コンパイラは中身を解釈せずそのまま出力へ流す
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiAffordances {
    /// ビューのロード中に表示するインジケータ
    #[serde(default, alias = "circleLoading")]
    pub loading_indicator: Option<String>,
    /// ビューを包むラッパーの目印
    #[serde(default)]
    pub wrappers: Vec<String>,
}

/// コンパイル中に回復した異常。ログにも同じ内容が出る
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// 親が見つからない / 親チェーンが深すぎる
    Structural(StructuralAnomaly),
    /// component 識別子に一致するビューがない
    UnresolvedView { id: String, component: String },
}

impl Diagnostic {
    /// 原因となったノードの id
    pub fn node_id(&self) -> &str {
        match self {
            Diagnostic::Structural(StructuralAnomaly::ParentNotFound { id, .. })
            | Diagnostic::Structural(StructuralAnomaly::DepthExceeded { id, .. })
            | Diagnostic::UnresolvedView { id, .. } => id,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Structural(anomaly) => write!(f, "{anomaly}"),
            Diagnostic::UnresolvedView { id, component } => {
                write!(f, "component `{component}` not found for `{id}`")
            }
        }
    }
}

/// コンパイル結果
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub routes: Vec<RoutableNode>,
    pub diagnostics: Vec<Diagnostic>,
}

/// パーミッションの森をルートノードの森に変換する
///
/// パス解決とビュー解決のキャッシュはこのインスタンスが持ち、
/// 同じインスタンスで行う全てのコンパイルで共有される。
/// パスは森の指紋ごと、ビューはレジストリごとに分けて持つので、
/// 1 つのインスタンスを複数テナントで使い回してもよい。
#[derive(Debug, Default)]
pub struct RouteCompiler {
    paths: RoutePathResolver,
    components: ComponentResolver,
}

impl RouteCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &RoutePathResolver {
        &self.paths
    }

    pub fn components(&self) -> &ComponentResolver {
        &self.components
    }

    /// パーミッションデータを取り直したときに、そのノードのパスキャッシュを捨てる
    pub fn invalidate(&self, id: &str) {
        self.paths.invalidate(id);
    }

    /// 両方のキャッシュを空にする (ログアウトやレジストリの差し替え時)
    pub fn clear(&self) {
        self.paths.clear();
        self.components.clear();
    }

    pub fn compile(
        &self,
        forest: &[PermissionNode],
        registry: &ViewRegistry,
        ui: &UiAffordances,
    ) -> Result<Compilation, CompileError> {
        // 1) 森を一度だけフラット化し、入力の前提条件を検証する
        let flattened = flatten(forest);
        validate(&flattened, registry)?;

        // 2) 先頭から再帰的にルートノードを組み立てる
        let mut pass = Pass {
            compiler: self,
            forest: ForestKey::of(&flattened),
            flattened: &flattened,
            registry,
            ui,
            diagnostics: Vec::new(),
        };
        let routes = pass.transform(forest);

        debug!(
            permissions = flattened.len(),
            diagnostics = pass.diagnostics.len(),
            "compiled permission routes"
        );
        Ok(Compilation {
            routes,
            diagnostics: pass.diagnostics,
        })
    }
}

fn validate(flattened: &[&PermissionNode], registry: &ViewRegistry) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for node in flattened {
        if !seen.insert(node.id.as_str()) {
            return Err(CompileError::DuplicateId(node.id.clone()));
        }
        if node.route.is_empty() {
            return Err(CompileError::EmptyRoute(node.id.clone()));
        }
    }

    if registry.is_empty() {
        if let Some(node) = flattened
            .iter()
            .find(|n| n.kind == PermissionKind::Menu && n.component.is_some())
        {
            return Err(CompileError::EmptyRegistry(node.id.clone()));
        }
    }
    Ok(())
}

/// 1 回のコンパイルの作業状態
struct Pass<'a> {
    compiler: &'a RouteCompiler,
    forest: ForestKey,
    flattened: &'a [&'a PermissionNode],
    registry: &'a ViewRegistry,
    ui: &'a UiAffordances,
    diagnostics: Vec<Diagnostic>,
}

impl Pass<'_> {
    fn transform(&mut self, nodes: &[PermissionNode]) -> Vec<RoutableNode> {
        nodes
            .iter()
            .map(|node| match node.kind {
                PermissionKind::Catalogue => self.catalogue_route(node),
                PermissionKind::Menu => self.menu_route(node),
            })
            .collect()
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        // 同じ祖先の欠落は子孫の数だけ出てくるので 1 回にまとめる
        if self.diagnostics.contains(&diagnostic) {
            return;
        }
        if let Diagnostic::Structural(anomaly) = &diagnostic {
            warn!(id = diagnostic.node_id(), %anomaly, "permission tree anomaly");
        }
        self.diagnostics.push(diagnostic);
    }

    fn base_route(&mut self, node: &PermissionNode) -> RoutableNode {
        let resolved = self
            .compiler
            .paths
            .resolve_in(self.forest, node, self.flattened);
        if let Some(anomaly) = resolved.anomaly {
            self.report(Diagnostic::Structural(anomaly));
        }

        // 子ルートは相対パスにする (動的プレフィックスの下にマウントされるため)
        let path = node.route.strip_prefix('/').unwrap_or(&node.route);

        RoutableNode {
            path: Some(path.to_string()),
            // order が 0 のときは未指定と同じ扱い
            order: node.order.filter(|order| *order != 0),
            meta: Some(MenuMeta {
                key: resolved.path,
                label: node.label.clone(),
                icon: node.icon.clone().filter(|icon| !icon.is_empty()),
                hide_menu: node.hide,
                hide_tab: node.hide_tab,
                disabled: !node.is_enabled(),
                new_feature: node.new_feature,
                frame_src: node.frame_src.clone().filter(|src| !src.is_empty()),
            }),
            ..Default::default()
        }
    }

    fn catalogue_route(&mut self, node: &PermissionNode) -> RoutableNode {
        let mut route = self.base_route(node);

        // カタログ自体はタブに出さない
        if let Some(meta) = route.meta.as_mut() {
            meta.hide_tab = true;
        }

        if node.parent_id.is_none() {
            route.element = Some(RouteElement::Outlet {
                fallback: self.ui.loading_indicator.clone(),
                wrappers: self.ui.wrappers.clone(),
            });
        }

        route.children = self.transform(&node.children);

        // 先頭の子へのリダイレクト (子の生の route を相対パスとして使う)
        if let Some(first) = node.children.first() {
            route
                .children
                .insert(0, RoutableNode::index_redirect(first.route.clone()));
        }

        route
    }

    fn menu_route(&mut self, node: &PermissionNode) -> RoutableNode {
        let mut route = self.base_route(node);

        if let Some(component) = node.component.as_deref() {
            match self.compiler.components.resolve(component, self.registry) {
                Some(view) => {
                    route.element = Some(match node.frame_src.as_deref() {
                        Some(src) if !src.is_empty() => RouteElement::Frame {
                            view,
                            src: src.to_string(),
                        },
                        _ => RouteElement::View {
                            view,
                            fallback: self.ui.loading_indicator.clone(),
                            wrappers: self.ui.wrappers.clone(),
                        },
                    });
                }
                None => {
                    error!(id = %node.id, component, "component not found");
                    route.view_missing = true;
                    self.report(Diagnostic::UnresolvedView {
                        id: node.id.clone(),
                        component: component.to_string(),
                    });
                }
            }
        }

        // メニューの下にサブメニューがあっても構わない
        if !node.children.is_empty() {
            route.children = self.transform(&node.children);
        }

        route
    }
}
