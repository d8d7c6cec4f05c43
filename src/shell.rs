// src/shell.rs
use serde::{Deserialize, Serialize};

use crate::model::{RoutableNode, RouteElement};

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_404_PATH: &str = "/404";
pub const ERROR_PATH: &str = "/error";

/// 認証まわりのページ設定 (ページ自体は描画側の不透明な名前)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPages {
    #[serde(default)]
    pub login_page: Option<String>,
    #[serde(default)]
    pub error_page: Option<String>,
    #[serde(default)]
    pub login_path: Option<String>,
    #[serde(default, rename = "error404Path")]
    pub error_404_path: Option<String>,
}

impl AuthPages {
    pub fn login_path(&self) -> &str {
        self.login_path.as_deref().unwrap_or(DEFAULT_LOGIN_PATH)
    }

    pub fn error_404_path(&self) -> &str {
        self.error_404_path.as_deref().unwrap_or(DEFAULT_404_PATH)
    }
}

/// 保護ルートに入る前の判定結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// アクセストークンが無ければログインページへ送る
pub fn guard(access_token: Option<&str>, auth: &AuthPages) -> GuardDecision {
    match access_token {
        Some(token) if !token.is_empty() => GuardDecision::Allow,
        _ => GuardDecision::Redirect(auth.login_path().to_string()),
    }
}

fn leaf(path: &str, element: RouteElement) -> RoutableNode {
    RoutableNode {
        path: Some(path.to_string()),
        element: Some(element),
        ..Default::default()
    }
}

/// アプリ全体のルートテーブルを組み立てる
///
/// 1. ログインページ (設定されていれば)
/// 2. エラーページ (設定されていれば)
/// 3. "/" 保護ルート: homepage への index リダイレクト + 権限ルート
/// 4. どれにも一致しない場合の 404 リダイレクト
pub fn build_route_table(
    auth: &AuthPages,
    dashboard_layout: &str,
    homepage: &str,
    permission_routes: Vec<RoutableNode>,
) -> Vec<RoutableNode> {
    let mut routes = Vec::new();

    if let Some(login_page) = &auth.login_page {
        routes.push(leaf(
            auth.login_path(),
            RouteElement::Opaque {
                name: login_page.clone(),
            },
        ));
    }

    if let Some(error_page) = &auth.error_page {
        routes.push(leaf(
            ERROR_PATH,
            RouteElement::Opaque {
                name: error_page.clone(),
            },
        ));
    }

    let mut children = Vec::with_capacity(permission_routes.len() + 1);
    children.push(RoutableNode::index_redirect(homepage));
    children.extend(permission_routes);
    routes.push(RoutableNode {
        path: Some("/".to_string()),
        element: Some(RouteElement::Protected {
            layout: dashboard_layout.to_string(),
            login_path: auth.login_path().to_string(),
        }),
        children,
        ..Default::default()
    });

    routes.push(leaf(
        "*",
        RouteElement::Redirect {
            to: auth.error_404_path().to_string(),
        },
    ));

    routes
}
