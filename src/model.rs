// src/model.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

use crate::registry::LazyView;

/// パーミッションの種類 (カタログ = グループ / メニュー = ビューを持てる葉)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCode")]
pub enum PermissionKind {
    Catalogue,
    Menu,
}

/// パーミッションの状態。DISABLE はメニュー上で無効表示になる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawCode")]
pub enum BasicStatus {
    Disable,
    #[default]
    Enable,
}

/// セッション側は数値 (0/1) と文字列のどちらでも送ってくる
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCode {
    Num(i64),
    Text(String),
}

impl TryFrom<RawCode> for PermissionKind {
    type Error = String;

    fn try_from(raw: RawCode) -> Result<Self, Self::Error> {
        match raw {
            RawCode::Num(0) => Ok(Self::Catalogue),
            RawCode::Num(1) => Ok(Self::Menu),
            RawCode::Text(s) if s.eq_ignore_ascii_case("catalogue") => Ok(Self::Catalogue),
            RawCode::Text(s) if s.eq_ignore_ascii_case("menu") => Ok(Self::Menu),
            RawCode::Num(n) => Err(format!("unknown permission type {n}")),
            RawCode::Text(s) => Err(format!("unknown permission type `{s}`")),
        }
    }
}

impl TryFrom<RawCode> for BasicStatus {
    type Error = String;

    fn try_from(raw: RawCode) -> Result<Self, Self::Error> {
        match raw {
            RawCode::Num(0) => Ok(Self::Disable),
            RawCode::Num(1) => Ok(Self::Enable),
            RawCode::Text(s) if s.eq_ignore_ascii_case("disable") => Ok(Self::Disable),
            RawCode::Text(s) if s.eq_ignore_ascii_case("enable") => Ok(Self::Enable),
            RawCode::Num(n) => Err(format!("unknown status {n}")),
            RawCode::Text(s) => Err(format!("unknown status `{s}`")),
        }
    }
}

/// 権限ツリーの 1 ノード (1 回のコンパイル中は不変)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionNode {
    pub id: String,

    /// 親ノードの id。ルートは None (空文字列も None として扱う)
    #[serde(default, deserialize_with = "empty_as_none")]
    pub parent_id: Option<String>,

    /// 権限チェック用の名前 (例: "user.create", "user.*")
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub label: String,

    #[serde(rename = "type")]
    pub kind: PermissionKind,

    /// このノードが持つパス断片 (例: "user", ":id")
    pub route: String,

    #[serde(default)]
    pub status: BasicStatus,

    #[serde(default)]
    pub order: Option<i64>,

    #[serde(default)]
    pub icon: Option<String>,

    /// ビューローダーを指す識別子 (例: "/user/list")
    #[serde(default)]
    pub component: Option<String>,

    #[serde(default)]
    pub hide: bool,

    #[serde(default)]
    pub hide_tab: bool,

    /// iframe / 外部リンク用 URL
    #[serde(default)]
    pub frame_src: Option<String>,

    #[serde(default)]
    pub new_feature: Option<bool>,

    #[serde(default)]
    pub children: Vec<PermissionNode>,
}

impl PermissionNode {
    pub fn is_enabled(&self) -> bool {
        self.status != BasicStatus::Disable
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// メニュー / タブ表示用のメタ情報
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuMeta {
    /// 完全修飾パス。メニューの selectedKeys やタブの識別子になる
    pub key: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub hide_menu: bool,
    pub hide_tab: bool,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_feature: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_src: Option<String>,
}

/// ルーターが描画に使う要素
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RouteElement {
    /// 子ルートをそのまま描画するだけのコンテナ (ルートカタログ用)
    Outlet {
        #[serde(skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        wrappers: Vec<String>,
    },
    /// 相対パスへのリダイレクト
    Redirect { to: String },
    /// 遅延ロードされるビュー
    View {
        #[serde(serialize_with = "serialize_view")]
        view: Arc<LazyView>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        wrappers: Vec<String>,
    },
    /// フレーム URL を唯一の prop として受け取るビュー
    Frame {
        #[serde(serialize_with = "serialize_view")]
        view: Arc<LazyView>,
        src: String,
    },
    /// ログイン済みでなければ login_path へ送るレイアウト
    Protected { layout: String, login_path: String },
    /// 呼び出し元が渡した不透明な要素 (ログイン画面など)
    Opaque { name: String },
}

impl PartialEq for RouteElement {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Outlet { fallback: a, wrappers: wa },
                Self::Outlet { fallback: b, wrappers: wb },
            ) => a == b && wa == wb,
            (Self::Redirect { to: a }, Self::Redirect { to: b }) => a == b,
            (
                Self::View { view: a, fallback: fa, wrappers: wa },
                Self::View { view: b, fallback: fb, wrappers: wb },
            ) => a.key() == b.key() && fa == fb && wa == wb,
            (Self::Frame { view: a, src: sa }, Self::Frame { view: b, src: sb }) => {
                a.key() == b.key() && sa == sb
            }
            (
                Self::Protected { layout: a, login_path: la },
                Self::Protected { layout: b, login_path: lb },
            ) => a == b && la == lb,
            (Self::Opaque { name: a }, Self::Opaque { name: b }) => a == b,
            _ => false,
        }
    }
}

fn serialize_view<S>(view: &Arc<LazyView>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(view.key())
}

/// コンパイル結果の 1 ノード。ルーターはこれからルートテーブルを組み立てる
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutableNode {
    /// この階層の相対パス (先頭スラッシュなし)。index ルートは None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub index: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MenuMeta>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<RouteElement>,

    /// component が指定されていたのに解決できなかった
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub view_missing: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RoutableNode>,
}

impl RoutableNode {
    /// 相対リダイレクトだけを持つ index ルート
    pub fn index_redirect(to: impl Into<String>) -> Self {
        RoutableNode {
            index: true,
            element: Some(RouteElement::Redirect { to: to.into() }),
            ..Default::default()
        }
    }

    pub fn fully_qualified_path(&self) -> Option<&str> {
        self.meta.as_ref().map(|m| m.key.as_str())
    }

    pub fn view(&self) -> Option<&Arc<LazyView>> {
        match &self.element {
            Some(RouteElement::View { view, .. }) | Some(RouteElement::Frame { view, .. }) => {
                Some(view)
            }
            _ => None,
        }
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match &self.element {
            Some(RouteElement::Redirect { to }) => Some(to),
            _ => None,
        }
    }
}
