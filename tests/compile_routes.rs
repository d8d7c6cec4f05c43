use std::fs;
use std::sync::Arc;

use app_shell_router::error::{StructuralAnomaly, ViewLoadError};
use app_shell_router::path::RoutePathResolver;
use app_shell_router::resolver::resolve_component_key;
use app_shell_router::tree::flatten;
use app_shell_router::{
    Diagnostic, PermissionNode, RoutableNode, RouteCompiler, RouteElement, UiAffordances, ViewModule,
    ViewRegistry,
};

fn forest(json: &str) -> Vec<PermissionNode> {
    serde_json::from_str(json).expect("valid permission json")
}

fn registry(keys: &[&str]) -> ViewRegistry {
    let mut registry = ViewRegistry::new();
    for key in keys {
        let source = key.to_string();
        registry.insert(
            *key,
            Arc::new(move || {
                Ok::<_, ViewLoadError>(ViewModule {
                    source: source.clone(),
                    default_export: "default".into(),
                })
            }),
        );
    }
    registry
}

const MANAGEMENT: &str = r#"[
  {"id": "m", "parentId": "", "label": "sys.menu.management", "icon": "ic-management",
   "type": 0, "route": "management", "order": 2,
   "children": [
     {"id": "m-user", "parentId": "m", "label": "sys.menu.user", "type": 0, "route": "user",
      "children": [
        {"id": "m-user-profile", "parentId": "m-user", "label": "sys.menu.profile", "type": 1,
         "route": "profile", "component": "/management/user/profile"},
        {"id": "m-user-account", "parentId": "m-user", "label": "sys.menu.account", "type": 1,
         "route": "account", "component": "/management/user/account", "hide": true}
      ]},
     {"id": "m-system", "parentId": "m", "label": "sys.menu.system", "type": 0, "route": "system",
      "children": [
        {"id": "m-system-user-detail", "parentId": "m-system", "label": "sys.menu.user_detail",
         "type": 1, "route": "user/:id", "component": "/management/system/user/detail",
         "hideTab": true}
      ]}
   ]},
  {"id": "d", "label": "sys.menu.dashboard", "type": 1, "route": "workbench",
   "component": "/dashboard/workbench", "order": 1}
]"#;

fn pages() -> ViewRegistry {
    registry(&[
        "./pages/management/user/profile/index.tsx",
        "./pages/management/user/account/index.tsx",
        "./pages/management/system/user/detail.tsx",
        "./pages/dashboard/workbench/index.tsx",
    ])
}

#[test]
fn flatten_counts_every_permission_once() {
    let permissions = forest(MANAGEMENT);
    let ids: Vec<&str> = flatten(&permissions).iter().map(|p| p.id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "m",
            "m-user",
            "m-user-profile",
            "m-user-account",
            "m-system",
            "m-system-user-detail",
            "d"
        ]
    );
}

#[test]
fn full_paths_follow_the_parent_chain() {
    let permissions = forest(MANAGEMENT);
    let out = RouteCompiler::new()
        .compile(&permissions, &pages(), &UiAffordances::default())
        .unwrap();
    assert!(out.diagnostics.is_empty());

    let management = &out.routes[0];
    let user = &management.children[1];
    assert_eq!(user.fully_qualified_path(), Some("/management/user"));
    assert_eq!(user.children[0].redirect_target(), Some("profile"));
    assert_eq!(
        user.children[1].fully_qualified_path(),
        Some("/management/user/profile")
    );
    assert!(user.children[2].meta.as_ref().unwrap().hide_menu);

    let detail = &management.children[2].children[1];
    assert_eq!(detail.path.as_deref(), Some("user/:id"));
    assert_eq!(
        detail.fully_qualified_path(),
        Some("/management/system/user/:id")
    );
    assert_eq!(
        detail.view().map(|v| v.key()),
        Some("./pages/management/system/user/detail.tsx")
    );
}

#[test]
fn repeated_resolution_hits_the_cache() {
    let permissions = forest(
        r#"[{"id": "1", "type": 0, "route": "root", "children": [
              {"id": "2", "parentId": "1", "type": 0, "route": "settings", "children": [
                {"id": "3", "parentId": "2", "type": 1, "route": "detail"}]}]}]"#,
    );
    let flat = flatten(&permissions);
    let leaf = flat[2];
    let resolver = RoutePathResolver::new();

    let first = resolver.resolve(leaf, &flat).path;
    let lookups = resolver.lookup_count();
    let second = resolver.resolve(leaf, &flat).path;
    assert_eq!(first, "/root/settings/detail");
    assert_eq!(first, second);
    assert_eq!(resolver.lookup_count(), lookups);
}

#[test]
fn catalogue_redirects_to_first_child_segment() {
    let permissions = forest(
        r#"[{"id": "c", "type": 0, "route": "group", "children": [
              {"id": "x", "parentId": "c", "type": 1, "route": "x-seg"},
              {"id": "y", "parentId": "c", "type": 1, "route": "y-seg"}]}]"#,
    );
    let out = RouteCompiler::new()
        .compile(&permissions, &ViewRegistry::new(), &UiAffordances::default())
        .unwrap();
    let children = &out.routes[0].children;
    assert_eq!(children.len(), 3);
    assert_eq!(
        children[0].element,
        Some(RouteElement::Redirect {
            to: "x-seg".into()
        })
    );
    assert_eq!(children[1].path.as_deref(), Some("x-seg"));
    assert_eq!(children[2].path.as_deref(), Some("y-seg"));
}

#[test]
fn dangling_parent_is_not_fatal() {
    let permissions = forest(
        r#"[{"id": "ok", "type": 1, "route": "ok"},
            {"id": "lost", "parentId": "ghost", "type": 1, "route": "lost",
             "children": [{"id": "lost-child", "parentId": "lost", "type": 1, "route": "child"}]}]"#,
    );
    let out = RouteCompiler::new()
        .compile(&permissions, &ViewRegistry::new(), &UiAffordances::default())
        .unwrap();

    assert_eq!(out.routes[0].fully_qualified_path(), Some("/ok"));
    assert_eq!(out.routes[1].fully_qualified_path(), Some("/lost"));
    assert_eq!(
        out.routes[1].children[0].fully_qualified_path(),
        Some("/lost/child")
    );
    assert_eq!(
        out.diagnostics,
        vec![Diagnostic::Structural(StructuralAnomaly::ParentNotFound {
            id: "lost".into(),
            parent_id: "ghost".into()
        })]
    );
    assert_eq!(out.diagnostics[0].node_id(), "lost");
}

#[test]
fn component_search_tries_prefixes_and_suffixes() {
    let registry = registry(&["pages/user/list.tsx"]);
    assert_eq!(
        resolve_component_key("user/list", &registry).as_deref(),
        Some("pages/user/list.tsx")
    );
    assert_eq!(resolve_component_key("user/missing", &registry), None);
}

#[test]
fn recompiling_is_idempotent_with_identical_views() {
    let permissions = forest(MANAGEMENT);
    let registry = pages();
    let compiler = RouteCompiler::new();
    let ui = UiAffordances {
        loading_indicator: Some("CircleLoading".into()),
        wrappers: vec!["Suspense".into()],
    };

    let first = compiler.compile(&permissions, &registry, &ui).unwrap();
    let second = compiler.compile(&permissions, &registry, &ui).unwrap();
    assert_eq!(first, second);

    let views = |routes: &[RoutableNode]| -> Vec<_> {
        flatten(routes)
            .into_iter()
            .filter_map(|r| r.view().cloned())
            .collect()
    };
    let a = views(&first.routes);
    let b = views(&second.routes);
    assert_eq!(a.len(), 4);
    for (x, y) in a.iter().zip(&b) {
        assert!(Arc::ptr_eq(x, y));
    }
}

#[test]
fn pages_directory_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pages = dir.path().join("pages");
    fs::create_dir_all(pages.join("dashboard/workbench")).unwrap();
    fs::write(
        pages.join("dashboard/workbench/index.tsx"),
        "export default function Workbench() { return <section/>; }",
    )
    .unwrap();
    fs::write(pages.join("broken.tsx"), "export const notDefault = 1;").unwrap();

    let registry = ViewRegistry::from_pages_dir(&pages, "./pages/").unwrap();
    let permissions = forest(
        r#"[{"id": "d", "type": 1, "route": "workbench", "component": "dashboard/workbench"},
            {"id": "b", "type": 1, "route": "broken", "component": "broken"}]"#,
    );
    let out = RouteCompiler::new()
        .compile(&permissions, &registry, &UiAffordances::default())
        .unwrap();

    let workbench = out.routes[0].view().unwrap();
    assert!(!workbench.is_loaded());
    assert_eq!(workbench.load().unwrap().default_export, "Workbench");
    assert!(workbench.is_loaded());

    let broken = out.routes[1].view().unwrap();
    assert!(matches!(
        broken.load(),
        Err(ViewLoadError::NoDefaultExport(_))
    ));
}
