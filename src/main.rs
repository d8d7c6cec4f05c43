// src/main.rs

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app_shell_router::config::{load_permissions, ShellConfig};
use app_shell_router::menu::menu_routes;
use app_shell_router::shell::build_route_table;
use app_shell_router::tree::flatten;
use app_shell_router::{RoutableNode, RouteCompiler, ViewRegistry};

/// CLI 引数定義
#[derive(Parser, Debug)]
#[command(
    name = "App Shell Router",
    version = "0.1.0",
    about = "権限ツリーを遅延ロード付きのルートツリーへコンパイルして JSON 出力する CLI ツール"
)]
struct Cli {
    /// ページモジュールを置いたディレクトリ
    /// 例: `--pages-root C:/path/to/my-app/src/pages`
    #[arg(short = 'r', long = "pages-root", value_name = "DIR")]
    pages_root: PathBuf,

    /// レジストリのキーに付けるプレフィックス (バンドラの glob と合わせる)
    #[arg(long = "key-prefix", default_value = "./pages/")]
    key_prefix: String,

    /// シェル設定 (JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// 権限ツリー (JSON)。省略時は設定の defaultPermissions を使う
    #[arg(short = 'p', long = "permissions", value_name = "FILE")]
    permissions: Option<PathBuf>,

    /// ルートテーブルの代わりにサイドバー用のメニューを出力する
    #[arg(long = "menu")]
    menu: bool,

    /// 解決できたビューを実際にロードして default export を確認する
    #[arg(long = "load-views")]
    load_views: bool,

    /// テナント判定に使うホスト名
    #[arg(long = "host", default_value = "localhost")]
    host: String,

    /// テナント判定に使うパス
    #[arg(long = "path", default_value = "/")]
    path: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    app: Option<String>,
    routes: Vec<RoutableNode>,
    diagnostics: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ログは stderr へ (stdout は JSON のみ)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 1) CLI 引数をパースし、設定を読み込む
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let config = ShellConfig::from_file(path)?;
            config.settings.validate()?;
            config
        }
        None => ShellConfig::default(),
    };

    // 2) pages ディレクトリからビューレジストリを作る
    let registry = ViewRegistry::from_pages_dir(&cli.pages_root, &cli.key_prefix)?;
    info!(views = registry.len(), "view registry ready");

    // 3) 権限ツリーを決める
    let permissions = match &cli.permissions {
        Some(path) => load_permissions(path)?,
        None => config.default_permissions.clone(),
    };

    let app = config
        .settings
        .app_registry
        .detect(&cli.host, &cli.path)
        .map(|app| app.id.clone());

    // 4) コンパイル
    let compiler = RouteCompiler::new();
    let compilation = compiler.compile(&permissions, &registry, &config.components)?;

    if cli.load_views {
        for route in flatten(&compilation.routes) {
            if let Some(view) = route.view() {
                if let Err(err) = view.load() {
                    warn!(key = view.key(), error = %err, "view failed to load");
                }
            }
        }
    }

    // 5) 出力するツリーを選ぶ
    let routes = if cli.menu {
        menu_routes(&compilation.routes)
    } else {
        build_route_table(
            &config.auth,
            &config.dashboard_layout,
            &config.settings.homepage,
            compilation.routes,
        )
    };

    let output = Output {
        app,
        routes,
        diagnostics: compilation
            .diagnostics
            .iter()
            .map(ToString::to_string)
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
