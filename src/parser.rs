use swc_common::{sync::Lrc, FileName, SourceMap};
use swc_ecma_ast::*;
use swc_ecma_parser::{lexer::Lexer, Parser as SwcParser, StringInput, Syntax, TsConfig};
use swc_ecma_visit::Visit;

use std::fs;
use std::path::Path;

use crate::error::ViewLoadError;
use crate::registry::ViewModule;

/// AST をトラバースして default export を探す Visitor
#[derive(Default)]
struct DefaultExportVisitor {
    /// 見つかった default export の名前 (無名なら "default")
    default_export: Option<String>,
}

impl DefaultExportVisitor {
    fn found(&mut self, name: String) {
        // 最初に見つかったものを採用する
        if self.default_export.is_none() {
            self.default_export = Some(name);
        }
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

impl Visit for DefaultExportVisitor {
    /// `export default function Page() {}` / `export default class Page {}`
    fn visit_export_default_decl(&mut self, decl: &ExportDefaultDecl) {
        let name = match &decl.decl {
            DefaultDecl::Fn(FnExpr { ident, .. }) => ident.as_ref().map(|i| i.sym.to_string()),
            DefaultDecl::Class(ClassExpr { ident, .. }) => {
                ident.as_ref().map(|i| i.sym.to_string())
            }
            // 型だけの default export はビューにならない
            DefaultDecl::TsInterfaceDecl(_) => return,
        };
        self.found(name.unwrap_or_else(|| "default".to_string()));
    }

    /// `export default Page;` / `export default () => null;`
    fn visit_export_default_expr(&mut self, expr: &ExportDefaultExpr) {
        let name = match &*expr.expr {
            Expr::Ident(ident) => ident.sym.to_string(),
            _ => "default".to_string(),
        };
        self.found(name);
    }

    /// `export { Page as default }` / `export { default } from "./Page"`
    fn visit_named_export(&mut self, named: &NamedExport) {
        if named.type_only {
            return;
        }
        for spec in &named.specifiers {
            if let ExportSpecifier::Named(ExportNamedSpecifier {
                orig,
                exported,
                is_type_only,
                ..
            }) = spec
            {
                if *is_type_only {
                    continue;
                }
                let exported_as = exported.as_ref().unwrap_or(orig);
                if export_name(exported_as) == "default" {
                    self.found(export_name(orig));
                }
            }
        }
    }
}

/// ソース文字列をパースし、default export の名前を返す (なければ None)
pub fn find_default_export(
    file_name: FileName,
    src: String,
    tsx: bool,
) -> Result<Option<String>, String> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(file_name, src);

    // TypeScript 構文でパースする設定 (JS も TS パーサで読める)
    let syntax = Syntax::Typescript(TsConfig {
        tsx,
        decorators: true,
        dts: false,
        no_early_errors: true,
        disallow_ambiguous_jsx_like: false,
    });

    let lexer = Lexer::new(
        syntax,
        Default::default(), // es version
        StringInput::from(&*fm),
        None,
    );

    let mut parser = SwcParser::new_from(lexer);
    let module = parser
        .parse_module()
        .map_err(|e| format!("Parse error: {:?}", e))?;

    let mut visitor = DefaultExportVisitor::default();
    visitor.visit_module(&module);
    Ok(visitor.default_export)
}

/// ページファイルを読み込み、default export を持つビューモジュールとして返す
pub fn parse_view_module(file_path: &Path) -> Result<ViewModule, ViewLoadError> {
    let src = fs::read_to_string(file_path).map_err(|e| ViewLoadError::Read {
        path: file_path.to_path_buf(),
        message: e.to_string(),
    })?;

    // .ts だけは JSX を無効にする (ジェネリクスの `<T>` と衝突するため)
    let tsx = file_path.extension().is_none_or(|ext| ext != "ts");

    let default_export = find_default_export(FileName::Real(file_path.to_path_buf()), src, tsx)
        .map_err(|message| ViewLoadError::Parse {
            path: file_path.to_path_buf(),
            message,
        })?
        .ok_or_else(|| ViewLoadError::NoDefaultExport(file_path.to_path_buf()))?;

    Ok(ViewModule {
        source: file_path.display().to_string(),
        default_export,
    })
}
