// src/permission.rs
use serde::{Deserialize, Serialize};

use crate::model::PermissionNode;
use crate::tree::flatten;

/// ユーザーに割り当てられたロール
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
}

/// 複数の権限をまとめて判定するときの結合方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    And,
    #[default]
    Or,
}

/// 細粒度の権限チェック (ボタンの表示可否など)
#[derive(Debug, Clone)]
pub struct PermissionChecker<'a> {
    role: Option<&'a Role>,
    /// 有効な権限だけをフラット化したもの
    permissions: Vec<&'a PermissionNode>,
    super_admin: bool,
}

impl<'a> PermissionChecker<'a> {
    pub fn new(
        role: Option<&'a Role>,
        permissions: &'a [PermissionNode],
        super_admin_role: &str,
    ) -> Self {
        let permissions: Vec<&PermissionNode> = flatten(permissions)
            .into_iter()
            .filter(|p| p.is_enabled())
            .collect();
        let super_admin = role.is_some_and(|r| r.id == super_admin_role)
            || permissions.iter().any(|p| p.name == "*" || p.id == "*");
        PermissionChecker {
            role,
            permissions,
            super_admin,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.super_admin
    }

    /// 有効な権限 (フラット)
    pub fn permissions(&self) -> &[&'a PermissionNode] {
        &self.permissions
    }

    /// 権限を 1 つでも (Or) / すべて (And) 持っているか
    ///
    /// `user.*` のような名前はプレフィックス一致として扱う。
    pub fn can<S: AsRef<str>>(&self, checks: &[S], mode: CheckMode) -> bool {
        if self.super_admin {
            return true;
        }
        if self.permissions.is_empty() {
            return false;
        }

        let mut results = checks.iter().map(|check| self.has(check.as_ref()));
        match mode {
            CheckMode::And => results.all(|ok| ok),
            CheckMode::Or => results.any(|ok| ok),
        }
    }

    fn has(&self, check: &str) -> bool {
        self.permissions.iter().any(|item| {
            if item.name == check || item.id == check {
                return true;
            }
            item.name
                .strip_suffix(".*")
                .is_some_and(|prefix| check.starts_with(prefix))
        })
    }

    /// ロール id または名前が一致するか (スーパー管理者は常に true)
    pub fn is(&self, role_name: &str) -> bool {
        let Some(role) = self.role else {
            return false;
        };
        self.super_admin || role.id == role_name || role.name == role_name
    }
}
