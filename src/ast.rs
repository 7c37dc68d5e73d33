//! 过滤条件树: 由调用方构造, 编译器只读 (运算符归一化除外)

use serde::{Deserialize, Deserializer, Serialize};

use crate::operator::FilterOperate;

/// 条件树中的一个节点, 例如 `{ "operate": "or", "rules": [...], "groups": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterGroup {
    /// 本节点的组合运算符, 只接受 and/or, 空白或未知时按 and 处理
    #[serde(deserialize_with = "null_as_empty")]
    pub operate: String,
    /// 本节点的条件列表, 彼此之间用 and 连接
    pub rules: Vec<FilterRule>,
    /// 嵌套的子节点
    pub groups: Vec<FilterGroup>,
}

/// 单个原子条件, 例如 `{ "field": "name", "operator": "equal", "value": "bob" }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRule {
    #[serde(deserialize_with = "null_as_empty")]
    pub field: String,
    /// 原始运算符 token; 编译时未知的 token 会被原地改写为 `equal`
    #[serde(alias = "operate", deserialize_with = "null_as_empty")]
    pub operator: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub value: String,
}

impl FilterRule {
    pub fn new(field: impl Into<String>, operate: FilterOperate, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: operate.token().to_string(),
            value: value.into(),
        }
    }

    /// 已识别的运算符, token 不在运算符表中时返回 None
    pub fn operate(&self) -> Option<FilterOperate> {
        FilterOperate::from_token(&self.operator)
    }
}

impl FilterGroup {
    pub fn and() -> Self {
        Self::with_operate(FilterOperate::And)
    }

    pub fn or() -> Self {
        Self::with_operate(FilterOperate::Or)
    }

    fn with_operate(operate: FilterOperate) -> Self {
        Self {
            operate: operate.token().to_string(),
            ..Default::default()
        }
    }

    pub fn with_rule(mut self, rule: FilterRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_group(mut self, group: FilterGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// 没有任何条件和子节点的空节点
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.groups.is_empty()
    }

    /// 解析后的组合运算符
    pub fn combinator(&self) -> FilterOperate {
        FilterOperate::combinator(&self.operate)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}
