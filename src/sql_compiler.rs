//! Predicate compiler that turns a `FilterGroup` tree into a WHERE-clause
//! string, and assembles full SELECT statements using sea-query.
//!
//! ```text
//! compile(group)
//!   ├─ compile_rules(group.rules)    -> "(r1 and r2 ...)"   or ""
//!   ├─ compile(g) for g in groups    -> joined with " and " or ""
//!   └─ combine
//!        ├─ both empty   -> None
//!        ├─ one side     -> that side, unchanged
//!        └─ both         -> "(own <operate> nested)"
//! ```
//!
//! Values are embedded inline. With the default [`ValueEscaping::Verbatim`]
//! a single quote inside a value ends the literal early and a field token
//! containing `.` or a backtick is embedded as written, so untrusted input
//! must either be checked upstream or compiled with
//! [`ValueEscaping::Escaped`], which escapes values and quotes every field
//! token that is not a mapped field.

use sea_query::{Asterisk, Expr, Iden, MysqlQueryBuilder, Query, QueryStatementWriter};
use tracing::debug;

use crate::ast::{FilterGroup, FilterRule};
use crate::config::{CompilerConfig, ValueEscaping};
use crate::descriptor::{wrap_if_missing, QueryDescriptor};
use crate::operator::FilterOperate;

const VALUE_QUOTE: char = '\'';
const IN_DELIMITER: char = ',';

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct SourceName(pub String);

impl Iden for SourceName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Compiles filter trees against one entity's descriptor.
pub struct FilterCompiler<'a> {
    descriptor: &'a QueryDescriptor,
    config: CompilerConfig,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(descriptor: &'a QueryDescriptor) -> Self {
        Self {
            descriptor,
            config: CompilerConfig::default(),
        }
    }

    pub fn with_config(descriptor: &'a QueryDescriptor, config: CompilerConfig) -> Self {
        Self { descriptor, config }
    }

    /// Compiles `group` into a boolean predicate.
    ///
    /// Returns `None` for an absent group or when no rule survives. Rules
    /// with an operator token outside the operator table are rewritten to
    /// `equal` in place, which is why the tree is borrowed mutably; fields
    /// and values are never modified. An `in` rule whose value is nothing but
    /// commas is dropped as well, since it has no members to test.
    pub fn compile(&self, group: Option<&mut FilterGroup>) -> Option<String> {
        self.compile_group(group?)
    }

    fn compile_group(&self, group: &mut FilterGroup) -> Option<String> {
        if group.is_empty() {
            return None;
        }

        let own = self.compile_rules(&mut group.rules);

        let nested = group
            .groups
            .iter_mut()
            .filter_map(|inner| self.compile_group(inner))
            .filter(|inner| !inner.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" and ");

        match (own.trim().is_empty(), nested.trim().is_empty()) {
            (true, true) => None,
            (true, false) => Some(nested),
            (false, true) => Some(own),
            (false, false) => Some(format!("({} {} {})", own, group.combinator().sql(), nested)),
        }
    }

    /// Renders the rules of one group joined by `and` and wrapped in a single
    /// pair of parentheses, or an empty string if every rule was dropped.
    fn compile_rules(&self, rules: &mut [FilterRule]) -> String {
        let mut predicates = Vec::with_capacity(rules.len());

        for rule in rules.iter_mut() {
            let field = rule.field.trim();
            let value = rule.value.trim();
            if field.is_empty() || value.is_empty() {
                debug!(field = %rule.field, "dropping rule with blank field or value");
                continue;
            }

            let operate = match rule.operate() {
                Some(operate) => operate,
                None => {
                    debug!(field, operator = %rule.operator, "unknown operator, using equal");
                    rule.operator = FilterOperate::Equal.token().to_string();
                    FilterOperate::Equal
                }
            };

            let column = match self.config.value_escaping {
                ValueEscaping::Verbatim => self.descriptor.resolve_column(field),
                ValueEscaping::Escaped => self.descriptor.resolve_column_escaped(field),
            };
            let predicate = if operate == FilterOperate::In {
                let members = value.trim_matches(IN_DELIMITER);
                if members.is_empty() {
                    debug!(field, "dropping in rule without members");
                    continue;
                }
                format!("FIND_IN_SET({},{})", column, self.quote_value(members))
            } else {
                let decorated = operate.decorate_value(value);
                format!("{} {} {}", column, operate.sql(), self.quote_value(&decorated))
            };
            predicates.push(predicate);
        }

        if predicates.is_empty() {
            String::new()
        } else {
            format!("({})", predicates.join(" and "))
        }
    }

    fn quote_value(&self, value: &str) -> String {
        match self.config.value_escaping {
            ValueEscaping::Verbatim => wrap_if_missing(value, VALUE_QUOTE),
            ValueEscaping::Escaped => {
                format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
            }
        }
    }

    /// Assembles `SELECT <projection> FROM <source> WHERE <predicate>`.
    ///
    /// Falls back to `*` when the entity has no persisted fields, and leaves
    /// out FROM or WHERE when the source or the predicate is empty.
    pub fn build_select(&self, group: Option<&mut FilterGroup>) -> String {
        let mut select = Query::select();

        let projection = self.descriptor.projection_clause();
        if projection.is_empty() {
            select.column(Asterisk);
        } else {
            select.expr(Expr::cust(projection));
        }

        let source = self.descriptor.source_clause().trim().trim_matches('`');
        match source.split_once('.') {
            Some((schema, table)) => {
                select.from((
                    SourceName(schema.trim_matches('`').to_string()),
                    SourceName(table.trim_matches('`').to_string()),
                ));
            }
            None if !source.is_empty() => {
                select.from(SourceName(source.to_string()));
            }
            None => {}
        }

        if let Some(predicate) = self.compile(group) {
            select.and_where(Expr::cust(predicate));
        }

        select.to_string(MysqlQueryBuilder)
    }
}
