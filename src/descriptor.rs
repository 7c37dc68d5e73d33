//! Per-entity query descriptor: logical field to column mapping and the
//! projection clause derived from it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::catalog::{FieldCatalog, FieldDescriptor};

/// Quoted logical field name -> column expression, in insertion order.
pub type FieldColumnMap = IndexMap<String, String>;

const IDENT_QUOTE: char = '`';
const EMPTY_FIELD: &str = "''";
const QUALIFIER: char = '.';

/// Everything the compiler needs to know about one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    projection: String,
    source: String,
    field_map: FieldColumnMap,
}

impl QueryDescriptor {
    /// Builds the descriptor for `entity`, walking from the most-derived
    /// type up through its parents. The first declaration of a field wins.
    ///
    /// Returns `None` when the catalog does not know `entity`.
    pub fn parse(catalog: &dyn FieldCatalog, entity: &str) -> Option<Self> {
        let metadata = catalog.entity(entity)?;

        let mut field_map = FieldColumnMap::new();
        let mut visited = HashSet::new();
        let mut current = Some((entity, metadata));

        while let Some((name, declared)) = current {
            if !visited.insert(name) {
                warn!(entity, repeated = name, "inheritance chain loops, stopping field walk");
                break;
            }

            for field in declared.fields.iter().filter(|f| f.persisted) {
                field_map
                    .entry(wrap_if_missing(&field.name, IDENT_QUOTE))
                    .or_insert_with(|| column_expression(field));
            }

            current = match declared.parent.as_deref() {
                Some(parent) => {
                    let next = catalog.entity(parent).map(|m| (parent, m));
                    if next.is_none() {
                        debug!(entity, parent, "parent type not in catalog, chain ends");
                    }
                    next
                }
                None => None,
            };
        }

        let projection = field_map
            .iter()
            .map(|(field, column)| format!("{} AS {}", column, field))
            .collect::<Vec<_>>()
            .join(",");
        let source = metadata.source.clone().unwrap_or_default();

        debug!(entity, fields = field_map.len(), source = %source, "built query descriptor");

        Some(Self {
            projection,
            source,
            field_map,
        })
    }

    /// `column AS field` list for every persisted field.
    pub fn projection_clause(&self) -> &str {
        &self.projection
    }

    /// Physical source of the entity, empty if none was declared.
    pub fn source_clause(&self) -> &str {
        &self.source
    }

    pub fn field_map(&self) -> &FieldColumnMap {
        &self.field_map
    }

    /// Column expression to use for a logical field token.
    ///
    /// Blank tokens become the empty string literal, qualified tokens
    /// (`alias.column`) pass through, and unknown fields fall back to their
    /// own quoted name.
    pub fn resolve_column(&self, field: &str) -> String {
        if field.trim().is_empty() {
            return EMPTY_FIELD.to_string();
        }
        if field.contains(QUALIFIER) {
            return field.to_string();
        }

        let quoted = wrap_if_missing(field, IDENT_QUOTE);
        match self.field_map.get(&quoted) {
            Some(column) => column.clone(),
            None => quoted,
        }
    }

    /// Like [`resolve_column`](Self::resolve_column), but never lets the
    /// token escape identifier quoting: mapped fields still resolve to their
    /// declared column, everything else is quoted per dotted part with inner
    /// backticks doubled.
    pub fn resolve_column_escaped(&self, field: &str) -> String {
        if field.trim().is_empty() {
            return EMPTY_FIELD.to_string();
        }

        if !field.contains(QUALIFIER) {
            if let Some(column) = self.field_map.get(&wrap_if_missing(field, IDENT_QUOTE)) {
                return column.clone();
            }
        }

        field
            .split(QUALIFIER)
            .map(escape_identifier)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Backtick-quotes one identifier part, dropping an existing outer pair and
/// doubling any backtick left inside.
fn escape_identifier(part: &str) -> String {
    let bare = match part.strip_prefix(IDENT_QUOTE).and_then(|p| p.strip_suffix(IDENT_QUOTE)) {
        Some(inner) => inner,
        None => part,
    };
    format!("`{}`", bare.replace(IDENT_QUOTE, "``"))
}

/// Declared storage name, or the field name, as a column expression.
/// `{expr}` is embedded raw; anything else is backtick-quoted.
fn column_expression(field: &FieldDescriptor) -> String {
    let name = field
        .column
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(&field.name);

    if name.starts_with('{') && name.ends_with('}') {
        let inner = name.strip_prefix('{').unwrap_or(name);
        inner.strip_suffix('}').unwrap_or(inner).to_string()
    } else {
        wrap_if_missing(name, IDENT_QUOTE)
    }
}

/// Adds `wrap` on whichever side of `s` lacks it. Empty input is returned as is.
pub(crate) fn wrap_if_missing(s: &str, wrap: char) -> String {
    if s.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(s.len() + 2);
    if !s.starts_with(wrap) {
        out.push(wrap);
    }
    out.push_str(s);
    if !s.ends_with(wrap) {
        out.push(wrap);
    }
    out
}

/// Read-through cache of descriptors keyed by entity name.
///
/// Entries are immutable once stored; a racing second build is discarded in
/// favour of whichever descriptor was published first.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: RwLock<HashMap<String, Arc<QueryDescriptor>>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached descriptor for `entity`, building it on a miss.
    /// Unknown entities are not cached.
    pub fn get_or_parse(&self, catalog: &dyn FieldCatalog, entity: &str) -> Option<Arc<QueryDescriptor>> {
        if let Some(descriptor) = self.entries.read().get(entity) {
            trace!(entity, "descriptor cache hit");
            return Some(Arc::clone(descriptor));
        }

        let built = Arc::new(QueryDescriptor::parse(catalog, entity)?);
        let mut entries = self.entries.write();
        Some(Arc::clone(entries.entry(entity.to_string()).or_insert(built)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityMetadata, FieldDescriptor, MemoryCatalog};
    use pretty_assertions::assert_eq;

    fn user_catalog() -> MemoryCatalog {
        MemoryCatalog::new()
            .with_entity(
                "User",
                EntityMetadata::new()
                    .source("t_user")
                    .parent("BaseEntity")
                    .field(FieldDescriptor::new("name"))
                    .field(FieldDescriptor::new("userName").column("user_name"))
                    .field(FieldDescriptor::new("fullName").column("{CONCAT(first, ' ', last)}"))
                    .field(FieldDescriptor::new("password").transient())
                    .field(FieldDescriptor::new("createdAt").column("user_created")),
            )
            .with_entity(
                "BaseEntity",
                EntityMetadata::new()
                    .source("t_base")
                    .field(FieldDescriptor::new("id"))
                    .field(FieldDescriptor::new("createdAt").column("created_at")),
            )
    }

    #[test]
    fn test_parse_walks_parent_chain() {
        let descriptor = QueryDescriptor::parse(&user_catalog(), "User").unwrap();

        assert_eq!(
            descriptor.projection_clause(),
            "`name` AS `name`,`user_name` AS `userName`,CONCAT(first, ' ', last) AS `fullName`,\
             `user_created` AS `createdAt`,`id` AS `id`"
        );
        assert_eq!(descriptor.source_clause(), "t_user");
        assert_eq!(descriptor.field_map().len(), 5);
        assert!(!descriptor.field_map().contains_key("`password`"));
    }

    #[test]
    fn test_most_derived_declaration_wins() {
        let descriptor = QueryDescriptor::parse(&user_catalog(), "User").unwrap();
        assert_eq!(descriptor.field_map()["`createdAt`"], "`user_created`");
        assert_eq!(descriptor.projection_clause().matches("AS `createdAt`").count(), 1);
    }

    #[test]
    fn test_unknown_entity_is_absent() {
        assert!(QueryDescriptor::parse(&user_catalog(), "Nope").is_none());
    }

    #[test]
    fn test_missing_source_and_parent() {
        let catalog = MemoryCatalog::new().with_entity(
            "Orphan",
            EntityMetadata::new().parent("Ghost").field(FieldDescriptor::new("id")),
        );
        let descriptor = QueryDescriptor::parse(&catalog, "Orphan").unwrap();
        assert_eq!(descriptor.source_clause(), "");
        assert_eq!(descriptor.projection_clause(), "`id` AS `id`");
    }

    #[test]
    fn test_cyclic_chain_terminates() {
        let catalog = MemoryCatalog::new()
            .with_entity("A", EntityMetadata::new().parent("B").field(FieldDescriptor::new("a")))
            .with_entity("B", EntityMetadata::new().parent("A").field(FieldDescriptor::new("b")));
        let descriptor = QueryDescriptor::parse(&catalog, "A").unwrap();
        assert_eq!(descriptor.projection_clause(), "`a` AS `a`,`b` AS `b`");
    }

    #[test]
    fn test_empty_entity_has_empty_projection() {
        let catalog = MemoryCatalog::new().with_entity("Empty", EntityMetadata::new());
        let descriptor = QueryDescriptor::parse(&catalog, "Empty").unwrap();
        assert_eq!(descriptor.projection_clause(), "");
        assert!(descriptor.field_map().is_empty());
    }

    #[test]
    fn test_column_expression_quoting() {
        assert_eq!(column_expression(&FieldDescriptor::new("a")), "`a`");
        assert_eq!(column_expression(&FieldDescriptor::new("a").column("`b`")), "`b`");
        assert_eq!(column_expression(&FieldDescriptor::new("a").column("{COUNT(*)}")), "COUNT(*)");
        assert_eq!(column_expression(&FieldDescriptor::new("a").column("  ")), "`a`");
        assert_eq!(column_expression(&FieldDescriptor::new("a").column("{")), "`{`");
        assert_eq!(column_expression(&FieldDescriptor::new("a").column("{}")), "");
    }

    #[test]
    fn test_resolve_column() {
        let descriptor = QueryDescriptor::parse(&user_catalog(), "User").unwrap();

        assert_eq!(descriptor.resolve_column(""), "''");
        assert_eq!(descriptor.resolve_column("   "), "''");
        assert_eq!(descriptor.resolve_column("u.user_name"), "u.user_name");
        assert_eq!(descriptor.resolve_column("userName"), "`user_name`");
        assert_eq!(descriptor.resolve_column("`userName`"), "`user_name`");
        assert_eq!(descriptor.resolve_column("fullName"), "CONCAT(first, ' ', last)");
        assert_eq!(descriptor.resolve_column("unmapped"), "`unmapped`");
        assert_eq!(descriptor.resolve_column("password"), "`password`");
    }

    #[test]
    fn test_resolve_column_escaped() {
        let descriptor = QueryDescriptor::parse(&user_catalog(), "User").unwrap();

        assert_eq!(descriptor.resolve_column_escaped(" "), "''");
        assert_eq!(descriptor.resolve_column_escaped("userName"), "`user_name`");
        assert_eq!(descriptor.resolve_column_escaped("`userName`"), "`user_name`");
        assert_eq!(descriptor.resolve_column_escaped("fullName"), "CONCAT(first, ' ', last)");
        assert_eq!(descriptor.resolve_column_escaped("unmapped"), "`unmapped`");
        assert_eq!(descriptor.resolve_column_escaped("u.user_name"), "`u`.`user_name`");
        assert_eq!(descriptor.resolve_column_escaped("`u`.`name`"), "`u`.`name`");
        assert_eq!(descriptor.resolve_column_escaped("1=1 or u.x"), "`1=1 or u`.`x`");
        assert_eq!(
            descriptor.resolve_column_escaped("a` = 1 or `b"),
            "`a`` = 1 or ``b`"
        );
    }

    #[test]
    fn test_wrap_if_missing() {
        assert_eq!(wrap_if_missing("", '\''), "");
        assert_eq!(wrap_if_missing("bob", '\''), "'bob'");
        assert_eq!(wrap_if_missing("'bob'", '\''), "'bob'");
        assert_eq!(wrap_if_missing("bob'", '\''), "'bob'");
        assert_eq!(wrap_if_missing("'", '\''), "'");
    }

    #[test]
    fn test_cache_builds_once() {
        let catalog = user_catalog();
        let cache = DescriptorCache::new();
        assert!(cache.is_empty());

        let first = cache.get_or_parse(&catalog, "User").unwrap();
        let second = cache.get_or_parse(&catalog, "User").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        assert!(cache.get_or_parse(&catalog, "Nope").is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_shared_across_threads() {
        let catalog = Arc::new(user_catalog());
        let cache = Arc::new(DescriptorCache::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_parse(catalog.as_ref(), "User").unwrap())
            })
            .collect();

        let descriptors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let published = cache.get_or_parse(catalog.as_ref(), "User").unwrap();
        for descriptor in descriptors {
            assert_eq!(*descriptor, *published);
        }
        assert_eq!(cache.len(), 1);
    }
}
