use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use filter_compiler::config::{self, CompilerConfig, ValueEscaping};
use filter_compiler::{
    DescriptorCache, EntityMetadata, FieldDescriptor, FilterCompiler, FilterGroup, MemoryCatalog,
};

const CATALOG_FILE: &str = "entity_catalog.json";

/// 内置的演示实体元数据，在没有配置文件时使用
fn default_catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_entity(
            "User",
            EntityMetadata::new()
                .source("t_user")
                .parent("BaseEntity")
                .field(FieldDescriptor::new("userName").column("user_name"))
                .field(FieldDescriptor::new("tags"))
                .field(FieldDescriptor::new("displayName").column("{CONCAT(first_name, ' ', last_name)}"))
                .field(FieldDescriptor::new("password").transient()),
        )
        .with_entity(
            "BaseEntity",
            EntityMetadata::new()
                .field(FieldDescriptor::new("id"))
                .field(FieldDescriptor::new("createdAt").column("created_at")),
        )
}

/// 优先使用JSON配置，失败时使用内置元数据
fn load_catalog() -> MemoryCatalog {
    match config::load_catalog(CATALOG_FILE) {
        Ok(catalog) => {
            println!("✅ 成功从JSON配置文件加载实体元数据: {}", CATALOG_FILE);
            catalog
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用内置元数据", e);
            default_catalog()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("--- Filter Compiler: 条件树到 SQL 谓词 ---");

    let catalog = load_catalog();
    let cache = DescriptorCache::new();
    let descriptor = cache
        .get_or_parse(&catalog, "User")
        .ok_or_else(|| anyhow!("实体 User 不在元数据中"))?;

    println!("\n[投影]:\n{}", descriptor.projection_clause());
    println!("[来源]: {}", descriptor.source_clause());

    let filter_json = r#"{
        "operate": "or",
        "rules": [
            { "field": "userName", "operator": "startwith", "value": "bo" },
            { "field": "createdAt", "operator": "greaterorequal", "value": "2024-01-01" }
        ],
        "groups": [
            { "rules": [
                { "field": "tags", "operator": "in", "value": ",vip,admin," },
                { "field": "displayName", "operator": "like", "value": "O'Brien" }
            ] }
        ]
    }"#;
    println!("\n[输入条件树]:\n{}", filter_json);

    let mut group: FilterGroup = serde_json::from_str(filter_json).context("无法解析条件树JSON")?;

    let compiler = FilterCompiler::new(&descriptor);
    match compiler.compile(Some(&mut group)) {
        Some(predicate) => println!("\n[谓词]:\n{}", predicate),
        None => println!("\n[谓词]: (空)"),
    }
    if let Some(rule) = group.groups.first().and_then(|g| g.rules.get(1)) {
        println!("\n[归一化后的运算符]: {} -> {}", rule.field, rule.operator);
    }

    let hardened = FilterCompiler::with_config(
        &descriptor,
        CompilerConfig {
            value_escaping: ValueEscaping::Escaped,
        },
    );
    println!("\n[转义模式 SQL]:\n{}", hardened.build_select(Some(&mut group)));

    Ok(())
}
