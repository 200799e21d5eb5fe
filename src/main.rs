use std::io::Read;

use clap::Parser;
use kbase::cli::{Cli, Commands};
use kbase::commands;
use kbase::item::KnowledgeItem;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Search {
            query,
            top_k,
            kb,
            category,
            tags,
        }) => {
            let tags = commands::parse_tags(tags);
            let results = commands::search(&query, top_k, kb.as_deref(), category, tags)?;

            if results.is_empty() {
                println!("No matches found for '{query}'");
            } else {
                for result in &results {
                    let title = result.item.title.as_deref().unwrap_or("");
                    println!("{:.3}  {}  {}", result.score, result.item.id, title);
                }
                println!("{} result(s) found", results.len());
            }
            Ok(())
        }
        Some(Commands::List { kb, category, tags }) => {
            let tags = commands::parse_tags(tags);
            let items = commands::list(&kb, category.as_deref(), &tags)?;

            if items.is_empty() {
                println!("No items found");
            } else {
                for item in &items {
                    let category = item.category.as_deref().unwrap_or("uncategorized");
                    if item.tags.is_empty() {
                        println!("{category}: {}", item.id);
                    } else {
                        println!("{category}: {} [{}]", item.id, item.tags.join(", "));
                    }
                }
            }
            Ok(())
        }
        Some(Commands::Add {
            kb,
            id,
            title,
            category,
            tags,
            file,
        }) => {
            let content = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("Failed to read file {path}: {e}"))?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };

            let mut item = KnowledgeItem::new(id.clone(), content)
                .with_tags(commands::parse_tags(tags));
            if let Some(title) = title {
                item = item.with_title(title);
            }
            if let Some(category) = category {
                item = item.with_category(category);
            }

            commands::add(&kb, item)?;
            println!("Added: {id}");
            Ok(())
        }
        Some(Commands::Get { kb, id }) => {
            let item = commands::get(&kb, &id)?;
            println!("{}", item.content);
            Ok(())
        }
        Some(Commands::Delete { kb, id }) => {
            if commands::delete(&kb, &id)? {
                println!("Deleted: {id}");
            } else {
                println!("No item with id '{id}'");
            }
            Ok(())
        }
        Some(Commands::Summary) => {
            let summary = commands::summary()?;
            println!("{} knowledge base(s)", summary.total_knowledge_bases);
            for kb in &summary.knowledge_bases {
                let state = if kb.enabled { "enabled" } else { "disabled" };
                let total = kb
                    .stats
                    .get("total_items")
                    .and_then(serde_json::Value::as_u64)
                    .map_or_else(|| "?".to_string(), |n| n.to_string());
                println!("{} ({}, {state}): {total} item(s)", kb.name, kb.backend_type);
            }
            Ok(())
        }
        None => {
            Cli::parse_from(["kbase", "--help"]);
            Ok(())
        }
    }
}
