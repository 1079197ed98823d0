use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::config::{config, StorageBackend};
use crate::database::models::TreeNode;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(fields)) = data {
                if let Some(object) = response.as_object_mut() {
                    object.extend(fields);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Commands that persist anything need the shared database
pub fn require_postgres() -> anyhow::Result<()> {
    if config().database.backend != StorageBackend::Postgres {
        anyhow::bail!(
            "this command needs STORAGE_BACKEND=postgres; the memory backend lives only inside a server process"
        );
    }
    Ok(())
}

/// Indented `name (type)` lines, one per node, depth first
pub fn render_tree(nodes: &[TreeNode]) -> String {
    fn walk(node: &TreeNode, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("{} ({})\n", node.position.name, node.position.kind));
        for child in &node.children {
            walk(child, depth + 1, out);
        }
    }

    let mut out = String::new();
    for node in nodes {
        walk(node, 0, &mut out);
    }
    out
}
