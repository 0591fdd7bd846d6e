//! Skill tools
//!
//! `create_skill` writes a skill file (YAML frontmatter + markdown body)
//! under the chosen scope's `skills/` directory; `activate_skill` toggles
//! skills through the injected registry.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{bool_param, required_str, string_param};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};

/// Injected skill registry collaborator.
#[async_trait]
pub trait SkillRegistry: Send + Sync {
    async fn activate(&self, skill: &str) -> anyhow::Result<()>;
    async fn deactivate(&self, skill: &str) -> anyhow::Result<()>;
    async fn active(&self) -> anyhow::Result<Vec<String>>;
    async fn reload(&self) -> anyhow::Result<()>;
}

/// Normalize a skill name to `[a-z0-9-]+`: lowercased, invalid characters
/// become dashes, dash runs collapse, no leading/trailing dash, at most 64
/// characters. Idempotent.
pub fn normalize_skill_name(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    for c in raw.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            normalized.push(c);
        } else if !normalized.ends_with('-') && !normalized.is_empty() {
            normalized.push('-');
        }
    }
    let mut normalized = normalized.trim_end_matches('-').to_string();
    normalized.truncate(64);
    normalized.trim_end_matches('-').to_string()
}

#[derive(Serialize)]
struct SkillFrontmatter<'a> {
    name: &'a str,
    description: &'a str,
}

/// Render a skill file: frontmatter block, blank line, body, trailing
/// newline.
pub(crate) fn render_skill_file(name: &str, description: &str, body: &str) -> String {
    let yaml = serde_yml::to_string(&SkillFrontmatter { name, description })
        .unwrap_or_else(|_| format!("name: {}\ndescription: {}\n", name, description));
    let mut content = format!("---\n{}---\n\n{}", yaml, body.trim_end());
    content.push('\n');
    content
}

/// Tool writing a new skill file
pub struct CreateSkill {
    options: ToolOptions,
    registry: Option<Arc<dyn SkillRegistry>>,
    /// User-scope root override, defaulting to `$HOME/.buckley`
    user_root: Option<PathBuf>,
}

impl CreateSkill {
    pub fn new(options: ToolOptions, registry: Option<Arc<dyn SkillRegistry>>) -> Self {
        Self {
            options,
            registry,
            user_root: None,
        }
    }

    pub fn with_user_root(mut self, root: PathBuf) -> Self {
        self.user_root = Some(root);
        self
    }

    fn scope_root(&self, scope: &str) -> Result<PathBuf, ToolError> {
        match scope {
            "" | "project" => {
                if self.options.workdir.as_os_str().is_empty() {
                    std::env::current_dir()
                        .map(|d| d.join(".buckley"))
                        .map_err(ToolError::Io)
                } else {
                    Ok(self.options.workdir.join(".buckley"))
                }
            }
            "user" => match &self.user_root {
                Some(root) => Ok(root.clone()),
                None => dirs::home_dir()
                    .map(|d| d.join(".buckley"))
                    .ok_or_else(|| ToolError::ExecutionFailed("home directory unknown".into())),
            },
            other => Err(ToolError::InvalidParams(format!(
                "invalid scope: {}. Must be project or user",
                other
            ))),
        }
    }
}

impl Tool for CreateSkill {
    fn name(&self) -> &str {
        "create_skill"
    }

    fn description(&self) -> &str {
        "Create a skill: writes SKILL.md (YAML frontmatter + body) under \
         the scope's skills directory and reloads the registry."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Skill name; normalized to [a-z0-9-]+"
                },
                "description": {
                    "type": "string",
                    "description": "One-line description of when to use the skill"
                },
                "body": {
                    "type": "string",
                    "description": "Markdown body of the skill"
                },
                "scope": {
                    "type": "string",
                    "description": "Where to write the skill (default project)",
                    "enum": ["project", "user"]
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Replace an existing skill (default false)",
                    "default": false
                }
            },
            "required": ["name", "description", "body"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let raw_name = required_str(&params, "name")?;
            let description = required_str(&params, "description")?;
            let body = required_str(&params, "body")?;
            let scope = string_param(&params, "scope");
            let overwrite = bool_param(&params, "overwrite", false);

            let name = normalize_skill_name(raw_name);
            if name.is_empty() {
                return Err(ToolError::InvalidParams(format!(
                    "name {:?} normalizes to nothing",
                    raw_name
                )));
            }

            let dir = self.scope_root(&scope)?.join("skills").join(&name);
            let path = dir.join("SKILL.md");
            if path.exists() && !overwrite {
                return Err(ToolError::InvalidParams(format!(
                    "skill {} already exists; pass overwrite=true to replace it",
                    name
                )));
            }

            tokio::fs::create_dir_all(&dir).await.map_err(ToolError::Io)?;
            let content = render_skill_file(&name, description, body);
            tokio::fs::write(&path, content).await.map_err(ToolError::Io)?;

            if let Some(registry) = &self.registry {
                registry
                    .reload()
                    .await
                    .map_err(|e| ToolError::ExecutionFailed(format!("registry reload: {}", e)))?;
            }

            Ok(ToolResult::ok()
                .with("name", name.clone())
                .with("path", path.display().to_string())
                .with_display("summary", format!("created skill {}", name))
                .abridged())
        })
    }
}

/// Tool toggling active skills
pub struct ActivateSkill {
    registry: Option<Arc<dyn SkillRegistry>>,
}

impl ActivateSkill {
    pub fn new(registry: Option<Arc<dyn SkillRegistry>>) -> Self {
        Self { registry }
    }
}

impl Tool for ActivateSkill {
    fn name(&self) -> &str {
        "activate_skill"
    }

    fn description(&self) -> &str {
        "Toggle skills on or off for the session. Actions: activate, \
         deactivate, list."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "Skill action to perform",
                    "enum": ["activate", "deactivate", "list"]
                },
                "skill": {
                    "type": "string",
                    "description": "Skill name (activate/deactivate)"
                }
            },
            "required": ["action"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let registry = self
                .registry
                .as_ref()
                .ok_or_else(|| ToolError::DependencyAbsent("skill registry".into()))?;
            let action = required_str(&params, "action")?;

            match action {
                "activate" | "deactivate" => {
                    let skill = normalize_skill_name(required_str(&params, "skill")?);
                    if skill.is_empty() {
                        return Err(ToolError::InvalidParams("skill is required".into()));
                    }
                    let outcome = if action == "activate" {
                        registry.activate(&skill).await
                    } else {
                        registry.deactivate(&skill).await
                    };
                    outcome.map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                    Ok(ToolResult::ok().with("action", action).with("skill", skill))
                }
                "list" => {
                    let active = registry
                        .active()
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                    Ok(ToolResult::ok()
                        .with("count", active.len() as i64)
                        .with("active", active))
                }
                other => Err(ToolError::InvalidParams(format!(
                    "unknown action: {}",
                    other
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_skill_name() {
        assert_eq!(normalize_skill_name("My Cool Skill!"), "my-cool-skill");
        assert_eq!(normalize_skill_name("--weird--input--"), "weird-input");
        assert_eq!(normalize_skill_name("already-fine-2"), "already-fine-2");
        assert_eq!(normalize_skill_name("___"), "");

        let long = "x".repeat(100);
        assert!(normalize_skill_name(&long).len() <= 64);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["My Cool Skill!", "--a--b--", "UPPER case", "tail-"] {
            let once = normalize_skill_name(raw);
            assert_eq!(normalize_skill_name(&once), once);
        }
    }

    #[test]
    fn test_render_skill_file_shape() {
        let content = render_skill_file("deploy", "Ship the service", "Run the steps.");
        assert!(content.starts_with("---\n"));
        assert!(content.contains("name: deploy\n"));
        assert!(content.contains("description: Ship the service\n"));
        assert!(content.contains("---\n\nRun the steps."));
        assert!(content.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_create_skill_writes_file() {
        let dir = TempDir::new().unwrap();
        let tool = CreateSkill::new(ToolOptions::new(dir.path()), None);

        let result = tool
            .execute(json!({
                "name": "Release Checklist",
                "description": "Use before a release",
                "body": "1. Tag\n2. Push"
            }))
            .await
            .unwrap();
        assert!(result.success);

        let path = dir
            .path()
            .join(".buckley/skills/release-checklist/SKILL.md");
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.contains("name: release-checklist"));
        assert!(content.ends_with("2. Push\n"));
    }

    #[tokio::test]
    async fn test_create_skill_overwrite_guard() {
        let dir = TempDir::new().unwrap();
        let tool = CreateSkill::new(ToolOptions::new(dir.path()), None);
        let params = json!({
            "name": "dup",
            "description": "d",
            "body": "b"
        });
        tool.execute(params.clone()).await.unwrap();
        let err = tool.execute(params.clone()).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let mut with_overwrite = params;
        with_overwrite["overwrite"] = json!(true);
        assert!(tool.execute(with_overwrite).await.is_ok());
    }

    #[tokio::test]
    async fn test_user_scope_root() {
        let dir = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let tool = CreateSkill::new(ToolOptions::new(dir.path()), None)
            .with_user_root(home.path().to_path_buf());

        tool.execute(json!({
            "name": "global-skill",
            "description": "d",
            "body": "b",
            "scope": "user"
        }))
        .await
        .unwrap();
        assert!(home.path().join("skills/global-skill/SKILL.md").exists());
    }

    #[tokio::test]
    async fn test_activate_requires_registry() {
        let err = ActivateSkill::new(None)
            .execute(json!({"action": "list"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("skill registry"));
    }
}
