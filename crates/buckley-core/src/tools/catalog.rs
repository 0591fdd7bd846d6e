//! Standard tool catalog
//!
//! One builder wires every tool from a shared [`ToolOptions`] plus whatever
//! collaborators the host injects. Tools whose collaborator is absent are
//! still registered; they report the missing dependency at call time.

use std::path::PathBuf;
use std::sync::Arc;

use crate::delegation::DelegationGuard;
use crate::tools::browse::BrowseUrl;
use crate::tools::browser::{
    BrowserAct, BrowserClipboard, BrowserClose, BrowserManager, BrowserNavigate, BrowserObserve,
    BrowserStart, BrowserStream,
};
use crate::tools::compact::{CompactContext, ContextCompactor};
use crate::tools::delegate::{InvokePeer, SpawnSubagent};
use crate::tools::edit::{DeleteLines, EditFile, InsertText, SearchReplace};
use crate::tools::excel::{ExcelTool, WorkbookStore};
use crate::tools::fluffy::FluffyAgent;
use crate::tools::fs::{
    ApplyPatch, DeleteFile, FileExists, FindFiles, GetFileInfo, ListDirectory, MoveFile, ReadFile,
    WriteFile,
};
use crate::tools::git::{
    GitBlame, GitDiff, GitLog, GitStatus, ListMergeConflicts, MarkConflictResolved,
};
use crate::tools::index::{ContextStore, EmbeddingsSearcher, LookupContext, ManageEmbeddingsIndex, SemanticSearch};
use crate::tools::memory::{MemoryStore, SessionMemory};
use crate::tools::quality::{AnalyzeComplexity, FindDuplicates};
use crate::tools::refactor::{ExtractFunction, RenameSymbol};
use crate::tools::scaffold::{ExplainCode, GenerateDocstring, GenerateTest};
use crate::tools::search::{CodeIndex, FindReferences, FindSymbol, GetFunctionSignature, SearchText};
use crate::tools::shell::RunShell;
use crate::tools::skill::{ActivateSkill, CreateSkill, SkillRegistry};
use crate::tools::testing::RunTests;
use crate::tools::todo::{PlanningClient, TodoStore, TodoTool};
use crate::tools::{ToolDefinition, ToolOptions, ToolRegistry};

/// Builder for the standard tool registry.
pub struct ToolRegistryBuilder {
    options: ToolOptions,
    guard: Option<Arc<DelegationGuard>>,
    with_delegation: bool,
    code_index: Option<Arc<dyn CodeIndex>>,
    workbook_store: Option<Arc<dyn WorkbookStore>>,
    todo_store: Option<Arc<dyn TodoStore>>,
    planner: Option<Arc<dyn PlanningClient>>,
    context_store: Option<Arc<dyn ContextStore>>,
    embeddings: Option<Arc<dyn EmbeddingsSearcher>>,
    memory_store: Option<Arc<dyn MemoryStore>>,
    skill_registry: Option<Arc<dyn SkillRegistry>>,
    compactor: Option<Arc<dyn ContextCompactor>>,
    browser_manager: Option<Arc<dyn BrowserManager>>,
}

impl ToolRegistryBuilder {
    pub fn new(options: ToolOptions) -> Self {
        Self {
            options,
            guard: None,
            with_delegation: true,
            code_index: None,
            workbook_store: None,
            todo_store: None,
            planner: None,
            context_store: None,
            embeddings: None,
            memory_store: None,
            skill_registry: None,
            compactor: None,
            browser_manager: None,
        }
    }

    pub fn for_workdir(workdir: impl Into<PathBuf>) -> Self {
        Self::new(ToolOptions::new(workdir))
    }

    /// Override the process-wide delegation guard (tests mostly).
    pub fn with_guard(mut self, guard: Arc<DelegationGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Skip the delegation tools entirely.
    pub fn with_delegation(mut self, enabled: bool) -> Self {
        self.with_delegation = enabled;
        self
    }

    pub fn with_code_index(mut self, index: Arc<dyn CodeIndex>) -> Self {
        self.code_index = Some(index);
        self
    }

    pub fn with_workbook_store(mut self, store: Arc<dyn WorkbookStore>) -> Self {
        self.workbook_store = Some(store);
        self
    }

    pub fn with_todo_store(mut self, store: Arc<dyn TodoStore>) -> Self {
        self.todo_store = Some(store);
        self
    }

    pub fn with_planner(mut self, planner: Arc<dyn PlanningClient>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_context_store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.context_store = Some(store);
        self
    }

    pub fn with_embeddings(mut self, searcher: Arc<dyn EmbeddingsSearcher>) -> Self {
        self.embeddings = Some(searcher);
        self
    }

    pub fn with_memory_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.memory_store = Some(store);
        self
    }

    pub fn with_skill_registry(mut self, registry: Arc<dyn SkillRegistry>) -> Self {
        self.skill_registry = Some(registry);
        self
    }

    pub fn with_compactor(mut self, compactor: Arc<dyn ContextCompactor>) -> Self {
        self.compactor = Some(compactor);
        self
    }

    pub fn with_browser_manager(mut self, manager: Arc<dyn BrowserManager>) -> Self {
        self.browser_manager = Some(manager);
        self
    }

    pub fn build(self) -> ToolRegistry {
        let options = self.options;
        let guard = self.guard.unwrap_or_else(DelegationGuard::global);
        let mut registry = ToolRegistry::new();

        // Filesystem
        registry.register(Arc::new(ReadFile::new(options.clone())));
        registry.register(Arc::new(WriteFile::new(options.clone())));
        registry.register(Arc::new(ListDirectory::new(options.clone())));
        registry.register(Arc::new(FindFiles::new(options.clone())));
        registry.register(Arc::new(FileExists::new(options.clone())));
        registry.register(Arc::new(GetFileInfo::new(options.clone())));
        registry.register(Arc::new(ApplyPatch::new(options.clone())));
        registry.register(Arc::new(DeleteFile::new(options.clone())));
        registry.register(Arc::new(MoveFile::new(options.clone())));

        // Editing
        registry.register(Arc::new(EditFile::new(options.clone())));
        registry.register(Arc::new(SearchReplace::new(options.clone())));
        registry.register(Arc::new(InsertText::new(options.clone())));
        registry.register(Arc::new(DeleteLines::new(options.clone())));

        // Search
        registry.register(Arc::new(SearchText::new(options.clone())));
        registry.register(Arc::new(FindSymbol::new(
            options.clone(),
            self.code_index.clone(),
        )));
        registry.register(Arc::new(FindReferences::new(
            options.clone(),
            self.code_index.clone(),
        )));
        registry.register(Arc::new(GetFunctionSignature::new(
            options.clone(),
            self.code_index,
        )));

        // Git
        registry.register(Arc::new(GitStatus::new(options.clone())));
        registry.register(Arc::new(GitDiff::new(options.clone())));
        registry.register(Arc::new(GitLog::new(options.clone())));
        registry.register(Arc::new(GitBlame::new(options.clone())));
        registry.register(Arc::new(ListMergeConflicts::new(options.clone())));
        registry.register(Arc::new(MarkConflictResolved::new(options.clone())));

        // Shell and delegation
        registry.register(Arc::new(RunShell::new(options.clone())));
        if self.with_delegation {
            registry.register(Arc::new(InvokePeer::codex(options.clone(), guard.clone())));
            registry.register(Arc::new(InvokePeer::claude(options.clone(), guard.clone())));
            registry.register(Arc::new(InvokePeer::buckley(options.clone(), guard.clone())));
            registry.register(Arc::new(SpawnSubagent::new(options.clone(), guard)));
        }

        // Tests, refactoring, quality
        registry.register(Arc::new(RunTests::new(options.clone())));
        registry.register(Arc::new(RenameSymbol::new(options.clone())));
        registry.register(Arc::new(ExtractFunction::new(options.clone())));
        registry.register(Arc::new(AnalyzeComplexity::new(options.clone())));
        registry.register(Arc::new(FindDuplicates::new(options.clone())));
        registry.register(Arc::new(GenerateTest::new(options.clone())));
        registry.register(Arc::new(GenerateDocstring::new(options.clone())));
        registry.register(Arc::new(ExplainCode::new(options.clone())));

        // Documents and web
        registry.register(Arc::new(ExcelTool::new(
            options.clone(),
            self.workbook_store,
        )));
        registry.register(Arc::new(BrowseUrl::new()));

        // Collaborator-backed tools
        registry.register(Arc::new(TodoTool::new(self.todo_store, self.planner)));
        registry.register(Arc::new(LookupContext::new(self.context_store)));
        registry.register(Arc::new(SemanticSearch::new(self.embeddings.clone())));
        registry.register(Arc::new(ManageEmbeddingsIndex::new(self.embeddings)));
        registry.register(Arc::new(SessionMemory::new(self.memory_store)));
        registry.register(Arc::new(CreateSkill::new(
            options.clone(),
            self.skill_registry.clone(),
        )));
        registry.register(Arc::new(ActivateSkill::new(self.skill_registry)));
        registry.register(Arc::new(CompactContext::new(self.compactor)));
        registry.register(Arc::new(FluffyAgent::new()));

        // Browser sessions
        registry.register(Arc::new(BrowserStart::new(self.browser_manager.clone())));
        registry.register(Arc::new(BrowserNavigate::new(self.browser_manager.clone())));
        registry.register(Arc::new(BrowserObserve::new(self.browser_manager.clone())));
        registry.register(Arc::new(BrowserStream::new(self.browser_manager.clone())));
        registry.register(Arc::new(BrowserAct::new(self.browser_manager.clone())));
        registry.register(Arc::new(BrowserClose::new(self.browser_manager.clone())));
        registry.register(Arc::new(BrowserClipboard::new(self.browser_manager)));

        registry
    }
}

/// Definitions for the standard catalog, for hosts that only need the
/// schema surface. Delegation tools are included; collaborator-backed
/// tools report their missing dependency if actually invoked.
pub fn standard_tool_definitions(workdir: impl Into<PathBuf>) -> Vec<ToolDefinition> {
    ToolRegistryBuilder::for_workdir(workdir).build().list()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecContext;
    use serde_json::json;
    use tempfile::TempDir;

    const EXPECTED_TOOLS: &[&str] = &[
        "read_file",
        "write_file",
        "list_directory",
        "find_files",
        "file_exists",
        "get_file_info",
        "apply_patch",
        "delete_file",
        "move_file",
        "edit_file",
        "search_replace",
        "insert_text",
        "delete_lines",
        "search_text",
        "find_symbol",
        "find_references",
        "get_function_signature",
        "git_status",
        "git_diff",
        "git_log",
        "git_blame",
        "list_merge_conflicts",
        "mark_conflict_resolved",
        "run_shell",
        "invoke_codex",
        "invoke_claude",
        "invoke_buckley",
        "spawn_subagent",
        "run_tests",
        "rename_symbol",
        "extract_function",
        "analyze_complexity",
        "find_duplicates",
        "generate_test",
        "generate_docstring",
        "explain_code",
        "excel",
        "browse_url",
        "todo",
        "lookup_context",
        "semantic_search",
        "manage_embeddings_index",
        "session_memory",
        "create_skill",
        "activate_skill",
        "compact_context",
        "fluffy_agent",
        "browser_start",
        "browser_navigate",
        "browser_observe",
        "browser_stream",
        "browser_act",
        "browser_close",
        "browser_clipboard",
    ];

    #[test]
    fn test_catalog_is_complete() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistryBuilder::for_workdir(dir.path()).build();
        for name in EXPECTED_TOOLS {
            assert!(registry.get(name).is_some(), "missing tool: {}", name);
        }
        assert_eq!(registry.list().len(), EXPECTED_TOOLS.len());
    }

    #[test]
    fn test_delegation_can_be_excluded() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistryBuilder::for_workdir(dir.path())
            .with_delegation(false)
            .build();
        assert!(registry.get("invoke_codex").is_none());
        assert!(registry.get("run_shell").is_some());
    }

    #[test]
    fn test_definitions_sorted_and_named() {
        let dir = TempDir::new().unwrap();
        let definitions = standard_tool_definitions(dir.path());
        let names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        for definition in &definitions {
            assert!(!definition.description.is_empty());
            assert_eq!(definition.parameters["type"], json!("object"));
        }
    }

    #[tokio::test]
    async fn test_dispatch_through_registry() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi\n").unwrap();
        let registry = ToolRegistryBuilder::for_workdir(dir.path()).build();

        let result = registry
            .dispatch(
                ExecContext::background(),
                "read_file",
                json!({"path": "hello.txt"}),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.data["content"], json!("hi\n"));

        // Collaborator-less tools fail in-envelope, not as transport errors.
        let result = registry
            .dispatch(
                ExecContext::background(),
                "semantic_search",
                json!({"query": "x"}),
            )
            .await;
        assert!(!result.success);
        assert!(result.error.contains("embeddings searcher"));
    }
}
