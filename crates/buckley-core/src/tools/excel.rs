//! Workbook tool
//!
//! One dispatcher over read and mutation actions. Reads go through calamine
//! directly; mutations delegate to an injected [`WorkbookStore`] so the
//! spreadsheet semantics live with the collaborator, not here. Legacy
//! `.xls` files are rejected up front.

use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{required_str, string_param};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Injected workbook mutation collaborator.
#[async_trait]
pub trait WorkbookStore: Send + Sync {
    async fn write_cell(
        &self,
        path: &Path,
        sheet: &str,
        cell: &str,
        value: &Value,
    ) -> anyhow::Result<()>;
    async fn write_formula(
        &self,
        path: &Path,
        sheet: &str,
        cell: &str,
        formula: &str,
    ) -> anyhow::Result<()>;
    async fn create_sheet(&self, path: &Path, sheet: &str) -> anyhow::Result<()>;
    async fn delete_sheet(&self, path: &Path, sheet: &str) -> anyhow::Result<()>;
}

/// Parse `B3` into zero-indexed `(row, col)`.
pub(crate) fn parse_cell_ref(cell: &str) -> Result<(u32, u32), ToolError> {
    let cell = cell.trim().to_uppercase();
    let letters: String = cell.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &cell[letters.len()..];
    if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ToolError::ParseError(format!("invalid cell reference: {}", cell)));
    }
    let mut col: u32 = 0;
    for c in letters.chars() {
        col = col * 26 + (c as u32 - 'A' as u32 + 1);
    }
    let row: u32 = digits
        .parse()
        .map_err(|_| ToolError::ParseError(format!("invalid cell reference: {}", cell)))?;
    if row == 0 {
        return Err(ToolError::ParseError(format!("invalid cell reference: {}", cell)));
    }
    Ok((row - 1, col - 1))
}

/// Parse `A1:B3` into `((row, col), (row, col))`.
pub(crate) fn parse_range_ref(range: &str) -> Result<((u32, u32), (u32, u32)), ToolError> {
    let Some((start, end)) = range.split_once(':') else {
        return Err(ToolError::ParseError(format!("invalid range: {}", range)));
    };
    Ok((parse_cell_ref(start)?, parse_cell_ref(end)?))
}

fn data_to_json(data: &Data) -> Value {
    match data {
        Data::Empty => Value::Null,
        Data::String(s) => json!(s),
        Data::Float(f) => json!(f),
        Data::Int(i) => json!(i),
        Data::Bool(b) => json!(b),
        other => json!(other.to_string()),
    }
}

/// Tool dispatching workbook actions
pub struct ExcelTool {
    options: ToolOptions,
    store: Option<Arc<dyn WorkbookStore>>,
}

impl ExcelTool {
    pub fn new(options: ToolOptions, store: Option<Arc<dyn WorkbookStore>>) -> Self {
        Self { options, store }
    }

    fn store(&self) -> Result<&Arc<dyn WorkbookStore>, ToolError> {
        self.store
            .as_ref()
            .ok_or_else(|| ToolError::DependencyAbsent("workbook store".into()))
    }
}

impl Tool for ExcelTool {
    fn name(&self) -> &str {
        "excel"
    }

    fn description(&self) -> &str {
        "Read and modify .xlsx workbooks. Actions: read, write, \
         write_formula, list_sheets, create_sheet, delete_sheet, get_info."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "Workbook action to perform",
                    "enum": ["read", "write", "write_formula", "list_sheets",
                             "create_sheet", "delete_sheet", "get_info"]
                },
                "file_path": {
                    "type": "string",
                    "description": "Workbook path (relative to workdir); .xls is not supported"
                },
                "sheet": {
                    "type": "string",
                    "description": "Sheet name (default: first sheet for reads)"
                },
                "cell": {
                    "type": "string",
                    "description": "Cell reference, e.g. 'B3'"
                },
                "range": {
                    "type": "string",
                    "description": "Range reference, e.g. 'A1:C10'"
                },
                "value": {
                    "description": "Value for write"
                },
                "formula": {
                    "type": "string",
                    "description": "Formula for write_formula, e.g. '=SUM(A1:A5)'"
                }
            },
            "required": ["action", "file_path"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let action = required_str(&params, "action")?;
            let file_path = required_str(&params, "file_path")?;

            if file_path.to_lowercase().ends_with(".xls") {
                return Err(ToolError::InvalidParams(
                    "legacy .xls workbooks are not supported; convert to .xlsx".into(),
                ));
            }
            let path = resolve(&self.options.workdir, file_path)?;

            match action {
                "read" => self.read(&path, &params).await,
                "list_sheets" => self.list_sheets(&path).await,
                "get_info" => self.get_info(&path).await,
                "write" => {
                    let sheet = required_str(&params, "sheet")?;
                    let cell = required_str(&params, "cell")?;
                    parse_cell_ref(cell)?;
                    let value = params
                        .get("value")
                        .cloned()
                        .ok_or_else(|| ToolError::InvalidParams("value is required".into()))?;
                    self.store()?
                        .write_cell(&path, sheet, cell, &value)
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                    Ok(ToolResult::ok()
                        .with("action", "write")
                        .with("sheet", sheet)
                        .with("cell", cell))
                }
                "write_formula" => {
                    let sheet = required_str(&params, "sheet")?;
                    let cell = required_str(&params, "cell")?;
                    let formula = required_str(&params, "formula")?;
                    parse_cell_ref(cell)?;
                    if !formula.starts_with('=') {
                        return Err(ToolError::InvalidParams(
                            "formula must start with '='".into(),
                        ));
                    }
                    self.store()?
                        .write_formula(&path, sheet, cell, formula)
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                    Ok(ToolResult::ok()
                        .with("action", "write_formula")
                        .with("sheet", sheet)
                        .with("cell", cell))
                }
                "create_sheet" => {
                    let sheet = required_str(&params, "sheet")?;
                    self.store()?
                        .create_sheet(&path, sheet)
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                    Ok(ToolResult::ok().with("action", "create_sheet").with("sheet", sheet))
                }
                "delete_sheet" => {
                    let sheet = required_str(&params, "sheet")?;
                    self.store()?
                        .delete_sheet(&path, sheet)
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                    Ok(ToolResult::ok().with("action", "delete_sheet").with("sheet", sheet))
                }
                other => Err(ToolError::InvalidParams(format!(
                    "unknown action: {}",
                    other
                ))),
            }
        })
    }
}

impl ExcelTool {
    async fn read(&self, path: &Path, params: &Value) -> Result<ToolResult, ToolError> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| ToolError::NotFound(format!("cannot open workbook: {}", e)))?;
        let sheet_name = {
            let requested = string_param(params, "sheet");
            if requested.is_empty() {
                workbook
                    .sheet_names()
                    .first()
                    .cloned()
                    .ok_or_else(|| ToolError::NotFound("workbook has no sheets".into()))?
            } else {
                requested
            }
        };
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ToolError::NotFound(format!("sheet {}: {}", sheet_name, e)))?;

        let cell_ref = string_param(params, "cell");
        if !cell_ref.is_empty() {
            let (row, col) = parse_cell_ref(&cell_ref)?;
            let value = range
                .get_value((row, col))
                .map(data_to_json)
                .unwrap_or(Value::Null);
            return Ok(ToolResult::ok()
                .with("sheet", sheet_name)
                .with("cell", cell_ref)
                .with("value", value));
        }

        let range_ref = string_param(params, "range");
        let ((start_row, start_col), (end_row, end_col)) = if range_ref.is_empty() {
            let (height, width) = range.get_size();
            if height == 0 || width == 0 {
                ((0, 0), (0, 0))
            } else {
                let (top_row, top_col) = range.start().unwrap_or((0, 0));
                (
                    (top_row, top_col),
                    (top_row + height as u32 - 1, top_col + width as u32 - 1),
                )
            }
        } else {
            parse_range_ref(&range_ref)?
        };

        let mut rows: Vec<Value> = Vec::new();
        for row in start_row..=end_row {
            let mut cells: Vec<Value> = Vec::new();
            for col in start_col..=end_col {
                cells.push(
                    range
                        .get_value((row, col))
                        .map(data_to_json)
                        .unwrap_or(Value::Null),
                );
            }
            rows.push(Value::Array(cells));
        }

        Ok(ToolResult::ok()
            .with("sheet", sheet_name)
            .with("row_count", rows.len() as i64)
            .with("rows", rows))
    }

    async fn list_sheets(&self, path: &Path) -> Result<ToolResult, ToolError> {
        let workbook = open_workbook_auto(path)
            .map_err(|e| ToolError::NotFound(format!("cannot open workbook: {}", e)))?;
        let sheets = workbook.sheet_names().to_vec();
        Ok(ToolResult::ok()
            .with("count", sheets.len() as i64)
            .with("sheets", sheets))
    }

    async fn get_info(&self, path: &Path) -> Result<ToolResult, ToolError> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| ToolError::NotFound(format!("cannot open workbook: {}", e)))?;
        let names = workbook.sheet_names().to_vec();
        let mut sheets: Vec<Value> = Vec::new();
        for name in &names {
            let (rows, cols) = workbook
                .worksheet_range(name)
                .map(|r| r.get_size())
                .unwrap_or((0, 0));
            sheets.push(json!({
                "name": name,
                "rows": rows,
                "columns": cols,
            }));
        }
        Ok(ToolResult::ok()
            .with("path", path.display().to_string())
            .with("sheet_count", names.len() as i64)
            .with("sheets", sheets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1").unwrap(), (0, 0));
        assert_eq!(parse_cell_ref("B3").unwrap(), (2, 1));
        assert_eq!(parse_cell_ref("AA10").unwrap(), (9, 26));
        assert!(parse_cell_ref("A0").is_err());
        assert!(parse_cell_ref("7").is_err());
        assert!(parse_cell_ref("B").is_err());
        assert!(parse_cell_ref("B3X").is_err());
    }

    #[test]
    fn test_parse_range_ref() {
        assert_eq!(parse_range_ref("A1:B3").unwrap(), ((0, 0), (2, 1)));
        assert!(parse_range_ref("A1").is_err());
        assert!(parse_range_ref("A1:ZZ").is_err());
    }

    #[tokio::test]
    async fn test_xls_rejected() {
        let dir = TempDir::new().unwrap();
        let err = ExcelTool::new(ToolOptions::new(dir.path()), None)
            .execute(json!({"action": "read", "file_path": "book.xls"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains(".xls"));
    }

    #[tokio::test]
    async fn test_write_without_store() {
        let dir = TempDir::new().unwrap();
        let err = ExcelTool::new(ToolOptions::new(dir.path()), None)
            .execute(json!({
                "action": "write",
                "file_path": "book.xlsx",
                "sheet": "Sheet1",
                "cell": "A1",
                "value": 42
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("workbook store"));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let dir = TempDir::new().unwrap();
        let err = ExcelTool::new(ToolOptions::new(dir.path()), None)
            .execute(json!({"action": "pivot", "file_path": "book.xlsx"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown action"));
    }

    #[tokio::test]
    async fn test_formula_must_start_with_equals() {
        struct NoopStore;

        #[async_trait]
        impl WorkbookStore for NoopStore {
            async fn write_cell(
                &self,
                _path: &Path,
                _sheet: &str,
                _cell: &str,
                _value: &Value,
            ) -> anyhow::Result<()> {
                Ok(())
            }
            async fn write_formula(
                &self,
                _path: &Path,
                _sheet: &str,
                _cell: &str,
                _formula: &str,
            ) -> anyhow::Result<()> {
                Ok(())
            }
            async fn create_sheet(&self, _path: &Path, _sheet: &str) -> anyhow::Result<()> {
                Ok(())
            }
            async fn delete_sheet(&self, _path: &Path, _sheet: &str) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let tool = ExcelTool::new(ToolOptions::new(dir.path()), Some(Arc::new(NoopStore)));
        let err = tool
            .execute(json!({
                "action": "write_formula",
                "file_path": "book.xlsx",
                "sheet": "S",
                "cell": "A1",
                "formula": "SUM(A1:A2)"
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("start with '='"));

        let result = tool
            .execute(json!({
                "action": "write_formula",
                "file_path": "book.xlsx",
                "sheet": "S",
                "cell": "A1",
                "formula": "=SUM(A1:A2)"
            }))
            .await
            .unwrap();
        assert!(result.success);
    }
}
