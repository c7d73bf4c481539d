//! Tera rendering engine: [`TemplateKind`] and [`Renderer`].
//!
//! | Template                      | Output                                   |
//! |-------------------------------|------------------------------------------|
//! | `dashboard.md.tera`           | `<vault>/Dashboard.md`                   |
//! | `prompts/batch.md.tera`       | engine stdin for a claimed batch         |
//! | `prompts/approved.md.tera`    | engine stdin for one approved action     |
//! | `tasks/file_drop.md.tera`     | body of a file-drop task                 |
//! | `tasks/approval_request.md.tera` | body of an approval request           |
//! | `tasks/plan.md.tera`          | body of a plan                           |
//!
//! Any of these can be overridden by a file with the same relative name under
//! `<vault>/.steward/templates/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::{Context, Tera};

use crate::context::{
    ApprovalBodyCtx, ApprovedPromptCtx, BatchPromptCtx, FileDropCtx, PlanBodyCtx,
};
use crate::error::RenderError;
use crate::projection::Projection;

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("dashboard.md.tera", include_str!("templates/dashboard.md.tera")),
    ("prompts/batch.md.tera", include_str!("templates/prompts/batch.md.tera")),
    (
        "prompts/approved.md.tera",
        include_str!("templates/prompts/approved.md.tera"),
    ),
    (
        "tasks/file_drop.md.tera",
        include_str!("templates/tasks/file_drop.md.tera"),
    ),
    (
        "tasks/approval_request.md.tera",
        include_str!("templates/tasks/approval_request.md.tera"),
    ),
    ("tasks/plan.md.tera", include_str!("templates/tasks/plan.md.tera")),
];

/// Every template steward renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Dashboard,
    BatchPrompt,
    ApprovedPrompt,
    FileDropBody,
    ApprovalBody,
    PlanBody,
}

impl TemplateKind {
    pub fn all() -> &'static [TemplateKind] {
        &[
            TemplateKind::Dashboard,
            TemplateKind::BatchPrompt,
            TemplateKind::ApprovedPrompt,
            TemplateKind::FileDropBody,
            TemplateKind::ApprovalBody,
            TemplateKind::PlanBody,
        ]
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            TemplateKind::Dashboard => "dashboard.md.tera",
            TemplateKind::BatchPrompt => "prompts/batch.md.tera",
            TemplateKind::ApprovedPrompt => "prompts/approved.md.tera",
            TemplateKind::FileDropBody => "tasks/file_drop.md.tera",
            TemplateKind::ApprovalBody => "tasks/approval_request.md.tera",
            TemplateKind::PlanBody => "tasks/plan.md.tera",
        }
    }
}

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((normalize_template_name(rel), contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| (name.to_string(), content.to_string()))
        .collect();
    if let Some(dir) = user_template_dir {
        templates.extend(load_user_templates(dir)?);
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders dashboards, engine prompts and task bodies.
///
/// Create once per process and reuse; templates are parsed up front.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            tera: build_tera(None)?,
        })
    }

    /// Embedded templates plus any overrides in `user_template_dir`.
    pub fn with_overrides(user_template_dir: &Path) -> Result<Self, RenderError> {
        Ok(Self {
            tera: build_tera(Some(user_template_dir))?,
        })
    }

    /// Render `kind` with any serializable context. Output always uses LF line endings.
    pub fn render<C: Serialize>(&self, kind: TemplateKind, ctx: &C) -> Result<String, RenderError> {
        let template = kind.template_name();
        let render_err = |source| RenderError::Render { template, source };
        let context = Context::from_serialize(ctx).map_err(render_err)?;
        let out = self.tera.render(template, &context).map_err(render_err)?;
        Ok(out.replace("\r\n", "\n"))
    }

    pub fn render_dashboard(&self, projection: &Projection) -> Result<String, RenderError> {
        self.render(TemplateKind::Dashboard, projection)
    }

    pub fn render_batch_prompt(&self, ctx: &BatchPromptCtx) -> Result<String, RenderError> {
        self.render(TemplateKind::BatchPrompt, ctx)
    }

    pub fn render_approved_prompt(&self, ctx: &ApprovedPromptCtx) -> Result<String, RenderError> {
        self.render(TemplateKind::ApprovedPrompt, ctx)
    }

    pub fn render_file_drop(&self, ctx: &FileDropCtx) -> Result<String, RenderError> {
        self.render(TemplateKind::FileDropBody, ctx)
    }

    pub fn render_approval_body(&self, ctx: &ApprovalBodyCtx) -> Result<String, RenderError> {
        self.render(TemplateKind::ApprovalBody, ctx)
    }

    pub fn render_plan_body(&self, ctx: &PlanBodyCtx) -> Result<String, RenderError> {
        self.render(TemplateKind::PlanBody, ctx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PromptTask;
    use chrono::{TimeZone, Utc};
    use steward_core::{Folder, StoreSnapshot};
    use tempfile::TempDir;

    fn prompt_task(name: &str) -> PromptTask {
        PromptTask {
            name: name.to_string(),
            kind: "file_drop".into(),
            priority: "normal".into(),
            folder: "In_Progress".into(),
            path: format!("/vault/In_Progress/{name}"),
            source_identity: Some("file_drop:abc".into()),
        }
    }

    #[test]
    fn renderer_new_succeeds() {
        Renderer::new().expect("embedded templates must parse");
    }

    #[test]
    fn every_template_name_is_registered() {
        let renderer = Renderer::new().unwrap();
        let names: Vec<&str> = renderer.tera.get_template_names().collect();
        for kind in TemplateKind::all() {
            assert!(names.contains(&kind.template_name()), "{kind:?} missing");
        }
    }

    #[test]
    fn batch_prompt_lists_every_task() {
        let renderer = Renderer::new().unwrap();
        let ctx = BatchPromptCtx {
            vault: "/vault".into(),
            manifest: "/vault/.steward/manifest.json".into(),
            tasks: vec![prompt_task("a.md"), prompt_task("b.md")],
        };
        let out = renderer.render_batch_prompt(&ctx).unwrap();
        assert!(out.contains("/vault/In_Progress/a.md"));
        assert!(out.contains("/vault/In_Progress/b.md"));
        assert!(out.contains("/vault/.steward/manifest.json"));
    }

    #[test]
    fn empty_dashboard_renders_zero_counts() {
        let renderer = Renderer::new().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let snapshot = StoreSnapshot::from_entries(now, Vec::<(Folder, steward_core::SnapshotEntry)>::new());
        let projection = Projection::recompute(&snapshot, &[]);
        let out = renderer.render_dashboard(&projection).unwrap();
        assert!(out.contains("| Needs_Action | 0 |"));
        assert!(out.contains("| Done | 0 |"));
        assert!(out.contains("never"));
        assert_eq!(projection.count(Folder::Done), 0);
    }

    #[test]
    fn user_override_replaces_embedded_template() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("prompts")).unwrap();
        std::fs::write(
            tmp.path().join("prompts/batch.md.tera"),
            "custom {{ tasks | length }}",
        )
        .unwrap();
        let renderer = Renderer::with_overrides(tmp.path()).unwrap();
        let ctx = BatchPromptCtx {
            vault: "/v".into(),
            manifest: "/v/m.json".into(),
            tasks: vec![prompt_task("a.md")],
        };
        assert_eq!(renderer.render_batch_prompt(&ctx).unwrap(), "custom 1");
    }

    #[test]
    fn missing_override_dir_is_ignored() {
        let tmp = TempDir::new().unwrap();
        Renderer::with_overrides(&tmp.path().join("nope")).unwrap();
    }
}
