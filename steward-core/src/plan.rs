//! Plans: tasks whose body carries an ordered checklist of steps.
//!
//! Step lines look like `- [x] 2. Draft reply`; the marker encodes the status
//! (`[ ]` not started, `[x]` completed, `[-]` failed, `[~]` skipped). A note
//! may follow a step on its own line as `  *Note: <text>*`.
//!
//! Indices are fixed when the plan is written. Updates only touch the marker
//! and the note line, and progress is always recomputed from the body.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::task::{Task, TaskDetail};
use crate::types::TaskStatus;

const NOTE_PREFIX: &str = "  *Note: ";

/// Status of a single plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    fn marker(&self) -> char {
        match self {
            StepStatus::NotStarted => ' ',
            StepStatus::Completed => 'x',
            StepStatus::Failed => '-',
            StepStatus::Skipped => '~',
        }
    }

    fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(StepStatus::NotStarted),
            'x' | 'X' => Some(StepStatus::Completed),
            '-' => Some(StepStatus::Failed),
            '~' => Some(StepStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        })
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" | "pending" => Ok(StepStatus::NotStarted),
            "completed" | "done" => Ok(StepStatus::Completed),
            "failed" => Ok(StepStatus::Failed),
            "skipped" => Ok(StepStatus::Skipped),
            other => Err(format!(
                "unknown step status '{other}'; expected: not_started, completed, failed, skipped"
            )),
        }
    }
}

/// One checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// 1-based, contiguous, immutable.
    pub index: usize,
    pub description: String,
    pub status: StepStatus,
    pub note: Option<String>,
}

/// A plan task with its steps parsed out of the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    task: Task,
    steps: Vec<Step>,
}

impl Plan {
    /// Interpret a `plan` task. Fails when the task is another type or its
    /// step indices are not `1..=n`.
    pub fn from_task(task: Task) -> Result<Self, PlanError> {
        if !matches!(task.header.detail, TaskDetail::Plan { .. }) {
            return Err(PlanError::NotAPlan(task.kind().to_string()));
        }
        let steps = parse_steps(&task.body)?;
        Ok(Self { task, steps })
    }

    pub fn objective(&self) -> &str {
        match &self.task.header.detail {
            TaskDetail::Plan { objective } => objective,
            _ => "",
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn into_task(self) -> Task {
        self.task
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// Completed steps over total steps; `0.0` for a plan with no steps.
    pub fn progress_fraction(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.completed_steps() as f64 / self.steps.len() as f64
    }

    pub fn is_complete(&self) -> bool {
        !self.steps.is_empty() && self.completed_steps() == self.steps.len()
    }

    /// Set a step's status (and optionally its note), rewriting the body in place.
    ///
    /// Marks the plan header `completed` once every step is completed.
    pub fn update_step(
        &mut self,
        index: usize,
        status: StepStatus,
        note: Option<&str>,
    ) -> Result<(), PlanError> {
        let mut lines: Vec<String> = self.task.body.lines().map(str::to_string).collect();
        let line_no = lines
            .iter()
            .position(|line| matches!(parse_step_line(line), Some((i, _, _)) if i == index))
            .ok_or(PlanError::StepNotFound(index))?;

        let (_, _, description) =
            parse_step_line(&lines[line_no]).ok_or(PlanError::StepNotFound(index))?;
        lines[line_no] = format_step_line(index, status, &description);

        if let Some(note) = note {
            let note_line = format!("{NOTE_PREFIX}{note}*");
            let next = line_no + 1;
            if lines.get(next).is_some_and(|l| l.starts_with(NOTE_PREFIX)) {
                lines[next] = note_line;
            } else {
                lines.insert(next, note_line);
            }
        }

        let trailing_newline = self.task.body.ends_with('\n');
        let mut body = lines.join("\n");
        if trailing_newline {
            body.push('\n');
        }
        self.task.body = body;
        self.steps = parse_steps(&self.task.body)?;

        if self.is_complete() {
            self.task.header.status = TaskStatus::Completed;
        }
        Ok(())
    }
}

/// Render a checklist body fragment for freshly created plans.
pub fn checklist(descriptions: &[String]) -> String {
    descriptions
        .iter()
        .enumerate()
        .map(|(i, d)| format_step_line(i + 1, StepStatus::NotStarted, d.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_step_line(index: usize, status: StepStatus, description: &str) -> String {
    format!("- [{}] {index}. {description}", status.marker())
}

/// `- [x] 3. Description` → `(3, Completed, "Description")`.
fn parse_step_line(line: &str) -> Option<(usize, StepStatus, String)> {
    let rest = line.trim_start().strip_prefix("- [")?;
    let mut chars = rest.chars();
    let marker = chars.next()?;
    let rest = chars.as_str().strip_prefix("] ")?;
    let status = StepStatus::from_marker(marker)?;
    let (number, description) = rest.split_once(". ")?;
    let index: usize = number.trim().parse().ok()?;
    Some((index, status, description.trim().to_string()))
}

fn parse_steps(body: &str) -> Result<Vec<Step>, PlanError> {
    let mut steps: Vec<Step> = Vec::new();
    for line in body.lines() {
        if let Some(note) = line
            .strip_prefix(NOTE_PREFIX)
            .and_then(|rest| rest.strip_suffix('*'))
        {
            if let Some(last) = steps.last_mut() {
                last.note = Some(note.to_string());
            }
            continue;
        }
        let Some((index, status, description)) = parse_step_line(line) else {
            continue;
        };
        let expected = steps.len() + 1;
        if index != expected {
            return Err(PlanError::NonContiguous {
                expected,
                found: index,
            });
        }
        steps.push(Step {
            index,
            description,
            status,
            note: None,
        });
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn plan_task(body: &str) -> Task {
        Task::new(
            TaskDetail::Plan {
                objective: "Reply to client".into(),
            },
            Utc::now(),
            body,
        )
        .with_status(TaskStatus::InProgress)
    }

    #[test]
    fn parses_steps_and_progress() {
        let plan = Plan::from_task(plan_task(
            "\n## Steps\n- [x] 1. Read email\n- [ ] 2. Draft reply\n- [-] 3. Send\n",
        ))
        .unwrap();
        assert_eq!(plan.steps().len(), 3);
        assert_eq!(plan.steps()[2].status, StepStatus::Failed);
        assert!((plan.progress_fraction() - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn gap_in_indices_is_rejected() {
        let err = Plan::from_task(plan_task("- [ ] 1. A\n- [ ] 3. C\n")).unwrap_err();
        assert!(matches!(err, PlanError::NonContiguous { expected: 2, found: 3 }));
    }

    #[test]
    fn update_keeps_description_and_index() {
        let mut plan =
            Plan::from_task(plan_task("- [ ] 1. Read email\n- [ ] 2. Draft reply\n")).unwrap();
        plan.update_step(2, StepStatus::Completed, Some("sent draft to Ana"))
            .unwrap();
        let step = &plan.steps()[1];
        assert_eq!(step.index, 2);
        assert_eq!(step.description, "Draft reply");
        assert_eq!(step.note.as_deref(), Some("sent draft to Ana"));
        assert!(plan.task().body.contains("- [x] 2. Draft reply\n  *Note: sent draft to Ana*"));

        plan.update_step(2, StepStatus::Completed, Some("revised"))
            .unwrap();
        assert_eq!(plan.task().body.matches("*Note:").count(), 1);
    }

    #[test]
    fn completing_every_step_completes_the_plan() {
        let mut plan = Plan::from_task(plan_task("- [ ] 1. Only step\n")).unwrap();
        plan.update_step(1, StepStatus::Completed, None).unwrap();
        assert_eq!(plan.task().header.status, TaskStatus::Completed);
        assert_eq!(plan.progress_fraction(), 1.0);
    }

    #[test]
    fn unknown_step_is_reported() {
        let mut plan = Plan::from_task(plan_task("- [ ] 1. Only step\n")).unwrap();
        assert!(matches!(
            plan.update_step(4, StepStatus::Skipped, None),
            Err(PlanError::StepNotFound(4))
        ));
    }

    #[test]
    fn checklist_renders_unchecked_steps() {
        let body = checklist(&["Read".to_string(), " Reply ".to_string()]);
        assert_eq!(body, "- [ ] 1. Read\n- [ ] 2. Reply");
    }
}
