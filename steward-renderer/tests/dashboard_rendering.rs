use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use steward_core::{
    plan, AuditEvent, Folder, MemoryTaskStore, StoreSnapshot, Task, TaskDetail, TaskName,
    TaskStore,
};
use steward_renderer::{
    ApprovalBodyCtx, FileDropCtx, PlanBodyCtx, Projection, Renderer,
};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()
}

fn seeded_store() -> MemoryTaskStore {
    let store = MemoryTaskStore::new();
    let file_drop = Task::new(
        TaskDetail::FileDrop {
            source_file: "invoice.pdf".into(),
        },
        now(),
        "",
    );
    store
        .write(Folder::Done, &"t1.md".into(), &file_drop)
        .unwrap();
    store
        .write(Folder::InProgress, &"t2.md".into(), &file_drop)
        .unwrap();

    let approval = Task::new(
        TaskDetail::ApprovalRequest {
            action_type: "email_send".into(),
            action: Some("send_invoice".into()),
            action_payload: json!({"to": "client@example.com"}),
            expires_at: now() - Duration::hours(1),
        },
        now() - Duration::hours(25),
        "",
    );
    store
        .write(Folder::PendingApproval, &"a1.md".into(), &approval)
        .unwrap();

    let plan_task = Task::new(
        TaskDetail::Plan {
            objective: "Reply to client".into(),
        },
        now(),
        format!(
            "\n{}\n",
            plan::checklist(&["Read email".to_string(), "Draft reply".to_string()])
        ),
    );
    store
        .write(Folder::Plans, &"p1.md".into(), &plan_task)
        .unwrap();
    store
}

#[test]
fn dashboard_is_byte_identical_for_unchanged_inputs() {
    let store = seeded_store();
    let events = vec![AuditEvent::task_claimed(now(), &TaskName::from("t2.md"))];
    let renderer = Renderer::new().unwrap();

    let first = renderer
        .render_dashboard(&Projection::recompute(
            &StoreSnapshot::capture(&store, now()).unwrap(),
            &events,
        ))
        .unwrap();
    let second = renderer
        .render_dashboard(&Projection::recompute(
            &StoreSnapshot::capture(&store, now()).unwrap(),
            &events,
        ))
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn dashboard_shows_counts_stuck_expired_and_plan_progress() {
    let store = seeded_store();
    let projection =
        Projection::recompute(&StoreSnapshot::capture(&store, now()).unwrap(), &[]);
    let out = Renderer::new().unwrap().render_dashboard(&projection).unwrap();

    assert!(out.contains("| Done | 1 |"), "{out}");
    assert!(out.contains("| Needs_Action | 0 |"));
    assert!(out.contains("**Stuck in In_Progress:** 1"));
    assert!(out.contains("`t2.md`"));
    assert!(out.contains("**Expired approvals:** 1"));
    assert!(out.contains("| expired |"));
    assert!(out.contains("0/2 (0%)"));
    assert!(out.contains("*No activity recorded yet.*"));
}

#[test]
fn task_bodies_render_their_inputs() {
    let renderer = Renderer::new().unwrap();

    let body = renderer
        .render_file_drop(&FileDropCtx::new("Report.PDF", 2048, now()))
        .unwrap();
    assert!(body.contains("`Report.PDF`"));
    assert!(body.contains("**File Type:** .pdf"));
    assert!(body.contains("2048 bytes"));

    let body = renderer
        .render_approval_body(&ApprovalBodyCtx {
            action_type: "email_send".into(),
            action: None,
            description: "Send invoice".into(),
            action_payload: "{}".into(),
            expires_at: "2026-01-06T12:00:00Z".into(),
        })
        .unwrap();
    assert!(body.contains("# Approval Required: email_send\n"));
    assert!(body.contains("2026-01-06T12:00:00Z"));

    let body = renderer
        .render_plan_body(&PlanBodyCtx {
            objective: "Ship".into(),
            checklist: plan::checklist(&["One".to_string()]),
            source_task: None,
        })
        .unwrap();
    assert!(body.contains("- [ ] 1. One"));
}
