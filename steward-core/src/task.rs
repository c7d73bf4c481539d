//! Task file codec: a YAML front-matter header followed by a free-text markdown body.
//!
//! ```text
//! ---
//! type: file_drop
//! status: pending
//! priority: normal
//! created: 2026-01-05T10:30:00Z
//! source_identity: file_drop:9f86d081884c7d65
//! source_file: invoice.pdf
//! ---
//!
//! # File Drop for Processing
//! ...
//! ```
//!
//! The header is a closed set of variants keyed by `type`. Each variant's
//! required fields are validated on read; anything missing or malformed is a
//! [`TaskFormatError`], which the store surfaces as `CorruptRecord`. Keys the
//! codec does not model are kept in [`TaskHeader::extra`] and written back
//! unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_yaml::{Mapping, Value};

use crate::error::TaskFormatError;
use crate::types::{Priority, TaskKind, TaskStatus};

const DELIMITER: &str = "---";

/// Per-variant header fields.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskDetail {
    FileDrop {
        source_file: String,
    },
    GmailEmail {
        from: String,
        subject: String,
        message_id: String,
    },
    LinkedinPost {
        content: String,
    },
    ApprovalRequest {
        action_type: String,
        action: Option<String>,
        /// Opaque structured data the engine executes once approved.
        action_payload: serde_json::Value,
        expires_at: DateTime<Utc>,
    },
    Plan {
        objective: String,
    },
}

impl TaskDetail {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskDetail::FileDrop { .. } => TaskKind::FileDrop,
            TaskDetail::GmailEmail { .. } => TaskKind::GmailEmail,
            TaskDetail::LinkedinPost { .. } => TaskKind::LinkedinPost,
            TaskDetail::ApprovalRequest { .. } => TaskKind::ApprovalRequest,
            TaskDetail::Plan { .. } => TaskKind::Plan,
        }
    }
}

/// Structured header block of a task file.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHeader {
    pub status: TaskStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    /// Dedup key of the originating watcher, if any.
    pub source_identity: Option<String>,
    pub detail: TaskDetail,
    /// Header keys not modelled above, preserved verbatim.
    pub extra: BTreeMap<String, Value>,
}

/// A task file: header plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub header: TaskHeader,
    pub body: String,
}

impl Task {
    /// A pending, normal-priority task.
    pub fn new(detail: TaskDetail, created_at: DateTime<Utc>, body: impl Into<String>) -> Self {
        Self {
            header: TaskHeader {
                status: TaskStatus::Pending,
                priority: Priority::Normal,
                created_at,
                source_identity: None,
                detail,
                extra: BTreeMap::new(),
            },
            body: body.into(),
        }
    }

    pub fn with_source_identity(mut self, identity: impl Into<String>) -> Self {
        self.header.source_identity = Some(identity.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.header.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.header.status = status;
        self
    }

    /// Attach a free-form header field (e.g. `file_size`).
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.header.extra.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> TaskKind {
        self.header.detail.kind()
    }

    /// Decode a task file.
    pub fn parse(text: &str) -> Result<Self, TaskFormatError> {
        let (yaml, body) = split_front_matter(text)?;
        let value: Value = serde_yaml::from_str(yaml)?;
        let mut fields = match value {
            Value::Mapping(map) => into_fields(map)?,
            Value::Null => BTreeMap::new(),
            _ => {
                return Err(TaskFormatError::InvalidField {
                    field: "header",
                    value: "expected a mapping".to_string(),
                })
            }
        };

        let kind_str = take_string(&mut fields, "type")?.ok_or(TaskFormatError::MissingField {
            kind: "unknown".to_string(),
            field: "type",
        })?;
        let kind: TaskKind = kind_str
            .parse()
            .map_err(TaskFormatError::UnknownType)?;

        let status = match take_string(&mut fields, "status")? {
            Some(s) => s.parse().map_err(|value| TaskFormatError::InvalidField {
                field: "status",
                value,
            })?,
            None => TaskStatus::default(),
        };
        let priority = match take_string(&mut fields, "priority")? {
            Some(s) => s.parse().map_err(|value| TaskFormatError::InvalidField {
                field: "priority",
                value,
            })?,
            None => Priority::default(),
        };

        let created_raw = ["created", "created_at", "received"]
            .iter()
            .find_map(|key| fields.remove(*key))
            .ok_or_else(|| missing(kind, "created"))?;
        let created_at = parse_timestamp("created", &scalar_string("created", created_raw)?)?;

        let source_identity = take_string(&mut fields, "source_identity")?;
        let detail = take_detail(kind, &mut fields)?;

        Ok(Task {
            header: TaskHeader {
                status,
                priority,
                created_at,
                source_identity,
                detail,
                extra: fields,
            },
            body: body.to_string(),
        })
    }

    /// Encode the task back into its file form.
    pub fn to_markdown(&self) -> Result<String, TaskFormatError> {
        let header = &self.header;
        let mut map = Mapping::new();
        put(&mut map, "type", header.detail.kind().as_str());
        put(&mut map, "status", header.status.as_str());
        put(&mut map, "priority", header.priority.as_str());
        put(&mut map, "created", format_timestamp(header.created_at));
        if let Some(identity) = &header.source_identity {
            put(&mut map, "source_identity", identity.as_str());
        }

        match &header.detail {
            TaskDetail::FileDrop { source_file } => {
                put(&mut map, "source_file", source_file.as_str());
            }
            TaskDetail::GmailEmail {
                from,
                subject,
                message_id,
            } => {
                put(&mut map, "from", from.as_str());
                put(&mut map, "subject", subject.as_str());
                put(&mut map, "message_id", message_id.as_str());
            }
            TaskDetail::LinkedinPost { content } => {
                put(&mut map, "content", content.as_str());
            }
            TaskDetail::ApprovalRequest {
                action_type,
                action,
                action_payload,
                expires_at,
            } => {
                put(&mut map, "action_type", action_type.as_str());
                if let Some(action) = action {
                    put(&mut map, "action", action.as_str());
                }
                map.insert(
                    Value::from("action_payload"),
                    serde_yaml::to_value(action_payload)?,
                );
                put(&mut map, "expires", format_timestamp(*expires_at));
            }
            TaskDetail::Plan { objective } => {
                put(&mut map, "objective", objective.as_str());
            }
        }

        for (key, value) in &header.extra {
            map.insert(Value::from(key.as_str()), value.clone());
        }

        let yaml = serde_yaml::to_string(&map)?;
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", self.body))
    }
}

/// Serialize timestamps the same way everywhere (second precision, `Z` suffix).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse RFC 3339, or a naive ISO-8601 date/time read as UTC.
pub fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, TaskFormatError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(TaskFormatError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn split_front_matter(text: &str) -> Result<(&str, &str), TaskFormatError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
        .ok_or(TaskFormatError::MissingHeader)?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((yaml, body));
        }
        offset += line.len();
    }
    Err(TaskFormatError::MissingHeader)
}

fn into_fields(map: Mapping) -> Result<BTreeMap<String, Value>, TaskFormatError> {
    let mut fields = BTreeMap::new();
    for (key, value) in map {
        let key = match key {
            Value::String(s) => s,
            other => {
                return Err(TaskFormatError::InvalidField {
                    field: "header",
                    value: format!("non-string key {other:?}"),
                })
            }
        };
        fields.insert(key, value);
    }
    Ok(fields)
}

fn scalar_string(field: &'static str, value: Value) -> Result<String, TaskFormatError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(TaskFormatError::InvalidField {
            field,
            value: format!("{other:?}"),
        }),
    }
}

fn take_string(
    fields: &mut BTreeMap<String, Value>,
    field: &'static str,
) -> Result<Option<String>, TaskFormatError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_string(field, value).map(Some),
    }
}

fn require(
    fields: &mut BTreeMap<String, Value>,
    kind: TaskKind,
    field: &'static str,
) -> Result<String, TaskFormatError> {
    take_string(fields, field)?.ok_or_else(|| missing(kind, field))
}

fn missing(kind: TaskKind, field: &'static str) -> TaskFormatError {
    TaskFormatError::MissingField {
        kind: kind.to_string(),
        field,
    }
}

fn take_detail(
    kind: TaskKind,
    fields: &mut BTreeMap<String, Value>,
) -> Result<TaskDetail, TaskFormatError> {
    let detail = match kind {
        TaskKind::FileDrop => TaskDetail::FileDrop {
            source_file: require(fields, kind, "source_file")?,
        },
        TaskKind::GmailEmail => TaskDetail::GmailEmail {
            from: require(fields, kind, "from")?,
            subject: require(fields, kind, "subject")?,
            message_id: require(fields, kind, "message_id")?,
        },
        TaskKind::LinkedinPost => TaskDetail::LinkedinPost {
            content: require(fields, kind, "content")?,
        },
        TaskKind::ApprovalRequest => {
            let action_type = require(fields, kind, "action_type")?;
            let action = take_string(fields, "action")?;
            let expires_raw = match take_string(fields, "expires")? {
                Some(raw) => raw,
                None => require(fields, kind, "expires_at")?,
            };
            let expires_at = parse_timestamp("expires", &expires_raw)?;
            let action_payload = match fields.remove("action_payload") {
                None | Some(Value::Null) => serde_json::Value::Object(Default::default()),
                Some(value) => {
                    serde_json::to_value(&value).map_err(|e| TaskFormatError::InvalidField {
                        field: "action_payload",
                        value: e.to_string(),
                    })?
                }
            };
            TaskDetail::ApprovalRequest {
                action_type,
                action,
                action_payload,
                expires_at,
            }
        }
        TaskKind::Plan => TaskDetail::Plan {
            objective: require(fields, kind, "objective")?,
        },
    };
    Ok(detail)
}

fn put(map: &mut Mapping, key: &str, value: impl Into<Value>) {
    map.insert(Value::from(key), value.into());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
