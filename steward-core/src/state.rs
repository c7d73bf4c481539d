//! Vault folders and the transition table between them.
//!
//! ```text
//! Needs_Action     -> In_Progress
//! In_Progress      -> Pending_Approval | Done
//! Pending_Approval -> Approved | Rejected        (human action)
//! Approved         -> Done                        (engine executes then archives)
//! Rejected         -> Done                        (archival only)
//! Plans            -> Done                        (archival of a finished plan)
//! ```
//!
//! Anything else is an illegal transition and must leave the file where it is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::TaskName;

/// A folder inside the vault that holds task files.
///
/// The first six variants are workflow states; `Plans` is an auxiliary
/// folder whose only outgoing edge is archival into `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Folder {
    #[serde(rename = "Needs_Action")]
    NeedsAction,
    #[serde(rename = "In_Progress")]
    InProgress,
    #[serde(rename = "Pending_Approval")]
    PendingApproval,
    #[serde(rename = "Approved")]
    Approved,
    #[serde(rename = "Rejected")]
    Rejected,
    #[serde(rename = "Done")]
    Done,
    #[serde(rename = "Plans")]
    Plans,
}

impl Folder {
    /// Every folder, workflow order first.
    pub const ALL: [Folder; 7] = [
        Folder::NeedsAction,
        Folder::InProgress,
        Folder::PendingApproval,
        Folder::Approved,
        Folder::Rejected,
        Folder::Done,
        Folder::Plans,
    ];

    /// The workflow states only.
    pub const STATES: [Folder; 6] = [
        Folder::NeedsAction,
        Folder::InProgress,
        Folder::PendingApproval,
        Folder::Approved,
        Folder::Rejected,
        Folder::Done,
    ];

    /// Directory name under the vault root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Folder::NeedsAction => "Needs_Action",
            Folder::InProgress => "In_Progress",
            Folder::PendingApproval => "Pending_Approval",
            Folder::Approved => "Approved",
            Folder::Rejected => "Rejected",
            Folder::Done => "Done",
            Folder::Plans => "Plans",
        }
    }

    /// Folders where watchers or the engine may create new task files.
    pub fn is_entry(&self) -> bool {
        matches!(
            self,
            Folder::NeedsAction | Folder::PendingApproval | Folder::Plans
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Folder::Done | Folder::Rejected)
    }

    /// Legal single-hop destinations from this folder.
    pub fn successors(&self) -> &'static [Folder] {
        match self {
            Folder::NeedsAction => &[Folder::InProgress],
            Folder::InProgress => &[Folder::PendingApproval, Folder::Done],
            Folder::PendingApproval => &[Folder::Approved, Folder::Rejected],
            Folder::Approved => &[Folder::Done],
            Folder::Rejected => &[Folder::Done],
            Folder::Done => &[],
            Folder::Plans => &[Folder::Done],
        }
    }

    pub fn can_move_to(&self, to: Folder) -> bool {
        self.successors().contains(&to)
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Folder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Folder::ALL
            .iter()
            .copied()
            .find(|folder| folder.dir_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown folder '{s}'; expected one of: {}",
                    Folder::ALL.map(|f| f.dir_name()).join(", ")
                )
            })
    }
}

/// Validate a move against the transition table.
pub fn check_transition(name: &TaskName, from: Folder, to: Folder) -> Result<(), StoreError> {
    if from.can_move_to(to) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition {
            name: name.clone(),
            from,
            to,
        })
    }
}
