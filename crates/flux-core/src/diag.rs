// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structured diagnostics with stable codes, targets, and lifecycles.
//!
//! Diagnostics are data, not exceptions: the compiler and executor push them
//! into the [`DiagnosticsHub`] and keep going where safe. Actions are purely
//! declarative (ids, never closures) so hosts can replay and serialize them.

use std::collections::BTreeMap;

use crate::ident::{BlockId, EdgeId, StableTargetId};

/// Severity of a diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Blocks compilation or corrupts output.
    Error,
    /// Suspicious but survivable.
    Warn,
    /// Informational (e.g. an auto-inserted lens).
    Info,
}

/// Which subsystem raised the diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagDomain {
    /// Structural problems in the authored patch.
    Authoring,
    /// Type solving, adapter insertion, lowering, scheduling.
    Compile,
    /// Per-frame execution.
    Runtime,
    /// Gauge/slew state management.
    Continuity,
}

/// Stable diagnostic code. `E_*` errors, `W_*` warnings, `I_*` info,
/// `P_*` per-frame runtime probes.
pub mod codes {
    /// No time root block in the compiled program.
    pub const E_TIME_ROOT_MISSING: &str = "E_TIME_ROOT_MISSING";
    /// No adapter reconciles an edge's endpoint types.
    pub const E_TYPE_MISMATCH: &str = "E_TYPE_MISMATCH";
    /// Cardinalities disagree and no broadcast applies.
    pub const E_CARDINALITY_MISMATCH: &str = "E_CARDINALITY_MISMATCH";
    /// Payload axes disagree.
    pub const E_PAYLOAD_MISMATCH: &str = "E_PAYLOAD_MISMATCH";
    /// Unit axes disagree (strict mode).
    pub const E_UNIT_MISMATCH: &str = "E_UNIT_MISMATCH";
    /// Unit axes disagree (lenient mode; adapter inserted).
    pub const W_UNIT_MISMATCH: &str = "W_UNIT_MISMATCH";
    /// A unit variable survived constraint solving.
    pub const E_UNRESOLVED_UNIT: &str = "E_UNRESOLVED_UNIT";
    /// A payload-generic block could not be pinned.
    pub const E_UNRESOLVED_PAYLOAD: &str = "E_UNRESOLVED_PAYLOAD";
    /// The patch graph contains a cycle outside state slots.
    pub const E_CYCLE: &str = "E_CYCLE";
    /// An edge endpoint references a missing block or port.
    pub const E_DANGLING_EDGE: &str = "E_DANGLING_EDGE";
    /// Two blocks share one id.
    pub const E_DUPLICATE_BLOCK: &str = "E_DUPLICATE_BLOCK";
    /// Combine mode is not legal for the port's payload.
    pub const E_COMBINE_MODE: &str = "E_COMBINE_MODE";
    /// An event edge crosses into continuous flow without hold/crossing.
    pub const E_TEMPORALITY: &str = "E_TEMPORALITY";
    /// A required input port has no edge, default, or optional marker.
    pub const E_MISSING_INPUT: &str = "E_MISSING_INPUT";
    /// Block config value is missing or of the wrong shape.
    pub const E_INVALID_CONFIG: &str = "E_INVALID_CONFIG";
    /// `checkTypeConnection` demanded an adapter no pattern provides.
    pub const E_ADAPTER_NOT_FOUND: &str = "E_ADAPTER_NOT_FOUND";
    /// Stable identity required but the instance provides none.
    pub const E_CONTINUITY_IDENTITY: &str = "E_CONTINUITY_IDENTITY";
    /// A block has no path to any renderer.
    pub const W_GRAPH_DISCONNECTED_BLOCK: &str = "W_GRAPH_DISCONNECTED_BLOCK";
    /// An auto-inserted contract lens.
    pub const I_LENS_INSERTED: &str = "I_LENS_INSERTED";
    /// A kernel produced NaN where none was expected.
    pub const P_NAN_DETECTED: &str = "P_NAN_DETECTED";
    /// A kernel was invoked with the wrong argument count.
    pub const P_KERNEL_ARITY: &str = "P_KERNEL_ARITY";
}

/// What a diagnostic points at.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagTarget {
    /// The whole patch.
    Patch,
    /// A block instance.
    Block(BlockId),
    /// A port on a block instance.
    Port {
        /// Owning block.
        block: BlockId,
        /// Port name.
        port: String,
    },
    /// An edge.
    Edge(EdgeId),
    /// A continuity target.
    Continuity(StableTargetId),
    /// A frame, by index.
    Frame(u64),
}

/// Declarative repair action attached to a diagnostic.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagAction {
    /// Focus the editor on a target.
    GoToTarget(DiagTarget),
    /// Insert a block of the named registry type.
    InsertBlock {
        /// Registry type name.
        block_type: String,
    },
    /// Remove a block.
    RemoveBlock(BlockId),
    /// Insert the named adapter on an edge.
    AddAdapter {
        /// Registry type name of the adapter.
        adapter_type: String,
        /// Edge to split.
        edge: EdgeId,
    },
    /// Create a time root of the named kind.
    CreateTimeRoot {
        /// Time root kind, e.g. `"Infinite"`.
        time_root_kind: String,
    },
    /// Suppress further reports of this code.
    MuteDiagnostic {
        /// Code to mute.
        code: String,
    },
    /// Open documentation.
    OpenDocs {
        /// Documentation slug.
        slug: String,
    },
}

/// One structured diagnostic.
///
/// Serialize-only under the `serde` feature: codes are static strings and
/// diagnostics flow outward to hosts, never back in.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    /// Hub-assigned sequence id.
    pub id: u64,
    /// Stable code (see [`codes`]).
    pub code: &'static str,
    /// Severity.
    pub severity: Severity,
    /// Raising subsystem.
    pub domain: DiagDomain,
    /// Primary target.
    pub primary: DiagTarget,
    /// Additional targets.
    pub secondary: Vec<DiagTarget>,
    /// Patch revision this diagnostic was raised against, if any.
    pub patch_revision: Option<u64>,
    /// Compile revision this diagnostic was raised against, if any.
    pub compile_revision: Option<u64>,
    /// Short human title.
    pub title: String,
    /// Full message.
    pub message: String,
    /// Optional remediation hint.
    pub hint: Option<String>,
    /// Declarative repair actions.
    pub actions: Vec<DiagAction>,
}

impl Diagnostic {
    /// Starts a diagnostic with the required fields; the rest default empty.
    #[must_use]
    pub fn new(
        code: &'static str,
        severity: Severity,
        domain: DiagDomain,
        primary: DiagTarget,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            code,
            severity,
            domain,
            primary,
            secondary: Vec::new(),
            patch_revision: None,
            compile_revision: None,
            title: title.into(),
            message: message.into(),
            hint: None,
            actions: Vec::new(),
        }
    }

    /// Attaches a hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attaches an action.
    #[must_use]
    pub fn with_action(mut self, action: DiagAction) -> Self {
        self.actions.push(action);
        self
    }
}

#[derive(Clone, Debug)]
struct HubEntry {
    diag: Diagnostic,
    last_seen: u64,
    resolved_at: Option<u64>,
}

/// Collects diagnostics, dedupes by `(code, primary target)`, and tracks
/// active/resolved lifecycle across revisions.
///
/// Revisions are monotone: [`DiagnosticsHub::begin_revision`] opens a new
/// observation window; compile-domain entries not re-reported within the
/// window are resolved when the next window opens.
#[derive(Debug, Default)]
pub struct DiagnosticsHub {
    entries: BTreeMap<(&'static str, DiagTarget), HubEntry>,
    muted: Vec<String>,
    next_id: u64,
    revision: u64,
}

impl DiagnosticsHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current observation revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Opens a new revision window.
    ///
    /// Compile- and authoring-domain entries that were not re-reported during
    /// the previous window are marked resolved at the new revision.
    pub fn begin_revision(&mut self) {
        self.revision += 1;
        let rev = self.revision;
        for entry in self.entries.values_mut() {
            let stale = matches!(
                entry.diag.domain,
                DiagDomain::Compile | DiagDomain::Authoring
            ) && entry.last_seen + 1 < rev;
            if stale && entry.resolved_at.is_none() {
                entry.resolved_at = Some(rev);
            }
        }
    }

    /// Reports a diagnostic, returning its hub id (or `None` when muted).
    ///
    /// Re-reporting the same `(code, primary)` pair refreshes the existing
    /// entry and clears any resolution.
    pub fn report(&mut self, mut diag: Diagnostic) -> Option<u64> {
        if self.muted.iter().any(|m| m == diag.code) {
            return None;
        }
        let key = (diag.code, diag.primary.clone());
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_seen = self.revision;
            entry.resolved_at = None;
            entry.diag.message = std::mem::take(&mut diag.message);
            entry.diag.hint = diag.hint.take();
            entry.diag.actions = std::mem::take(&mut diag.actions);
            return Some(entry.diag.id);
        }
        self.next_id += 1;
        diag.id = self.next_id;
        let id = diag.id;
        self.entries.insert(
            key,
            HubEntry {
                diag,
                last_seen: self.revision,
                resolved_at: None,
            },
        );
        Some(id)
    }

    /// Mutes a code; subsequent reports with it are dropped.
    pub fn mute(&mut self, code: impl Into<String>) {
        self.muted.push(code.into());
    }

    /// Returns all unresolved diagnostics in deterministic order.
    #[must_use]
    pub fn active(&self) -> Vec<&Diagnostic> {
        self.entries
            .values()
            .filter(|e| e.resolved_at.is_none())
            .map(|e| &e.diag)
            .collect()
    }

    /// Returns diagnostics resolved at or after `revision`.
    #[must_use]
    pub fn resolved_since(&self, revision: u64) -> Vec<&Diagnostic> {
        self.entries
            .values()
            .filter(|e| e.resolved_at.is_some_and(|r| r >= revision))
            .map(|e| &e.diag)
            .collect()
    }

    /// Drops every entry. Used when a patch is replaced wholesale.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(code: &'static str) -> Diagnostic {
        Diagnostic::new(
            code,
            Severity::Error,
            DiagDomain::Compile,
            DiagTarget::Patch,
            "t",
            "m",
        )
    }

    #[test]
    fn dedupe_by_code_and_target() {
        let mut hub = DiagnosticsHub::new();
        let a = hub.report(probe(codes::E_CYCLE));
        let b = hub.report(probe(codes::E_CYCLE));
        assert_eq!(a, b);
        assert_eq!(hub.active().len(), 1);
    }

    #[test]
    fn unreported_compile_diags_resolve_next_window() {
        let mut hub = DiagnosticsHub::new();
        hub.report(probe(codes::E_CYCLE));
        hub.begin_revision();
        // Not re-reported during revision 1.
        hub.begin_revision();
        assert!(hub.active().is_empty());
        assert_eq!(hub.resolved_since(0).len(), 1);
    }

    #[test]
    fn muted_codes_drop() {
        let mut hub = DiagnosticsHub::new();
        hub.mute(codes::E_CYCLE);
        assert_eq!(hub.report(probe(codes::E_CYCLE)), None);
        assert!(hub.active().is_empty());
    }
}
