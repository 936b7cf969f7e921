use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::BoardEvent;
use crate::models::{Board, Column, Lead};
use crate::ordering::{self, MovePlan};

/// A subscriber's local copy of one board.
///
/// Rows are keyed by primary key. Incoming events are merged with
/// last-writer-wins on `updated_at`: an event carrying an older row than the
/// local one is dropped, an equal or newer one replaces it. Replaying the
/// same insert twice is therefore harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    pub board: Board,
    pub columns: Vec<Column>,
    pub leads: Vec<Lead>,
}

impl BoardView {
    pub fn new(board: Board, mut columns: Vec<Column>, leads: Vec<Lead>) -> Self {
        columns.sort_by_key(|c| c.position);
        let mut view = Self {
            board,
            columns,
            leads: Vec::new(),
        };
        view.reload_leads(leads);
        view
    }

    /// Leads of a column, top to bottom.
    pub fn leads_in_column(&self, column_id: Uuid) -> Vec<&Lead> {
        ordering::column_sequence(&self.leads, column_id)
    }

    /// Leads whose name contains `term`, ignoring case. An empty term matches all.
    pub fn filtered_leads(&self, term: &str) -> Vec<&Lead> {
        self.leads.iter().filter(|l| name_matches(l, term)).collect()
    }

    pub fn lead(&self, id: Uuid) -> Option<&Lead> {
        self.leads.iter().find(|l| l.id == id)
    }

    /// Replace every lead, discarding optimistic local state.
    pub fn reload_leads(&mut self, leads: Vec<Lead>) {
        self.leads = ordering::sequence(leads.iter().filter(|l| l.board_id == self.board.id))
            .into_iter()
            .cloned()
            .collect();
    }

    /// Optimistically move a lead the same way the server will. The local
    /// rows keep their `updated_at`, so the server's echo always wins.
    pub fn apply_local_move(&mut self, lead_id: Uuid, column_id: Uuid) -> Option<MovePlan> {
        if !self.columns.iter().any(|c| c.id == column_id) {
            return None;
        }
        let plan = ordering::plan_move(&self.leads, lead_id, column_id)?;
        for update in plan.updates.iter().chain(std::iter::once(&plan.target)) {
            if let Some(lead) = self.leads.iter_mut().find(|l| l.id == update.id) {
                lead.column_id = update.column_id;
                lead.position = update.position;
            }
        }
        Some(plan)
    }

    /// Merge one event. Returns whether local state changed.
    pub fn apply(&mut self, event: BoardEvent) -> bool {
        if event.board_id() != self.board.id {
            return false;
        }

        match event {
            BoardEvent::Snapshot(view) => {
                *self = view;
                true
            }
            BoardEvent::LeadCreated(lead) | BoardEvent::LeadUpdated(lead) => self.upsert_lead(lead),
            BoardEvent::LeadDeleted { id, .. } => {
                let before = self.leads.len();
                self.leads.retain(|l| l.id != id);
                self.leads.len() != before
            }
            BoardEvent::ColumnCreated(column) | BoardEvent::ColumnUpdated(column) => {
                self.upsert_column(column)
            }
            BoardEvent::ColumnDeleted { id, .. } => {
                let before = self.columns.len();
                self.columns.retain(|c| c.id != id);
                self.leads.retain(|l| l.column_id != id);
                self.columns.len() != before
            }
            BoardEvent::BoardDeleted { .. } => {
                self.columns.clear();
                self.leads.clear();
                true
            }
        }
    }

    fn upsert_lead(&mut self, lead: Lead) -> bool {
        match self.leads.iter_mut().find(|l| l.id == lead.id) {
            Some(existing) if existing.updated_at > lead.updated_at => false,
            Some(existing) => {
                let changed = *existing != lead;
                *existing = lead;
                changed
            }
            None => {
                self.leads.push(lead);
                true
            }
        }
    }

    fn upsert_column(&mut self, column: Column) -> bool {
        let changed = match self.columns.iter_mut().find(|c| c.id == column.id) {
            Some(existing) if existing.updated_at > column.updated_at => return false,
            Some(existing) => {
                let changed = *existing != column;
                *existing = column;
                changed
            }
            None => {
                self.columns.push(column);
                true
            }
        };
        self.columns.sort_by_key(|c| c.position);
        changed
    }
}

pub fn name_matches(lead: &Lead, term: &str) -> bool {
    let term = term.trim();
    term.is_empty() || lead.name.to_lowercase().contains(&term.to_lowercase())
}
