//! Lead ordering within columns.
//!
//! Positions are kept dense (`0..n-1`) on every path that places a lead into
//! a column: drag-moves, manual creation and webhook intake. Deletes leave
//! gaps behind; the next placement into the column closes them. All
//! functions here are pure and only compute the rows that need to change,
//! so the database layer and the client-side board view agree on the result.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Lead;

/// New location of a single lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub id: Uuid,
    pub column_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    /// False when the lead already sits in the destination column.
    pub moved: bool,
    /// Where the dragged lead ends up.
    pub target: PositionUpdate,
    /// Every other lead whose position changes.
    pub updates: Vec<PositionUpdate>,
}

/// Canonical top-to-bottom order of the given leads. Equal positions are
/// broken by creation time, then by id, so the order is total.
pub fn sequence<'a, I>(leads: I) -> Vec<&'a Lead>
where
    I: IntoIterator<Item = &'a Lead>,
{
    let mut ordered: Vec<&Lead> = leads.into_iter().collect();
    ordered.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered
}

/// Leads of `column_id` in canonical order.
pub fn column_sequence(leads: &[Lead], column_id: Uuid) -> Vec<&Lead> {
    sequence(leads.iter().filter(|lead| lead.column_id == column_id))
}

/// Updates that make `column_id` dense. Leads of other columns are ignored.
pub fn compact(leads: &[Lead], column_id: Uuid) -> Vec<PositionUpdate> {
    renumber(column_id, &column_sequence(leads, column_id), 0)
}

/// Plan a drag-move of `lead_id` into `destination`.
///
/// The lead is appended: its new position is the number of leads in the
/// destination before the move. The destination is compacted first and the
/// source is compacted after the lead leaves. Returns `None` when `lead_id`
/// is not among `leads`.
pub fn plan_move(leads: &[Lead], lead_id: Uuid, destination: Uuid) -> Option<MovePlan> {
    let lead = leads.iter().find(|lead| lead.id == lead_id)?;

    if lead.column_id == destination {
        return Some(MovePlan {
            moved: false,
            target: PositionUpdate {
                id: lead.id,
                column_id: lead.column_id,
                position: lead.position,
            },
            updates: Vec::new(),
        });
    }

    let source = lead.column_id;
    let dest_ordered = column_sequence(leads, destination);
    let mut updates = renumber(destination, &dest_ordered, 0);

    let target = PositionUpdate {
        id: lead.id,
        column_id: destination,
        position: dest_ordered.len() as i32,
    };

    let remaining = sequence(
        leads
            .iter()
            .filter(|other| other.column_id == source && other.id != lead_id),
    );
    updates.extend(renumber(source, &remaining, 0));

    Some(MovePlan {
        moved: true,
        target,
        updates,
    })
}

/// Shift the leads of `column_id` to `1..=n`, freeing position 0 for a lead
/// inserted at the head of the column.
pub fn plan_head_insert(leads: &[Lead], column_id: Uuid) -> Vec<PositionUpdate> {
    renumber(column_id, &column_sequence(leads, column_id), 1)
}

/// Compact `column_id` and return the position for a lead appended to it.
pub fn plan_append(leads: &[Lead], column_id: Uuid) -> (Vec<PositionUpdate>, i32) {
    let ordered = column_sequence(leads, column_id);
    let position = ordered.len() as i32;
    (renumber(column_id, &ordered, 0), position)
}

fn renumber(column_id: Uuid, ordered: &[&Lead], offset: i32) -> Vec<PositionUpdate> {
    ordered
        .iter()
        .enumerate()
        .filter_map(|(idx, lead)| {
            let position = offset + idx as i32;
            (lead.position != position || lead.column_id != column_id).then_some(PositionUpdate {
                id: lead.id,
                column_id,
                position,
            })
        })
        .collect()
}
