//! TUI Bridge (component 8): the minimal façade an external terminal UI
//! calls into. No event loop and no direct stdio access — an external host
//! owns the terminal; this bridge only forwards to [`Engine`] so state
//! transitions are never duplicated outside the App Service (§4.7).

use crate::cancel::CancellationToken;
use crate::engine::Engine;
use crate::error::TicketFlowError;
use crate::ticket::{Status, Ticket};

pub struct TuiBridge<'a> {
    engine: &'a Engine,
}

impl<'a> TuiBridge<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Resolves the current ticket, if any, without erroring when there is
    /// none — the host UI needs to distinguish "no current ticket" from a
    /// genuine failure so it can render an empty-state view.
    pub fn current_ticket(&self, token: &CancellationToken) -> Result<Option<Ticket>, TicketFlowError> {
        let status = self.engine.status(token)?;
        match status.current_ticket_id {
            Some(id) => Ok(Some(self.engine.store().load(&id, token)?)),
            None => Ok(None),
        }
    }

    /// A non-blocking ticket list, optionally filtered by status, for the
    /// host's list view.
    pub fn list(&self, status_filter: Option<Status>, token: &CancellationToken) -> Result<Vec<Ticket>, TicketFlowError> {
        self.engine.store().list(status_filter, token)
    }

    /// Forwards to `close_by_id`, the flow named `close_with_reason` in the
    /// design notes: the host always supplies a reason from a prompt it
    /// owns.
    pub fn close_with_reason(&self, id: &str, reason: &str, token: &CancellationToken) -> Result<Ticket, TicketFlowError> {
        self.engine.close_by_id(id, false, Some(reason), token)
    }

    pub fn restore(&self, token: &CancellationToken) -> Result<Ticket, TicketFlowError> {
        self.engine.restore_symlink(token)
    }
}
