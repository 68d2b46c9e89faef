//! `weighpoint-tickets` — the vehicle weighing state machine.
//!
//! A ticket tracks one vehicle weighing event from creation through
//! finalization (or void). The lifecycle is a strict two-step capture
//! (tare, then gross, then settlement) and the captured weights live
//! inside the state variants, so a gross weight without a tare weight is
//! not representable.

pub mod number;
pub mod ticket;

pub use number::TicketNumber;
pub use ticket::{
    CaptureGross, CaptureTare, FinalizeTicket, OpenTicket, QualityRecord, Settlement, Ticket,
    TicketCommand, TicketEvent, TicketFinalized, TicketId, TicketOpened, TicketState,
    TicketVoided, VoidRecord, VoidTicket, WeightCapture,
};
