pub mod ticket_index;

pub use ticket_index::{TicketFilter, TicketIndexError, TicketIndexProjection, TicketReadModel};
