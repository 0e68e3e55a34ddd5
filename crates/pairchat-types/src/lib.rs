// ============================================================================
// Pairchat Types - Core Data Types
// ============================================================================
//
// Data structures shared by every layer of the messaging core. No storage,
// no I/O, no business logic.
//
// Contents:
// - Message / Conversation records (message.rs)
// - Client <-> server socket envelopes (envelope.rs)
// - Paginated response shapes (page.rs)
//
// ============================================================================

pub mod envelope;
pub mod message;
pub mod page;

pub use envelope::*;
pub use message::*;
pub use page::*;
