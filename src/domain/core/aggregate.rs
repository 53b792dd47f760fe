use uuid::Uuid;

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// 1. Commands are validated against current state before anything changes
// 2. A valid command yields events; an empty list means "already done"
// 3. State only changes by applying events
//
// The current state is persisted as a document; the applied events are kept
// on it as a timeline.
//
// ============================================================================

pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Validate the command that brings a new aggregate into existence
    fn handle_create(command: &Self::Command) -> Result<Self::Event, Self::Error>;

    /// Build the aggregate from its creation event
    fn apply_first_event(id: Uuid, event: &Self::Event) -> Result<Self, Self::Error>;

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Business rules: decide which events a command produces
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
