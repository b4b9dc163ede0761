mod event;

pub use event::{CreateEntityRequest, Entity, EventKind, NewEvent, RecordEventRequest};
