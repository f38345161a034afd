pub mod reconciler;
pub mod scroll;
pub mod session;

pub use reconciler::MessageReconciler;
pub use scroll::{ScrollCoordinator, ScrollState, Viewport};
pub use session::{HistoryOutcome, HistoryResponse, LiveOutcome, PageRequest, RoomSession};
