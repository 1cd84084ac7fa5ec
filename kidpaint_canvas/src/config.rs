// Canvas configuration. Loaded as part of the client's settings; every field
// has a default so a partial JSON object is enough.

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_HISTORY_LIMIT;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Maximum number of undo snapshots kept (0 disables undo).
    pub history_limit: usize,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}
