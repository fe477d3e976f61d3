use std::collections::HashSet;

use crate::Index;

/// `DebugHistory` asserts that an identifier is never handed out while
/// it is still live and that only live identifiers are retired.
#[derive(Default, Debug)]
pub struct DebugHistory {
    live: HashSet<Index>,
}

impl DebugHistory {
    pub fn mark_create(&mut self, index: Index) {
        let newly_live = self.live.insert(index);
        assert!(newly_live, "identifier {index} handed out while still live");
    }

    pub fn mark_free(&mut self, index: Index) {
        let was_live = self.live.remove(&index);
        assert!(was_live, "identifier {index} retired while not live");
    }
}
