//! Stage 7: storage addresses.
//!
//! Constant and mutable globals live in two separate regions. Member
//! variables get offsets inside their own definition only; a parent's
//! layout may belong to another library, so offsets start at zero in every
//! class and the runtime adds the parent's size when it lays out instances.

use serde::{Deserialize, Serialize};

use crate::table::LibraryTable;

/// Region sizes in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub constant_size: u32,
    pub data_size: u32,
}

/// Slots align to their own size, capped at 8.
fn align(offset: u32, size: u32) -> u32 {
    let alignment = size.clamp(1, 8);
    offset.div_ceil(alignment) * alignment
}

pub fn assign(table: &mut LibraryTable) -> Layout {
    let mut layout = Layout::default();
    for variable in &mut table.variables {
        let size = variable.ty.slot_size();
        let region = if variable.constant { &mut layout.constant_size } else { &mut layout.data_size };
        variable.address = align(*region, size);
        *region = variable.address + size;
    }

    for definition in &mut table.definitions {
        let mut offset = 0;
        for variable in &mut definition.variables {
            let size = variable.ty.slot_size();
            variable.offset = align(offset, size);
            offset = variable.offset + size;
        }
        definition.size = offset;
    }

    tracing::debug!(constants = layout.constant_size, data = layout.data_size, "addresses assigned");
    layout
}
