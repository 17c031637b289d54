//! Double-buffered per-cell simulation state.
//!
//! The grid is a square of `dimension × dimension` cells stored row-major
//! with row 0 at the bottom. Two equally sized slots alternate roles: the
//! front slot holds the last completed step and is read by the simulator
//! and compositor, the back slot is written by the simulator. A single
//! `front_is_b` flag selects which is which, and [`StateBuffer::swap`] is the
//! only point where roles change.

use bytemuck::{Pod, Zeroable};

use crate::error::AllocationError;

/// State persisted for one grid cell.
///
/// Layout matches a `vec4<f32>` so the same bytes can be uploaded to a
/// storage buffer unchanged.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CellState {
    /// Brightness after effects, rescaling and temporal blending.
    pub brightness: f32,
    /// Progress through the glyph sequence, in `[0, 1)`.
    pub cycle_phase: f32,
    /// Atlas cell index derived from `cycle_phase`. In the debug view this
    /// holds the clamped cycle speed instead.
    pub symbol: f32,
    /// Transient highlight channel. Recomputed every step.
    pub effect: f32,
}

impl CellState {
    /// The all-zero sentinel stored in never-written cells.
    pub const UNINITIALIZED: CellState = CellState {
        brightness: 0.0,
        cycle_phase: 0.0,
        symbol: 0.0,
        effect: 0.0,
    };

    /// Whether this cell has never been written by the simulator.
    #[inline]
    pub fn is_uninitialized(&self) -> bool {
        self.brightness == 0.0 && self.cycle_phase == 0.0 && self.symbol == 0.0 && self.effect == 0.0
    }
}

/// Two alternating grids of [`CellState`].
#[derive(Debug)]
pub struct StateBuffer {
    dimension: u32,
    slots: [Vec<CellState>; 2],
    front_is_b: bool,
}

impl StateBuffer {
    /// Allocate a `dimension × dimension` grid, cleared to the sentinel.
    pub fn new(dimension: u32) -> Result<Self, AllocationError> {
        let len = slot_len(dimension)?;
        Ok(Self {
            dimension,
            slots: [allocate_slot(len)?, allocate_slot(len)?],
            front_is_b: false,
        })
    }

    /// Cells per side.
    #[inline]
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Cells per slot.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots[0].len()
    }

    /// Whether the grid is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots[0].is_empty()
    }

    /// The last completed step.
    #[inline]
    pub fn front(&self) -> &[CellState] {
        &self.slots[self.front_index()]
    }

    /// The slot the next step writes into.
    #[inline]
    pub fn back(&self) -> &[CellState] {
        &self.slots[1 - self.front_index()]
    }

    /// Mutable access to the write slot.
    #[inline]
    pub fn back_mut(&mut self) -> &mut [CellState] {
        let index = 1 - self.front_index();
        &mut self.slots[index]
    }

    /// Borrow the front slot for reading and the back slot for writing.
    pub fn split_mut(&mut self) -> (&[CellState], &mut [CellState]) {
        let [a, b] = &mut self.slots;
        if self.front_is_b {
            (b.as_slice(), a.as_mut_slice())
        } else {
            (a.as_slice(), b.as_mut_slice())
        }
    }

    /// Exchange roles: the freshly written back slot becomes the front.
    #[inline]
    pub fn swap(&mut self) {
        self.front_is_b = !self.front_is_b;
    }

    /// Clear both slots to the sentinel so every cell reseeds on its next step.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.fill(CellState::UNINITIALIZED);
        }
        self.front_is_b = false;
    }

    /// Cell at `(column, row)` in the front slot.
    pub fn cell(&self, column: u32, row: u32) -> Option<&CellState> {
        if column >= self.dimension || row >= self.dimension {
            return None;
        }
        self.front().get(row as usize * self.dimension as usize + column as usize)
    }

    #[inline]
    fn front_index(&self) -> usize {
        usize::from(self.front_is_b)
    }
}

/// Cells per slot, rejecting grids whose byte size does not fit in `usize`.
fn slot_len(dimension: u32) -> Result<usize, AllocationError> {
    let len = (dimension as usize)
        .checked_mul(dimension as usize)
        .ok_or(AllocationError::Overflow { what: "state buffer" })?;
    len.checked_mul(std::mem::size_of::<CellState>())
        .ok_or(AllocationError::Overflow { what: "state buffer" })?;
    Ok(len)
}

fn allocate_slot(len: usize) -> Result<Vec<CellState>, AllocationError> {
    let mut slot = Vec::new();
    slot.try_reserve_exact(len)
        .map_err(|source| AllocationError::Reserve { what: "state buffer", source })?;
    slot.resize(len, CellState::UNINITIALIZED);
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_state_layout() {
        assert_eq!(std::mem::size_of::<CellState>(), 16);
        let bytes = bytemuck::bytes_of(&CellState::UNINITIALIZED);
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_new_is_uninitialized() {
        let buffer = StateBuffer::new(5).unwrap();
        assert_eq!(buffer.dimension(), 5);
        assert_eq!(buffer.len(), 25);
        assert!(buffer.front().iter().all(CellState::is_uninitialized));
        assert!(buffer.back().iter().all(CellState::is_uninitialized));
    }

    #[test]
    fn test_swap_exchanges_slots() {
        let mut buffer = StateBuffer::new(2).unwrap();
        {
            let (front, back) = buffer.split_mut();
            assert!(front[0].is_uninitialized());
            back[0].brightness = 0.5;
        }
        assert_eq!(buffer.front()[0].brightness, 0.0);
        buffer.swap();
        assert_eq!(buffer.front()[0].brightness, 0.5);
        assert_eq!(buffer.back()[0].brightness, 0.0);
        buffer.swap();
        assert_eq!(buffer.front()[0].brightness, 0.0);
    }

    #[test]
    fn test_reset_clears_both_slots() {
        let mut buffer = StateBuffer::new(3).unwrap();
        buffer.back_mut().fill(CellState { brightness: 1.0, cycle_phase: 0.5, symbol: 2.0, effect: 0.0 });
        buffer.swap();
        buffer.back_mut().fill(CellState { brightness: -1.0, cycle_phase: 0.25, symbol: 1.0, effect: 0.0 });
        buffer.reset();
        assert!(buffer.front().iter().all(CellState::is_uninitialized));
        assert!(buffer.back().iter().all(CellState::is_uninitialized));
    }

    #[test]
    fn test_cell_lookup() {
        let mut buffer = StateBuffer::new(4).unwrap();
        buffer.back_mut()[4 + 2].cycle_phase = 0.75;
        buffer.swap();
        assert_eq!(buffer.cell(2, 1).map(|c| c.cycle_phase), Some(0.75));
        assert!(buffer.cell(4, 0).is_none());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_oversized_grid_overflows() {
        // u32::MAX² cells fit in usize but their byte size does not.
        assert!(matches!(
            StateBuffer::new(u32::MAX),
            Err(AllocationError::Overflow { what: "state buffer" })
        ));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_unreservable_grid_fails_to_reserve() {
        // 10^18 cells are 1.6 * 10^19 bytes, above isize::MAX but below usize::MAX.
        let err = StateBuffer::new(1_000_000_000).unwrap_err();
        assert!(matches!(err, AllocationError::Reserve { what: "state buffer", .. }));
    }

    #[test]
    fn test_slot_len() {
        assert_eq!(slot_len(0).unwrap(), 0);
        assert_eq!(slot_len(7).unwrap(), 49);
    }

    #[test]
    fn test_any_nonzero_channel_is_initialized() {
        let cell = CellState { brightness: 0.0, cycle_phase: 0.0, symbol: 0.0, effect: 0.75 };
        assert!(!cell.is_uninitialized());
    }
}
