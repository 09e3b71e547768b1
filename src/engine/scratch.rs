use std::cell::RefCell;

use log::warn;

use super::memory::{MemDesc, Memory};

thread_local! {
    static ARENA: RefCell<ScratchArena> = RefCell::new(ScratchArena::default());
}

/// Per-thread bump arena of memory blocks.
#[derive(Default)]
struct ScratchArena {
    blocks: Vec<Memory>,
    cursor: usize,
    fresh: u64,
}

impl ScratchArena {
    fn reset(&mut self) {
        for block in &mut self.blocks[..self.cursor] {
            if block.is_shared() {
                // Someone kept the handle past its call; never hand it out again
                warn!("scratch block {:?} escaped its call; detaching", block.desc());
                *block = Memory::new(block.desc());
            }
        }
        self.cursor = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    pub blocks: usize,
    pub fresh_allocations: u64,
}

/// Call-scoped view of this thread's arena. Blocks handed out are valid until the scope drops.
pub struct ScratchScope {
    arena: ScratchArena,
}

impl ScratchScope {
    pub fn enter() -> Self {
        let arena = ARENA.with(|a| std::mem::take(&mut *a.borrow_mut()));
        Self { arena }
    }

    pub fn alloc(&mut self, desc: &MemDesc) -> Memory {
        let arena = &mut self.arena;
        if arena.cursor == arena.blocks.len() {
            arena.blocks.push(Memory::new(desc));
            arena.fresh += 1;
        } else {
            let slot = &mut arena.blocks[arena.cursor];
            if slot.desc() != desc || slot.is_shared() {
                *slot = Memory::new(desc);
                arena.fresh += 1;
            }
        }
        arena.cursor += 1;
        arena.blocks[arena.cursor - 1].clone()
    }

    pub fn in_use(&self) -> usize { self.arena.cursor }
}

impl Drop for ScratchScope {
    fn drop(&mut self) {
        let mut arena = std::mem::take(&mut self.arena);
        arena.reset();
        let _ = ARENA.try_with(|a| *a.borrow_mut() = arena);
    }
}

/// Arena counters for the calling thread.
pub fn arena_stats() -> ArenaStats {
    ARENA.with(|a| {
        let a = a.borrow();
        ArenaStats { blocks: a.blocks.len(), fresh_allocations: a.fresh }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::DType;

    #[test]
    fn blocks_are_reused_across_scopes() {
        let d = MemDesc::new(&[8], DType::Int8);
        let before = arena_stats();
        let first = {
            let mut s = ScratchScope::enter();
            let m = s.alloc(&d);
            assert_eq!(s.in_use(), 1);
            m.desc().clone()
        };
        assert_eq!(first, d);
        {
            let mut s = ScratchScope::enter();
            let _ = s.alloc(&d);
        }
        let after = arena_stats();
        assert_eq!(after.fresh_allocations - before.fresh_allocations, 1);
    }

    #[test]
    fn escaped_block_is_detached() {
        let d = MemDesc::new(&[2], DType::Int32);
        let escaped = {
            let mut s = ScratchScope::enter();
            s.alloc(&d)
        };
        let mut s = ScratchScope::enter();
        let next = s.alloc(&d);
        assert!(!next.aliases(&escaped));
    }
}
