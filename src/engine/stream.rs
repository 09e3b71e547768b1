use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use super::primitive::{ArgMap, Primitive};
use crate::error::Result;

thread_local! {
    static STREAM: RefCell<Stream> = RefCell::new(Stream::default());
}

/// Per-thread queue of registered primitives, executed in order on `submit`.
#[derive(Default)]
pub struct Stream {
    pending: Vec<(Rc<dyn Primitive>, ArgMap)>,
    submitted: u64,
}

impl Stream {
    /// Run `f` with this thread's stream.
    ///
    /// The stream is taken out of the thread-local for the duration of `f`, so a
    /// call re-entered on this thread (a stolen rayon job) gets its own empty stream.
    pub fn with<R>(f: impl FnOnce(&mut Stream) -> R) -> R {
        let mut stream = STREAM.with(|s| std::mem::take(&mut *s.borrow_mut()));
        let r = f(&mut stream);
        let _ = STREAM.try_with(|s| {
            let mut slot = s.borrow_mut();
            stream.submitted += slot.submitted;
            *slot = stream;
        });
        r
    }

    pub fn register(&mut self, prim: Rc<dyn Primitive>, args: ArgMap) {
        self.pending.push((prim, args));
    }

    pub fn pending(&self) -> usize { self.pending.len() }

    /// Primitives executed by this stream so far.
    pub fn submitted(&self) -> u64 { self.submitted }

    /// Execute everything registered. Outputs are complete when this returns.
    pub fn submit(&mut self) -> Result<()> {
        let ops = std::mem::take(&mut self.pending);
        trace!("submit {} primitive(s)", ops.len());
        for (prim, args) in &ops {
            trace!("execute {} with {} arg(s)", prim.kind(), args.len());
            prim.execute(args)?;
            self.submitted += 1;
        }
        Ok(())
    }

    /// Drop registered work without running it.
    pub fn discard(&mut self) {
        if !self.pending.is_empty() { trace!("discard {} primitive(s)", self.pending.len()); }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{Buffer, MemDesc, Memory};
    use crate::engine::primitive::{ArgId, ReorderPrimitive};
    use crate::tensor::DType;

    #[test]
    fn submit_runs_in_registration_order() {
        let src = Memory::from_buffer(&[2], Buffer::I8(vec![3, -3])).unwrap();
        let mid = Memory::new(&MemDesc::new(&[2], DType::Int32));
        let dst = Memory::new(&MemDesc::new(&[2], DType::Int32));
        let first = ReorderPrimitive::new(src.desc(), mid.desc(), 2.0).unwrap();
        let second = ReorderPrimitive::new(mid.desc(), dst.desc(), 10.0).unwrap();
        let mut s = Stream::default();
        s.register(Rc::new(first), [(ArgId::From, src), (ArgId::To, mid.clone())].into_iter().collect());
        s.register(Rc::new(second), [(ArgId::From, mid), (ArgId::To, dst.clone())].into_iter().collect());
        assert_eq!(s.pending(), 2);
        s.submit().unwrap();
        assert_eq!(s.pending(), 0);
        assert_eq!(s.submitted(), 2);
        assert_eq!(dst.snapshot().unwrap(), Buffer::I32(vec![60, -60]));
    }

    #[test]
    fn nested_with_gets_its_own_stream() {
        let src = Memory::from_buffer(&[1], Buffer::I8(vec![4])).unwrap();
        let dst = Memory::new(&MemDesc::new(&[1], DType::Int32));
        let before = Stream::with(|s| s.submitted());
        Stream::with(|outer| {
            let prim = ReorderPrimitive::new(src.desc(), dst.desc(), 1.0).unwrap();
            outer.register(Rc::new(prim), [(ArgId::From, src.clone()), (ArgId::To, dst.clone())].into_iter().collect());
            Stream::with(|inner| {
                assert_eq!(inner.pending(), 0);
                let prim = ReorderPrimitive::new(src.desc(), dst.desc(), 2.0).unwrap();
                inner.register(Rc::new(prim), [(ArgId::From, src.clone()), (ArgId::To, dst.clone())].into_iter().collect());
                inner.submit().unwrap();
            });
            assert_eq!(outer.pending(), 1);
            assert_eq!(dst.snapshot().unwrap(), Buffer::I32(vec![8]));
            outer.submit().unwrap();
        });
        assert_eq!(dst.snapshot().unwrap(), Buffer::I32(vec![4]));
        assert_eq!(Stream::with(|s| s.submitted()) - before, 2);
    }

    #[test]
    fn discard_drops_pending_work() {
        let src = Memory::new(&MemDesc::new(&[1], DType::Int8));
        let prim = ReorderPrimitive::new(src.desc(), src.desc(), 1.0).unwrap();
        let mut s = Stream::default();
        s.register(Rc::new(prim), [(ArgId::From, src.clone()), (ArgId::To, src)].into_iter().collect());
        s.discard();
        s.submit().unwrap();
        assert_eq!(s.submitted(), 0);
    }
}
