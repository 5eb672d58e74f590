use crate::error::ListenerError;
use crate::message::UserData;

/// Tick counter type. The unit is abstract; the host picks the rate by
/// choosing how often it calls [`TinyFrame::tick`](crate::TinyFrame::tick).
pub type Ticks = u32;

/// One slot in an ID listener table.
///
/// `remaining_ticks` counts down to zero on each
/// [`tick`](crate::TinyFrame::tick); `initial_ticks == 0` is the sentinel
/// for "never expires", in which case `remaining_ticks` is simply never
/// decremented.
#[derive(Clone, Copy)]
pub struct IdListenerSlot<Id, Cb> {
    pub id: Id,
    pub callback: Cb,
    pub user_data: UserData,
    pub initial_ticks: Ticks,
    pub remaining_ticks: Ticks,
}

/// Fixed-capacity table of ID listeners: `N` slots, each free (`None`) or
/// active. At most one active slot may carry a given `id`.
pub struct IdListenerTable<Id, Cb, const N: usize> {
    slots: [Option<IdListenerSlot<Id, Cb>>; N],
}

impl<Id: Copy + PartialEq, Cb: Copy, const N: usize> IdListenerTable<Id, Cb, N> {
    pub const fn new() -> Self {
        IdListenerTable { slots: [None; N] }
    }

    pub fn clear(&mut self) {
        self.slots = [None; N];
    }

    /// Registers a listener for `id`. Fails with `TableFull` if no slot is
    /// free. Re-registering the same `id` while an existing (non-expired)
    /// slot is still active overwrites that slot rather than adding a
    /// second one, since an ID can appear at most once.
    pub fn add(
        &mut self,
        id: Id,
        callback: Cb,
        user_data: UserData,
        timeout: Ticks,
    ) -> Result<(), ListenerError> {
        if let Some(existing) = self.slots.iter_mut().find(|s| matches!(s, Some(slot) if slot.id == id)) {
            *existing = Some(IdListenerSlot {
                id,
                callback,
                user_data,
                initial_ticks: timeout,
                remaining_ticks: timeout,
            });
            return Ok(());
        }
        let free = self.slots.iter_mut().find(|s| s.is_none());
        match free {
            Some(slot) => {
                *slot = Some(IdListenerSlot {
                    id,
                    callback,
                    user_data,
                    initial_ticks: timeout,
                    remaining_ticks: timeout,
                });
                Ok(())
            }
            None => Err(ListenerError::TableFull),
        }
    }

    pub fn remove(&mut self, id: Id) -> Result<(), ListenerError> {
        match self.slots.iter_mut().find(|s| matches!(s, Some(slot) if slot.id == id)) {
            Some(slot) => {
                *slot = None;
                Ok(())
            }
            None => Err(ListenerError::NotFound),
        }
    }

    pub fn renew(&mut self, id: Id) -> Result<(), ListenerError> {
        match self.slots.iter_mut().find(|s| matches!(s, Some(slot) if slot.id == id)) {
            Some(Some(slot)) => {
                slot.remaining_ticks = slot.initial_ticks;
                Ok(())
            }
            _ => Err(ListenerError::NotFound),
        }
    }

    /// Returns the index of the active slot matching `id`, if any. Dispatch
    /// and tick walk the table by index (rather than holding a reference
    /// across a callback invocation) so a callback that registers or
    /// removes listeners mid-dispatch can't invalidate iteration.
    pub fn find(&self, id: Id) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(slot) if slot.id == id))
    }

    pub fn get(&self, index: usize) -> Option<IdListenerSlot<Id, Cb>> {
        self.slots[index]
    }

    pub fn free(&mut self, index: usize) {
        self.slots[index] = None;
    }

    pub fn len(&self) -> usize {
        N
    }

    /// Ages every active slot by one tick. Returns the indices that timed
    /// out this call, in slot order, so the caller can dispatch a timeout
    /// message for each and then free it.
    pub fn age_and_collect_expired(&mut self) -> [bool; N] {
        let mut expired = [false; N];
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(s) = slot {
                if s.initial_ticks != 0 {
                    s.remaining_ticks = s.remaining_ticks.saturating_sub(1);
                    if s.remaining_ticks == 0 {
                        expired[i] = true;
                    }
                }
            }
        }
        expired
    }
}

/// One slot in a type listener table. No timeout: type listeners persist
/// until explicitly removed.
#[derive(Clone, Copy)]
pub struct TypeListenerSlot<Type, Cb> {
    pub msg_type: Type,
    pub callback: Cb,
}

/// Fixed-capacity table of type listeners. At most one active slot per
/// `msg_type`; re-registering an already-present type fails with
/// `Duplicate`.
pub struct TypeListenerTable<Type, Cb, const N: usize> {
    slots: [Option<TypeListenerSlot<Type, Cb>>; N],
}

impl<Type: Copy + PartialEq, Cb: Copy, const N: usize> TypeListenerTable<Type, Cb, N> {
    pub const fn new() -> Self {
        TypeListenerTable { slots: [None; N] }
    }

    pub fn clear(&mut self) {
        self.slots = [None; N];
    }

    pub fn add(&mut self, msg_type: Type, callback: Cb) -> Result<(), ListenerError> {
        if self
            .slots
            .iter()
            .any(|s| matches!(s, Some(slot) if slot.msg_type == msg_type))
        {
            return Err(ListenerError::Duplicate);
        }
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(TypeListenerSlot { msg_type, callback });
                Ok(())
            }
            None => Err(ListenerError::TableFull),
        }
    }

    pub fn remove(&mut self, msg_type: Type) -> Result<(), ListenerError> {
        match self
            .slots
            .iter_mut()
            .find(|s| matches!(s, Some(slot) if slot.msg_type == msg_type))
        {
            Some(slot) => {
                *slot = None;
                Ok(())
            }
            None => Err(ListenerError::NotFound),
        }
    }

    pub fn find(&self, msg_type: Type) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(slot) if slot.msg_type == msg_type))
    }

    pub fn get(&self, index: usize) -> Option<TypeListenerSlot<Type, Cb>> {
        self.slots[index]
    }
}

/// Fixed-capacity table of generic listeners, invoked for every frame that
/// reaches this priority tier. Duplicate callbacks are rejected (spec
/// invariant 2).
pub struct GenericListenerTable<Cb, const N: usize> {
    slots: [Option<Cb>; N],
}

impl<Cb: Copy + PartialEq, const N: usize> GenericListenerTable<Cb, N> {
    pub const fn new() -> Self {
        GenericListenerTable { slots: [None; N] }
    }

    pub fn clear(&mut self) {
        self.slots = [None; N];
    }

    pub fn add(&mut self, callback: Cb) -> Result<(), ListenerError> {
        if self.slots.iter().any(|s| *s == Some(callback)) {
            return Err(ListenerError::Duplicate);
        }
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(callback);
                Ok(())
            }
            None => Err(ListenerError::TableFull),
        }
    }

    pub fn remove(&mut self, callback: Cb) -> Result<(), ListenerError> {
        match self.slots.iter_mut().find(|s| *s == Some(callback)) {
            Some(slot) => {
                *slot = None;
                Ok(())
            }
            None => Err(ListenerError::NotFound),
        }
    }

    pub fn get(&self, index: usize) -> Option<Cb> {
        self.slots[index]
    }

    pub fn len(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Cb = fn() -> bool;

    #[test]
    fn id_table_fills_and_reports_full() {
        let mut t: IdListenerTable<u8, Cb, 2> = IdListenerTable::new();
        assert!(t.add(1, || true, 0, 0).is_ok());
        assert!(t.add(2, || true, 0, 0).is_ok());
        assert_eq!(t.add(3, || true, 0, 0), Err(ListenerError::TableFull));
    }

    #[test]
    fn id_table_renew_resets_remaining() {
        let mut t: IdListenerTable<u8, Cb, 2> = IdListenerTable::new();
        t.add(1, || true, 0, 5).unwrap();
        let idx = t.find(1).unwrap();
        t.age_and_collect_expired();
        t.age_and_collect_expired();
        assert_eq!(t.get(idx).unwrap().remaining_ticks, 3);
        t.renew(1).unwrap();
        assert_eq!(t.get(idx).unwrap().remaining_ticks, 5);
    }

    #[test]
    fn id_table_never_expires_when_initial_is_zero() {
        let mut t: IdListenerTable<u8, Cb, 1> = IdListenerTable::new();
        t.add(1, || true, 0, 0).unwrap();
        for _ in 0..1000 {
            let expired = t.age_and_collect_expired();
            assert!(!expired[0]);
        }
    }

    #[test]
    fn type_table_rejects_duplicate() {
        let mut t: TypeListenerTable<u8, Cb, 2> = TypeListenerTable::new();
        t.add(1, || true).unwrap();
        assert_eq!(t.add(1, || true), Err(ListenerError::Duplicate));
    }

    #[test]
    fn generic_table_rejects_duplicate_callback() {
        fn cb() -> bool {
            true
        }
        let mut t: GenericListenerTable<Cb, 2> = GenericListenerTable::new();
        t.add(cb).unwrap();
        assert_eq!(t.add(cb), Err(ListenerError::Duplicate));
    }
}
