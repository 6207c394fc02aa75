use std::marker::PhantomData;

/// Slot index + generation pair behind every resource handle.
///
/// The generation is bumped whenever a slot is freed, so a handle kept past
/// its `destroy_*` call no longer resolves even after the slot is reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RawId {
    index: u32,
    generation: u32,
}

impl RawId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Typed resource handle.
pub trait Handle: Copy {
    fn from_raw(raw: RawId) -> Self;
    fn raw(self) -> RawId;
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(RawId);

        impl Handle for $name {
            #[inline]
            fn from_raw(raw: RawId) -> Self {
                Self(raw)
            }

            #[inline]
            fn raw(self) -> RawId {
                self.0
            }
        }
    };
}

define_handle!(
    /// Compiled shader stage.
    ShaderHandle
);
define_handle!(
    /// Linked vertex + fragment program.
    ProgramHandle
);
define_handle!(VertexBufferHandle);
define_handle!(IndexBufferHandle);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational slot pool keyed by a typed handle.
pub(crate) struct Pool<H, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    _handle: PhantomData<H>,
}

impl<H: Handle, T> Default for Pool<H, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            _handle: PhantomData,
        }
    }
}

impl<H: Handle, T> Pool<H, T> {
    pub(crate) fn insert(&mut self, value: T) -> H {
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return H::from_raw(RawId {
                index,
                generation: slot.generation,
            });
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        H::from_raw(RawId {
            index,
            generation: 0,
        })
    }

    pub(crate) fn get(&self, handle: H) -> Option<&T> {
        let raw = handle.raw();
        self.slots
            .get(raw.index as usize)
            .filter(|slot| slot.generation == raw.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }

    pub(crate) fn remove(&mut self, handle: H) -> Option<T> {
        let raw = handle.raw();
        let slot = self.slots.get_mut(raw.index as usize)?;
        if slot.generation != raw.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(raw.index);
        self.live -= 1;
        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Removes every live value, in slot order.
    pub(crate) fn drain(&mut self) -> Vec<(H, T)> {
        let mut out = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                out.push((
                    H::from_raw(RawId {
                        index: index as u32,
                        generation: slot.generation,
                    }),
                    value,
                ));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.live = 0;
        out
    }
}
