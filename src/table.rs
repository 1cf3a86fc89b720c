use std::collections::BTreeMap;

use crate::stream::Stream;

/// Active streams indexed by id, with separate counts for locally- and
/// remotely-initiated streams. Iteration is in stream-id order, which the
/// session relies on for fair window distribution; sweeps that may remove
/// entries go through an id snapshot.
#[derive(Default)]
pub struct StreamTable {
    streams: BTreeMap<u32, Stream>,
    local_count: usize,
    remote_count: usize,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u32) -> Option<&Stream> {
        self.streams.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.streams.contains_key(&id)
    }

    pub fn add(&mut self, stream: Stream) {
        if stream.is_local() {
            self.local_count += 1;
        } else {
            self.remote_count += 1;
        }
        self.streams.insert(stream.id(), stream);
    }

    pub fn remove(&mut self, id: u32) -> Option<Stream> {
        let stream = self.streams.remove(&id)?;
        if stream.is_local() {
            self.local_count -= 1;
        } else {
            self.remote_count -= 1;
        }
        Some(stream)
    }

    pub fn local_size(&self) -> usize {
        self.local_count
    }

    pub fn remote_size(&self) -> usize {
        self.remote_count
    }

    pub fn size(&self) -> usize {
        self.streams.len()
    }

    /// Ids in ascending order, detached from the table so the caller may
    /// remove entries while walking.
    pub fn ids(&self) -> Vec<u32> {
        self.streams.keys().copied().collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&u32, &mut Stream)> {
        self.streams.iter_mut()
    }
}
