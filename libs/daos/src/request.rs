//! Fetch/update request descriptors.

use crate::raw::{AttributeKey, DistributionKey, Event, IoDescriptor, SgBuffer, SgList};

/// Everything one fetch or update needs: the distribution key, the attribute
/// keys with their I/O descriptors, the scatter-gather lists, and, iff the
/// request is asynchronous, the event its completion is delivered on.
///
/// The request owns its copies of the dkey and akeys so that the key memory
/// handed to the library stays valid until completion. Payload buffers are
/// borrowed caller memory held in the scatter-gather lists; the borrow
/// pins them for the request's lifetime. The descriptor and scatter-gather
/// vectors are always the same length.
pub struct FetchUpdateRequest<'a> {
    pub(crate) dkey: DistributionKey,
    pub(crate) akeys: Vec<AttributeKey>,
    pub(crate) iods: Vec<IoDescriptor>,
    pub(crate) sgls: Vec<SgList<'a>>,
    pub(crate) event: Option<Event>,
}

impl<'a> FetchUpdateRequest<'a> {
    /// Single-akey form: one descriptor whose record size is the summed
    /// length of the scatter-gather segments.
    pub fn single(
        dkey: DistributionKey,
        akey: AttributeKey,
        iovs: Vec<SgBuffer<'a>>,
        event: Option<Event>,
    ) -> Self {
        let size = iovs.iter().map(|iov| iov.len() as u64).sum();
        Self {
            dkey,
            akeys: vec![akey],
            iods: vec![IoDescriptor::single(akey, size)],
            sgls: vec![SgList::new(iovs)],
            event,
        }
    }

    /// Multi-akey form: akey `i` maps to scatter-gather list `i`, which
    /// holds a single buffer whose length is the record size of
    /// descriptor `i`. Akey order follows the iterator.
    pub fn multi(
        dkey: DistributionKey,
        items: impl IntoIterator<Item = (AttributeKey, SgBuffer<'a>)>,
        event: Option<Event>,
    ) -> Self {
        let mut akeys = Vec::new();
        let mut iods = Vec::new();
        let mut sgls = Vec::new();
        for (akey, buf) in items {
            akeys.push(akey);
            iods.push(IoDescriptor::single(akey, buf.len() as u64));
            sgls.push(SgList::new(vec![buf]));
        }
        Self {
            dkey,
            akeys,
            iods,
            sgls,
            event,
        }
    }

    pub fn is_async(&self) -> bool {
        self.event.is_some()
    }

    pub fn dkey(&self) -> DistributionKey {
        self.dkey
    }

    pub fn akeys(&self) -> &[AttributeKey] {
        &self.akeys
    }

    /// Record size the library reported (fetch) or that was submitted
    /// (update) for akey index `i`.
    pub fn record_size(&self, i: usize) -> u64 {
        self.iods[i].size
    }

    pub(crate) fn take_event(&mut self) -> Option<Event> {
        self.event.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_request_shape() {
        let data = [1u8; 10];
        let req = FetchUpdateRequest::single(7, 11, vec![SgBuffer::Update(&data)], None);
        assert_eq!(req.dkey(), 7);
        assert_eq!(req.akeys(), &[11]);
        assert_eq!(req.iods.len(), req.sgls.len());
        assert_eq!(req.record_size(0), 10);
        assert!(!req.is_async());
    }

    #[test]
    fn test_single_request_sums_iov_lengths() {
        let a = [0u8; 6];
        let b = [0u8; 4];
        let req = FetchUpdateRequest::single(
            1,
            2,
            vec![SgBuffer::Update(&a), SgBuffer::Update(&b)],
            None,
        );
        assert_eq!(req.record_size(0), 10);
        assert_eq!(req.sgls[0].iovs.len(), 2);
    }

    #[test]
    fn test_multi_request_preserves_akey_order() {
        let x = [0u8; 3];
        let y = [0u8; 5];
        let req = FetchUpdateRequest::multi(
            9,
            vec![(2, SgBuffer::Update(&x)), (1, SgBuffer::Update(&y))],
            None,
        );
        assert_eq!(req.akeys(), &[2, 1]);
        assert_eq!(req.record_size(0), 3);
        assert_eq!(req.record_size(1), 5);
        assert_eq!(req.sgls.len(), 2);
    }
}
