//! Render command batching
//!
//! A batch is a contiguous run of instances in the transform stream drawn with
//! one descriptor bind and one instanced draw. Batches are built in submission
//! order and merge only with the batch directly before them.
//!
//! Instances are added through a [`BatchHandle`], so the link between a batch
//! and the transforms it covers is checked instead of relying on call order.

use super::transform_stream::{InstanceTransform, TransformStream};
use crate::render::error::{RenderError, RenderResult};

/// One instanced draw: `instance_count` transforms starting at `base_offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderBatch<D> {
    /// Descriptor set bound for the draw
    pub descriptor: D,
    /// Number of instances drawn
    pub instance_count: u32,
    /// Index of the first transform in the stream
    pub base_offset: u32,
}

/// Ticket for pushing instances into one batch of the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchHandle {
    index: usize,
    serial: u64,
}

impl BatchHandle {
    /// Position of the batch in draw order
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Ordered list of batches for one frame
#[derive(Debug)]
pub struct BatchList<D> {
    batches: Vec<RenderBatch<D>>,
    // Serial of the open batch; bumped whenever a batch is opened or the list is
    // reset, and never reused.
    open_serial: u64,
    next_serial: u64,
}

impl<D> Default for BatchList<D> {
    fn default() -> Self {
        Self {
            batches: Vec::new(),
            open_serial: 0,
            next_serial: 1,
        }
    }
}

impl<D: Copy + PartialEq> BatchList<D> {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a batch for `descriptor`, or keep extending the last one if it
    /// uses the same descriptor.
    ///
    /// A new batch starts at the current length of `stream`. An empty trailing
    /// batch is replaced rather than left behind.
    pub fn begin_batch(&mut self, descriptor: D, stream: &TransformStream) -> BatchHandle {
        if let Some(last) = self.batches.last_mut() {
            if last.descriptor == descriptor {
                return BatchHandle {
                    index: self.batches.len() - 1,
                    serial: self.open_serial,
                };
            }

            if last.instance_count == 0 {
                self.batches.pop();
            }
        }

        self.batches.push(RenderBatch {
            descriptor,
            instance_count: 0,
            base_offset: stream.len(),
        });
        self.open_serial = self.next_serial;
        self.next_serial += 1;

        BatchHandle {
            index: self.batches.len() - 1,
            serial: self.open_serial,
        }
    }

    /// Push `transform` into `stream` as the next instance of the batch behind `handle`.
    ///
    /// Fails if the handle belongs to an earlier frame or a batch that has
    /// since been closed, or if something else was pushed to the stream since
    /// the batch's last instance.
    pub fn push_instance(
        &mut self,
        handle: BatchHandle,
        stream: &mut TransformStream,
        transform: InstanceTransform,
    ) -> RenderResult<u32> {
        let open = self.batches.len().checked_sub(1).ok_or(RenderError::StaleBatchHandle)?;

        if handle.index != open {
            return Err(if handle.index < open {
                RenderError::BatchInterleaved {
                    handle: handle.index,
                    open,
                }
            } else {
                RenderError::StaleBatchHandle
            });
        }

        if handle.serial != self.open_serial {
            return Err(RenderError::StaleBatchHandle);
        }

        let batch = &mut self.batches[open];
        if batch.base_offset + batch.instance_count != stream.len() {
            return Err(RenderError::BatchInterleaved { handle: open, open });
        }

        let index = stream.push(transform)?;
        batch.instance_count += 1;
        Ok(index)
    }

    /// Batches in draw order
    pub fn batches(&self) -> &[RenderBatch<D>] {
        &self.batches
    }

    /// Number of batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether no batch was opened this frame
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Sum of instance counts over all batches
    pub fn total_instances(&self) -> u32 {
        self.batches.iter().map(|batch| batch.instance_count).sum()
    }

    /// Drop every batch and invalidate all outstanding handles
    pub fn reset(&mut self) {
        self.batches.clear();
        self.open_serial = self.next_serial;
        self.next_serial += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec2;
    use crate::render::assets::SpriteSheet;

    const SHEET: SpriteSheet = SpriteSheet::single(50, 50);

    fn transform() -> InstanceTransform {
        InstanceTransform::from_sheet(0, &SHEET, Vec2::zeros(), 0)
    }

    fn add(batches: &mut BatchList<u32>, stream: &mut TransformStream, descriptor: u32) {
        let handle = batches.begin_batch(descriptor, stream);
        batches.push_instance(handle, stream, transform()).unwrap();
    }

    #[test]
    fn test_same_descriptor_merges() {
        let mut stream = TransformStream::new(16);
        let mut batches = BatchList::new();

        add(&mut batches, &mut stream, 7);
        add(&mut batches, &mut stream, 7);

        assert_eq!(
            batches.batches(),
            &[RenderBatch {
                descriptor: 7,
                instance_count: 2,
                base_offset: 0
            }]
        );
    }

    #[test]
    fn test_different_descriptors_split() {
        let mut stream = TransformStream::new(16);
        let mut batches = BatchList::new();

        add(&mut batches, &mut stream, 1);
        add(&mut batches, &mut stream, 2);

        assert_eq!(batches.len(), 2);
        assert!(batches.batches().iter().all(|batch| batch.instance_count == 1));
        assert_eq!(batches.batches()[1].base_offset, 1);
    }

    #[test]
    fn test_merging_is_order_sensitive() {
        let mut stream = TransformStream::new(16);
        let mut batches = BatchList::new();

        for descriptor in [1, 1, 2, 1] {
            add(&mut batches, &mut stream, descriptor);
        }

        let counts: Vec<_> = batches
            .batches()
            .iter()
            .map(|batch| (batch.descriptor, batch.instance_count, batch.base_offset))
            .collect();
        assert_eq!(counts, vec![(1, 2, 0), (2, 1, 2), (1, 1, 3)]);
        assert_eq!(batches.total_instances(), stream.len());
    }

    #[test]
    fn test_base_offset_follows_stream_length() {
        let mut stream = TransformStream::new(16);
        stream.push(transform()).unwrap();
        stream.push(transform()).unwrap();

        let mut batches = BatchList::new();
        let handle = batches.begin_batch(9u32, &stream);
        assert_eq!(batches.push_instance(handle, &mut stream, transform()).unwrap(), 2);
        assert_eq!(batches.batches()[0].base_offset, 2);
    }

    #[test]
    fn test_pushing_to_closed_batch_is_rejected() {
        let mut stream = TransformStream::new(16);
        let mut batches = BatchList::new();

        let first = batches.begin_batch(1u32, &stream);
        batches.push_instance(first, &mut stream, transform()).unwrap();
        let second = batches.begin_batch(2, &stream);
        batches.push_instance(second, &mut stream, transform()).unwrap();

        assert!(matches!(
            batches.push_instance(first, &mut stream, transform()),
            Err(RenderError::BatchInterleaved { handle: 0, open: 1 })
        ));
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_foreign_stream_push_is_rejected() {
        let mut stream = TransformStream::new(16);
        let mut batches = BatchList::new();

        let handle = batches.begin_batch(1u32, &stream);
        batches.push_instance(handle, &mut stream, transform()).unwrap();
        stream.push(transform()).unwrap();

        assert!(matches!(
            batches.push_instance(handle, &mut stream, transform()),
            Err(RenderError::BatchInterleaved { .. })
        ));
    }

    #[test]
    fn test_handle_from_previous_frame_is_stale() {
        let mut stream = TransformStream::new(16);
        let mut batches = BatchList::new();

        let old = batches.begin_batch(1u32, &stream);
        batches.push_instance(old, &mut stream, transform()).unwrap();
        stream.flush(&mut Vec::new()).unwrap();
        batches.reset();

        let fresh = batches.begin_batch(1, &stream);
        assert_eq!(fresh.index(), old.index());
        assert!(matches!(
            batches.push_instance(old, &mut stream, transform()),
            Err(RenderError::StaleBatchHandle)
        ));
        assert!(batches.push_instance(fresh, &mut stream, transform()).is_ok());
    }

    #[test]
    fn test_empty_batch_is_replaced() {
        let stream = TransformStream::new(16);
        let mut batches = BatchList::new();

        let unused = batches.begin_batch(1u32, &stream);
        let used = batches.begin_batch(2, &stream);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches.batches()[0].descriptor, 2);
        assert_eq!(unused.index(), used.index());
    }

    #[test]
    fn test_replaced_batch_handle_is_stale() {
        let mut stream = TransformStream::new(16);
        let mut batches = BatchList::new();

        let unused = batches.begin_batch(1u32, &stream);
        batches.begin_batch(2, &stream);

        assert!(matches!(
            batches.push_instance(unused, &mut stream, transform()),
            Err(RenderError::StaleBatchHandle)
        ));
    }

    #[test]
    fn test_full_stream_leaves_batch_unchanged() {
        let mut stream = TransformStream::new(1);
        let mut batches = BatchList::new();

        let handle = batches.begin_batch(1u32, &stream);
        batches.push_instance(handle, &mut stream, transform()).unwrap();

        assert!(matches!(
            batches.push_instance(handle, &mut stream, transform()),
            Err(RenderError::CapacityExceeded { .. })
        ));
        assert_eq!(batches.batches()[0].instance_count, 1);
    }
}
