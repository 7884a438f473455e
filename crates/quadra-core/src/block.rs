//! Multi-channel audio block buffers
//!
//! The host hands each plugin one shared buffer per block: channel `i` is
//! both input channel `i` and output channel `i`, so engines that route
//! between channels must stage through scratch storage rather than write in
//! place. All storage is sized in `prepare`; nothing allocates per block.

/// Audio sample type used throughout quadra.
pub type Sample = f32;

/// A preallocated `channels x frames` buffer.
#[derive(Debug, Clone)]
pub struct BlockBuffer {
    channels: Vec<Vec<Sample>>,
    capacity: usize,
}

impl BlockBuffer {
    pub fn new(num_channels: usize) -> Self {
        Self {
            channels: vec![Vec::new(); num_channels],
            capacity: 0,
        }
    }

    /// Size every channel for the largest block the host will deliver.
    pub fn prepare(&mut self, max_frames: usize) {
        for ch in &mut self.channels {
            ch.clear();
            ch.resize(max_frames, 0.0);
        }
        self.capacity = max_frames;
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.channels[index]
    }

    /// Zero the first `frames` samples of every channel.
    pub fn clear(&mut self, frames: usize) {
        for ch in &mut self.channels {
            let n = frames.min(ch.len());
            for s in &mut ch[..n] {
                *s = 0.0;
            }
        }
    }

    /// Zero the first `frames` samples of one channel.
    pub fn clear_channel(&mut self, index: usize, frames: usize) {
        let ch = &mut self.channels[index];
        let n = frames.min(ch.len());
        for s in &mut ch[..n] {
            *s = 0.0;
        }
    }

    /// Copy `frames` samples out of a channel into caller-owned scratch.
    pub fn read_channel(&self, index: usize, dst: &mut [Sample], frames: usize) {
        dst[..frames].copy_from_slice(&self.channels[index][..frames]);
    }

    /// Copy `frames` samples from caller-owned scratch into a channel.
    pub fn write_channel(&mut self, index: usize, src: &[Sample], frames: usize) {
        self.channels[index][..frames].copy_from_slice(&src[..frames]);
    }
}
