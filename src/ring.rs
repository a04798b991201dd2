use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;

pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: usize = 2;
pub const BYTES_PER_FRAME: usize = CHANNELS * std::mem::size_of::<f32>();
pub const RING_SECONDS: usize = 4;
pub const PERIOD_FRAMES: usize = 2048;

fn ring_capacity_bytes() -> usize {
    RING_SECONDS * OUTPUT_SAMPLE_RATE as usize * BYTES_PER_FRAME
}

/// Splits a page-locked byte ring into its producer (decode worker) and
/// consumer (output callback) halves. Single producer, single consumer.
pub fn new_ring() -> (RingProducer, RingConsumer) {
    let capacity = ring_capacity_bytes();
    lock_process_pages();
    let rb: HeapRb<u8> = HeapRb::new(capacity);
    let (producer, consumer) = rb.split();
    (RingProducer { inner: producer }, RingConsumer { inner: consumer })
}

/// Page-locks the process's current and future memory so the ring's backing
/// allocation (made just after this call) can never be paged out under the
/// real-time output callback. `ringbuf`'s heap storage doesn't expose a raw
/// pointer to `mlock` individually, so the coarser `mlockall` is used
/// instead; this is the same trade other audio daemons in this codebase's
/// lineage make. Failure is logged once and never aborts startup.
#[cfg(unix)]
fn lock_process_pages() {
    let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        log::warn!("mlockall failed, audio ring pages may be swapped out: {err}");
    }
}

#[cfg(not(unix))]
fn lock_process_pages() {}

pub struct RingProducer {
    inner: ringbuf::HeapProd<u8>,
}

impl RingProducer {
    pub fn free_bytes(&self) -> usize {
        self.inner.vacant_len()
    }

    /// Writes `data`, returning the number of bytes actually written (never
    /// more than `free_bytes()` at call time).
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.inner.push_slice(data)
    }
}

pub struct RingConsumer {
    inner: ringbuf::HeapCons<u8>,
}

impl RingConsumer {
    pub fn available_bytes(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Reads up to `out.len()` bytes, returning the count actually read.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        self.inner.pop_slice(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bytes_through_the_ring() {
        let (mut producer, mut consumer) = new_ring();
        let data = [1u8, 2, 3, 4, 5];
        assert_eq!(producer.write(&data), 5);
        assert_eq!(consumer.available_bytes(), 5);
        let mut out = [0u8; 5];
        assert_eq!(consumer.read(&mut out), 5);
        assert_eq!(out, data);
    }

    #[test]
    fn write_short_when_ring_is_full() {
        let (mut producer, _consumer) = new_ring();
        let capacity = ring_capacity_bytes();
        let data = vec![7u8; capacity + 10];
        let written = producer.write(&data);
        assert_eq!(written, capacity);
    }
}
