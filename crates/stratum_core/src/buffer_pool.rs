use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

/// Scratch storage that can be emptied and handed to the next user.
pub trait Recycle {
    fn recycle(&mut self);
}

impl<T> Recycle for Vec<T> {
    fn recycle(&mut self) {
        self.clear();
    }
}

/// Bounded pool of reusable buffers.
///
/// [`BufferPool::acquire`] blocks the calling thread until a buffer is free. Dropping the
/// returned guard recycles the buffer, puts it back and wakes one waiter.
pub struct BufferPool<T> {
    free: Mutex<Vec<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T: Recycle> BufferPool<T> {
    pub fn new(capacity: usize, mut make: impl FnMut() -> T) -> Self {
        assert!(capacity > 0, "buffer pool needs at least one buffer");
        let free = (0..capacity).map(|_| make()).collect();
        Self {
            free: Mutex::new(free),
            available: Condvar::new(),
            capacity,
        }
    }

    pub fn acquire(&self) -> PooledBuffer<'_, T> {
        let mut free = self.free.lock().expect("buffer pool mutex poisoned");
        loop {
            if let Some(item) = free.pop() {
                return PooledBuffer {
                    pool: self,
                    item: Some(item),
                };
            }
            free = self
                .available
                .wait(free)
                .expect("buffer pool mutex poisoned");
        }
    }

    pub fn available(&self) -> usize {
        self.free.lock().expect("buffer pool mutex poisoned").len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self, mut item: T) {
        item.recycle();
        self.free
            .lock()
            .expect("buffer pool mutex poisoned")
            .push(item);
        self.available.notify_one();
    }
}

pub struct PooledBuffer<'a, T: Recycle> {
    pool: &'a BufferPool<T>,
    item: Option<T>,
}

impl<T: Recycle> Deref for PooledBuffer<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled buffer already released")
    }
}

impl<T: Recycle> DerefMut for PooledBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled buffer already released")
    }
}

impl<T: Recycle> Drop for PooledBuffer<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::BufferPool;

    #[test]
    fn released_buffers_come_back_cleared() {
        let pool: BufferPool<Vec<u32>> = BufferPool::new(1, || Vec::with_capacity(64));

        {
            let mut buffer = pool.acquire();
            buffer.extend_from_slice(&[1, 2, 3]);
            assert_eq!(pool.available(), 0);
        }

        assert_eq!(pool.available(), 1);
        let buffer = pool.acquire();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 64);
    }

    #[test]
    fn acquire_blocks_until_another_thread_releases() {
        let pool: BufferPool<Vec<u8>> = BufferPool::new(1, Vec::new);
        let acquired_second = AtomicBool::new(false);

        thread::scope(|scope| {
            let held = pool.acquire();

            scope.spawn(|| {
                let _buffer = pool.acquire();
                acquired_second.store(true, Ordering::SeqCst);
            });

            thread::sleep(Duration::from_millis(50));
            assert!(!acquired_second.load(Ordering::SeqCst));
            drop(held);
        });

        assert!(acquired_second.load(Ordering::SeqCst));
        assert_eq!(pool.available(), pool.capacity());
    }
}
