use std::sync::Mutex;

pub const MAX_POOLED_BUFFERS: usize = 256;

struct PoolInner {
    chunk_bytes: usize,
    free: Vec<Vec<u8>>,
}

/// Reusable fixed-size PCM buffers shared by the capture and worker threads.
///
/// All access goes through one mutex. Changing the chunk size discards every
/// idle buffer, and buffers of any other size are refused on return, so
/// [`rent`](Self::rent) always hands out exactly `chunk_bytes()` bytes.
pub struct BufferPool {
    inner: Mutex<PoolInner>,
}

impl BufferPool {
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                chunk_bytes,
                free: Vec::new(),
            }),
        }
    }

    pub fn chunk_bytes(&self) -> usize {
        self.inner.lock().map(|p| p.chunk_bytes).unwrap_or(0)
    }

    pub fn reconfigure(&self, chunk_bytes: usize) {
        if let Ok(mut pool) = self.inner.lock() {
            pool.chunk_bytes = chunk_bytes;
            pool.free.clear();
        }
    }

    pub fn rent(&self) -> Vec<u8> {
        let size = match self.inner.lock() {
            Ok(mut pool) => {
                let size = pool.chunk_bytes.max(2);
                while let Some(buf) = pool.free.pop() {
                    if buf.len() == size {
                        return buf;
                    }
                }
                size
            }
            Err(_) => 2,
        };
        vec![0u8; size]
    }

    pub fn give_back(&self, buf: Vec<u8>) -> bool {
        let Ok(mut pool) = self.inner.lock() else {
            return false;
        };
        if pool.chunk_bytes > 0 && buf.len() != pool.chunk_bytes {
            return false;
        }
        if pool.free.len() >= MAX_POOLED_BUFFERS {
            return false;
        }
        pool.free.push(buf);
        true
    }

    pub fn idle(&self) -> usize {
        self.inner.lock().map(|p| p.free.len()).unwrap_or(0)
    }
}
