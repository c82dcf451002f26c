pub use bytes::buf::UninitSlice;
pub use bytes::{Buf, BufMut};

use crate::SESSION_BUFFER_BYTE;

use core::borrow::{Borrow, BorrowMut};

const KB: usize = 1024;
const MB: usize = 1024 * KB;

/// A simple growable byte buffer, represented as a contiguous range of bytes
/// with an independent read cursor.
pub struct Buffer {
    data: Box<[u8]>,
    read_offset: usize,
    write_offset: usize,
    target_size: usize,
}

impl Buffer {
    /// Create a new buffer that can hold up to `target_size` bytes without
    /// resizing. The buffer may grow beyond the `target_size`, but will
    /// shrink back down to the `target_size` when possible.
    pub fn new(target_size: usize) -> Self {
        let target_size = std::cmp::max(1, target_size).next_power_of_two();

        SESSION_BUFFER_BYTE.add(target_size as _);

        Self {
            data: vec![0; target_size].into_boxed_slice(),
            read_offset: 0,
            write_offset: 0,
            target_size,
        }
    }

    /// Returns the current capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the target capacity of the buffer.
    pub fn target_capacity(&self) -> usize {
        self.target_size
    }

    fn resize(&mut self, size: usize) {
        let mut data = vec![0; size].into_boxed_slice();
        let len = self.write_offset - self.read_offset;
        data[0..len].copy_from_slice(&self.data[self.read_offset..self.write_offset]);
        self.read_offset = 0;
        self.write_offset = len;

        if size > self.data.len() {
            SESSION_BUFFER_BYTE.add((size - self.data.len()) as _);
        } else {
            SESSION_BUFFER_BYTE.sub((self.data.len() - size) as _);
        }

        self.data = data;
    }

    /// Reserve space for `amt` additional bytes.
    pub fn reserve(&mut self, amt: usize) {
        // if the buffer is empty, reset the offsets
        if self.remaining() == 0 {
            self.read_offset = 0;
            self.write_offset = 0;
        }

        if amt <= self.remaining_mut() {
            return;
        }

        // grow the buffer, uses power of two sizes up to a whole megabyte and
        // whole megabytes beyond that
        let size = self.write_offset + amt;
        let pow = size.next_power_of_two();
        let size = if size > MB || pow > MB {
            (size / MB + 1) * MB
        } else {
            pow
        };

        self.resize(size);
    }

    /// Clear the buffer and, if it is oversized, shrink it back down to the
    /// target size.
    pub fn clear(&mut self) {
        self.read_offset = 0;
        self.write_offset = 0;

        if self.data.len() > self.target_size {
            SESSION_BUFFER_BYTE.sub((self.data.len() - self.target_size) as _);
            self.data = vec![0; self.target_size].into_boxed_slice();
        }
    }

    /// Compact the buffer by moving contents to the beginning and freeing any
    /// excess space. As an optimization, this will not always compact the
    /// buffer all the way back down to its target size.
    pub fn compact(&mut self) {
        // if the buffer is empty, we clear the buffer and return
        if self.remaining() == 0 {
            self.clear();
            return;
        }

        // if it is not oversized, we don't compact
        if self.data.len() == self.target_size {
            return;
        }

        let fit = if self.remaining() > MB {
            (1 + (self.remaining() / MB)) * MB
        } else {
            std::cmp::max(
                self.target_size,
                self.remaining().next_power_of_two(),
            )
        };

        if fit < self.data.len() {
            self.resize(fit);
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        SESSION_BUFFER_BYTE.sub(self.data.len() as _);
    }
}

impl Borrow<[u8]> for Buffer {
    fn borrow(&self) -> &[u8] {
        &self.data[self.read_offset..self.write_offset]
    }
}

impl BorrowMut<[u8]> for Buffer {
    fn borrow_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.write_offset..]
    }
}

impl Buf for Buffer {
    fn remaining(&self) -> usize {
        self.write_offset - self.read_offset
    }

    fn chunk(&self) -> &[u8] {
        self.borrow()
    }

    fn advance(&mut self, amt: usize) {
        self.read_offset = std::cmp::min(self.read_offset + amt, self.write_offset);
        self.compact();
    }
}

unsafe impl BufMut for Buffer {
    fn remaining_mut(&self) -> usize {
        self.data.len() - self.write_offset
    }

    unsafe fn advance_mut(&mut self, amt: usize) {
        self.write_offset = std::cmp::min(self.write_offset + amt, self.data.len());
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        UninitSlice::new(&mut self.data[self.write_offset..])
    }

    fn put<T: Buf>(&mut self, mut src: T)
    where
        Self: Sized,
    {
        while src.has_remaining() {
            let chunk = src.chunk();
            let len = chunk.len();
            self.put_slice(chunk);
            src.advance(len);
        }
    }

    fn put_slice(&mut self, src: &[u8]) {
        self.reserve(src.len());
        self.data[self.write_offset..self.write_offset + src.len()].copy_from_slice(src);
        self.write_offset += src.len();
    }
}
