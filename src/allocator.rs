//! Growable shared-memory buffer pool
//!
//! Every window owns one `BufferPool`: a uniquely-named file under the
//! runtime directory, grown on demand and exposed to the compositor as a
//! `wl_shm_pool`. Freed buffer regions are credited back to a free tail and
//! reused on the next allocation; the backing store itself never shrinks
//! and is never returned to the OS. This avoids remapping every frame and
//! lets a resize replace the buffer without destroying the pool.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, trace};
use memmap2::{MmapMut, MmapOptions};
use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::protocol::wl_shm::{self, WlShm};
use wayland_client::protocol::wl_shm_pool::WlShmPool;
use wayland_client::{Dispatch, QueueHandle};

use crate::error::BackendError;
use crate::pixel::BYTES_PER_PIXEL;

static STORE_SEQ: AtomicU32 = AtomicU32::new(0);

/// Pure offset/size bookkeeping for a bump pool with a reclaimed tail.
///
/// Invariants: `total` is monotonically non-decreasing and `free <= total`.
/// Allocation is split into a side-effect-free [`plan`](Self::plan) and a
/// [`commit`](Self::commit) applied only once every external step (grow,
/// map, pool resize, buffer creation) has succeeded, so a failed allocation
/// commits nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolAccounting {
    total: usize,
    free: usize,
}

/// Result of planning an allocation: where the region starts and how much
/// the backing store must grow first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub offset: usize,
    pub grow: usize,
}

impl PoolAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total backing-store size in bytes.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Reclaimed-but-unshrunk bytes at the tail of the store.
    pub fn free(&self) -> usize {
        self.free
    }

    /// Plan an allocation of `size` bytes. The region starts at the used
    /// prefix; the store grows by the shortfall beyond the free tail.
    pub fn plan(&self, size: usize) -> Reservation {
        Reservation {
            offset: self.total - self.free,
            grow: size.saturating_sub(self.free),
        }
    }

    /// Record a successfully performed reservation.
    pub fn commit(&mut self, size: usize, reservation: Reservation) {
        self.total += reservation.grow;
        self.free = self.free.saturating_sub(size);
        debug_assert!(self.free <= self.total);
    }

    /// Credit a deallocated region back to the free tail.
    pub fn release(&mut self, size: usize) {
        self.free += size;
        debug_assert!(self.free <= self.total);
    }
}

/// One memory-mapped pixel buffer plus the protocol view wrapping it.
///
/// Exactly one handle is active per graphic object; a resize replaces it
/// wholesale through [`BufferPool::deallocate`] and a fresh allocation.
#[derive(Debug)]
pub struct BufferHandle {
    map: MmapMut,
    size: usize,
    wl_buffer: WlBuffer,
}

impl BufferHandle {
    pub fn wl_buffer(&self) -> &WlBuffer {
        &self.wl_buffer
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

/// Per-window growable shared-memory pool.
#[derive(Debug)]
pub struct BufferPool {
    file: File,
    path: PathBuf,
    acct: PoolAccounting,
    pool: Option<WlShmPool>,
}

impl BufferPool {
    /// Create a uniquely-named backing store under `dir`.
    ///
    /// The file is left in the filesystem namespace for the lifetime of the
    /// process; the compositor keeps its own fd once the pool is shared.
    pub fn create(dir: &Path) -> Result<Self, BackendError> {
        let mut last_err = io::Error::new(io::ErrorKind::Other, "no attempt made");
        for _ in 0..64 {
            let seq = STORE_SEQ.fetch_add(1, Ordering::Relaxed);
            let path = dir.join(format!("waybridge-shm-{}-{}", std::process::id(), seq));
            match OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => {
                    debug!("created backing store {}", path.display());
                    return Ok(Self {
                        file,
                        path,
                        acct: PoolAccounting::new(),
                        pool: None,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    last_err = e;
                }
                Err(e) => return Err(BackendError::BackingStore(e)),
            }
        }
        Err(BackendError::BackingStore(last_err))
    }

    pub fn accounting(&self) -> PoolAccounting {
        self.acct
    }

    /// Allocate a `width` x `height` buffer at the negotiated format.
    ///
    /// The requested byte size is rounded up to the page size. On any
    /// failure no partial handle exists and the accounting is untouched.
    pub fn allocate<D>(
        &mut self,
        shm: &WlShm,
        format: wl_shm::Format,
        qh: &QueueHandle<D>,
        width: u32,
        height: u32,
    ) -> Result<BufferHandle, BackendError>
    where
        D: Dispatch<WlShmPool, ()> + Dispatch<WlBuffer, ()> + 'static,
    {
        let size = page_round(width as usize * height as usize * BYTES_PER_PIXEL);
        let reservation = self.acct.plan(size);

        trace!(
            "allocating buffer {}x{} (size: {}, offset: {}, grow: {})",
            width,
            height,
            size,
            reservation.offset,
            reservation.grow
        );

        if reservation.grow > 0 {
            let new_len = (self.acct.total() + reservation.grow) as u64;
            set_len_retry(&self.file, new_len).map_err(BackendError::Allocation)?;
        }

        let mut map = unsafe {
            MmapOptions::new()
                .offset(reservation.offset as u64)
                .len(size)
                .map_mut(&self.file)
                .map_err(BackendError::Allocation)?
        };

        let pool_len = (self.acct.total() + reservation.grow) as i32;
        let pool = match self.pool.clone() {
            Some(pool) => {
                if reservation.grow > 0 {
                    pool.resize(pool_len);
                }
                pool
            }
            None => {
                let pool = shm.create_pool(self.file.as_fd(), pool_len, qh, ());
                self.pool = Some(pool.clone());
                pool
            }
        };

        let wl_buffer = pool.create_buffer(
            reservation.offset as i32,
            width as i32,
            height as i32,
            (width as usize * BYTES_PER_PIXEL) as i32,
            format,
            qh,
            (),
        );

        // The region may be a reused tail; hand it out clean.
        map.fill(0);

        self.acct.commit(size, reservation);

        Ok(BufferHandle {
            map,
            size,
            wl_buffer,
        })
    }

    /// Destroy the protocol view, unmap the region and credit its size to
    /// the free tail for reuse. Space is never returned to the OS.
    pub fn deallocate(&mut self, handle: BufferHandle) {
        handle.wl_buffer.destroy();
        let size = handle.size;
        drop(handle);
        self.acct.release(size);
    }

    /// Release the protocol pool and close the backing store fd.
    pub fn release(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.destroy();
        }
        debug!("released backing store {}", self.path.display());
    }
}

fn page_round(size: usize) -> usize {
    let page = page_size();
    (size + page - 1) / page * page
}

fn page_size() -> usize {
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 {
        sz as usize
    } else {
        4096
    }
}

/// `ftruncate` can be interrupted by a signal mid-grow; retry until it
/// settles one way or the other.
fn set_len_retry(file: &File, len: u64) -> io::Result<()> {
    loop {
        match file.set_len(len) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plan_reuses_free_tail() {
        let mut acct = PoolAccounting::new();
        let r = acct.plan(4096);
        assert_eq!(r, Reservation { offset: 0, grow: 4096 });
        acct.commit(4096, r);
        assert_eq!(acct.total(), 4096);
        assert_eq!(acct.free(), 0);

        acct.release(4096);
        assert_eq!(acct.free(), 4096);

        // A smaller allocation fits entirely in the reclaimed tail.
        let r = acct.plan(1024);
        assert_eq!(r, Reservation { offset: 0, grow: 0 });
        acct.commit(1024, r);
        assert_eq!(acct.total(), 4096);
        assert_eq!(acct.free(), 3072);
    }

    #[test]
    fn grow_covers_only_the_shortfall() {
        let mut acct = PoolAccounting::new();
        let r = acct.plan(8192);
        acct.commit(8192, r);
        acct.release(8192);

        let r = acct.plan(12288);
        assert_eq!(r.grow, 4096);
        acct.commit(12288, r);
        assert_eq!(acct.total(), 12288);
        assert_eq!(acct.free(), 0);
    }

    #[test]
    fn failed_allocation_commits_nothing() {
        let acct = PoolAccounting::new();
        let before = acct;
        let _ = acct.plan(4096);
        assert_eq!(acct, before);
    }

    #[test]
    fn page_round_is_a_multiple_of_the_page() {
        let page = page_size();
        assert_eq!(page_round(1), page);
        assert_eq!(page_round(page), page);
        assert_eq!(page_round(page + 1), 2 * page);
    }

    #[test]
    fn backing_store_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = BufferPool::create(dir.path()).unwrap();
        let b = BufferPool::create(dir.path()).unwrap();
        assert_ne!(a.path, b.path);
        assert!(a.path.exists());
        assert!(b.path.exists());
    }

    proptest! {
        /// Backing-store size never decreases over any allocate/deallocate
        /// sequence, and the free tail never outgrows the store.
        #[test]
        fn total_is_monotonic(ops in proptest::collection::vec(0usize..4, 0..64)) {
            let mut acct = PoolAccounting::new();
            let mut live: Vec<usize> = Vec::new();
            let mut prev_total = 0usize;

            for op in ops {
                if op == 0 && !live.is_empty() {
                    let size = live.pop().unwrap();
                    acct.release(size);
                } else {
                    let size = 4096 * (op + 1);
                    let r = acct.plan(size);
                    acct.commit(size, r);
                    live.push(size);
                }
                prop_assert!(acct.total() >= prev_total);
                prop_assert!(acct.free() <= acct.total());
                prev_total = acct.total();
            }
        }
    }
}
