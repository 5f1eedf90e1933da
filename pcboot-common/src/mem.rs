/// Destination for data copied to fixed physical addresses.
pub trait PhysicalMemory {
    /// Copy `bytes` to the physical range starting at `address`.
    fn write(&mut self, address: u64, bytes: &[u8]);
}

impl<T: PhysicalMemory + ?Sized> PhysicalMemory for &mut T {
    fn write(&mut self, address: u64, bytes: &[u8]) {
        (**self).write(address, bytes)
    }
}

/// Physical memory reached through an identity mapping.
///
/// This is the situation of the loader before paging is enabled: a
/// physical address is dereferenced as-is.
pub struct IdentityMappedMemory {
    _private: (),
}

impl IdentityMappedMemory {
    /// # Safety
    ///
    /// Every address later passed to [`PhysicalMemory::write`] must be
    /// identity mapped, writable, and not overlap memory the caller still
    /// uses (the loader image, its stack, or live buffers).
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PhysicalMemory for IdentityMappedMemory {
    fn write(&mut self, address: u64, bytes: &[u8]) {
        // Safety: upheld by the contract of `IdentityMappedMemory::new`.
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), address as usize as *mut u8, bytes.len());
        }
    }
}
