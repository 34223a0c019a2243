//! Bounds-checked access to the guest's exported linear memory.
//!
//! All guest pointers are offsets into one linear memory, little-endian, and
//! are validated before any byte is touched. Range arithmetic is done in
//! `u64` so `ptr + len` can never wrap around `u32`.

use std::ops::Range;

use crate::error::BridgeError;

pub struct GuestMemory<'a> {
    data: &'a mut [u8],
}

impl<'a> GuestMemory<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        GuestMemory { data }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn checked_range(&self, ptr: u32, len: u32) -> Result<Range<usize>, BridgeError> {
        let start = ptr as u64;
        let end = start + len as u64;
        if end > self.data.len() as u64 {
            return Err(BridgeError::OutOfBounds {
                ptr,
                len,
                memory_size: self.data.len(),
            });
        }
        Ok(start as usize..end as usize)
    }

    pub fn read_bytes(&self, ptr: u32, len: u32) -> Result<&[u8], BridgeError> {
        let range = self.checked_range(ptr, len)?;
        Ok(&self.data[range])
    }

    pub fn write_bytes(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), BridgeError> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| BridgeError::InvalidDescriptor("byte range does not fit in u32"))?;
        let range = self.checked_range(ptr, len)?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_u32(&self, ptr: u32) -> Result<u32, BridgeError> {
        let bytes = self.read_bytes(ptr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&self, ptr: u32) -> Result<u64, BridgeError> {
        let bytes = self.read_bytes(ptr, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_f32(&self, ptr: u32) -> Result<f32, BridgeError> {
        Ok(f32::from_bits(self.read_u32(ptr)?))
    }

    pub fn read_f64(&self, ptr: u32) -> Result<f64, BridgeError> {
        Ok(f64::from_bits(self.read_u64(ptr)?))
    }

    pub fn write_u32(&mut self, ptr: u32, value: u32) -> Result<(), BridgeError> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    pub fn write_u64(&mut self, ptr: u32, value: u64) -> Result<(), BridgeError> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    /// Reads a (ptr, count) array of `u32` values.
    pub fn read_u32_array(&self, ptr: u32, count: u32) -> Result<Vec<u32>, BridgeError> {
        let len = count
            .checked_mul(4)
            .ok_or(BridgeError::InvalidDescriptor("u32 array length overflows"))?;
        let bytes = self.read_bytes(ptr, len)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Reads a (ptr, len) UTF-8 string.
    pub fn read_str(&self, ptr: u32, len: u32) -> Result<&str, BridgeError> {
        let bytes = self.read_bytes(ptr, len)?;
        std::str::from_utf8(bytes)
            .map_err(|_| BridgeError::InvalidDescriptor("string is not valid UTF-8"))
    }

    /// Reads an optional label. A (0, 0) pair means "no label".
    pub fn read_label(&self, ptr: u32, len: u32) -> Result<Option<String>, BridgeError> {
        if ptr == 0 && len == 0 {
            return Ok(None);
        }
        Ok(Some(self.read_str(ptr, len)?.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_bounds() {
        let mut data = vec![0u8; 16];
        data[4..8].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        data[8..16].copy_from_slice(&0x0123_4567_89ab_cdefu64.to_le_bytes());
        let mem = GuestMemory::new(&mut data);
        assert_eq!(mem.read_u32(4).unwrap(), 0xdead_beef);
        assert_eq!(mem.read_u64(8).unwrap(), 0x0123_4567_89ab_cdef);
    }

    #[test]
    fn rejects_reads_past_the_end() {
        let mut data = vec![0u8; 16];
        let mem = GuestMemory::new(&mut data);
        assert!(mem.read_bytes(0, 16).is_ok());
        assert!(matches!(
            mem.read_bytes(0, 17),
            Err(BridgeError::OutOfBounds { .. })
        ));
        assert!(matches!(
            mem.read_u32(13),
            Err(BridgeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn empty_range_at_the_end_is_fine() {
        let mut data = vec![0u8; 16];
        let mem = GuestMemory::new(&mut data);
        assert_eq!(mem.read_bytes(16, 0).unwrap(), &[] as &[u8]);
        assert!(matches!(
            mem.read_bytes(17, 0),
            Err(BridgeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn pointer_arithmetic_does_not_wrap() {
        let mut data = vec![0u8; 16];
        let mem = GuestMemory::new(&mut data);
        // u32::MAX + 8 would wrap to 7 in 32-bit arithmetic.
        assert!(matches!(
            mem.read_bytes(u32::MAX, 8),
            Err(BridgeError::OutOfBounds { .. })
        ));
        assert!(matches!(
            mem.read_u64(u32::MAX - 3),
            Err(BridgeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn writes_are_bounds_checked_too() {
        let mut data = vec![0u8; 8];
        let mut mem = GuestMemory::new(&mut data);
        mem.write_u32(0, 7).unwrap();
        assert!(matches!(
            mem.write_u64(4, 7),
            Err(BridgeError::OutOfBounds { .. })
        ));
        assert_eq!(mem.read_u32(0).unwrap(), 7);
    }

    #[test]
    fn label_conventions() {
        let mut data = vec![0u8; 8];
        data[..5].copy_from_slice(b"hello");
        let mem = GuestMemory::new(&mut data);
        assert_eq!(mem.read_label(0, 0).unwrap(), None);
        assert_eq!(mem.read_label(0, 5).unwrap().as_deref(), Some("hello"));
        assert!(mem.read_label(0, 9).is_err());
    }

    #[test]
    fn u32_array_length_overflow_is_caught() {
        let mut data = vec![0u8; 8];
        let mem = GuestMemory::new(&mut data);
        assert!(matches!(
            mem.read_u32_array(0, u32::MAX),
            Err(BridgeError::InvalidDescriptor(_))
        ));
        assert_eq!(mem.read_u32_array(0, 2).unwrap(), vec![0, 0]);
    }
}
