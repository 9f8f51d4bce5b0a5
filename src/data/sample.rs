/// Numeric sample type carried in time/frequency blocks
///
/// Dedispersion always accumulates in `f32`; this trait covers the
/// conversion and the little-endian decoding used by file sources.
pub trait Sample: Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + 'static {
    /// Size of one encoded sample in bytes
    const BYTES: usize;

    fn to_f32(self) -> f32;

    /// Decode from exactly `Self::BYTES` little-endian bytes
    fn from_le_slice(bytes: &[u8]) -> Self;
}

impl Sample for u8 {
    const BYTES: usize = 1;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Sample for u16 {
    const BYTES: usize = 2;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_le_slice(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl Sample for f32 {
    const BYTES: usize = 4;

    fn to_f32(self) -> f32 {
        self
    }

    fn from_le_slice(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}
