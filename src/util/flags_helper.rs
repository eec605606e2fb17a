macro_rules! impl_smb_byte_size_for_bitflag {(
    $($t:ty)*
) => (
    $(
        impl ::smb_core::SMBByteSize for $t {
            fn smb_byte_size(&self) -> usize {
                std::mem::size_of_val(&self.bits())
            }
        }
    )*
)}

macro_rules! impl_smb_to_bytes_for_bitflag {(
    $($t:ty)*
) => (
    $(
        impl ::smb_core::SMBToBytes for $t {
            fn smb_to_bytes(&self) -> Vec<u8> {
                self.bits().to_le_bytes().to_vec()
            }
        }
    )*
)}

pub(crate) use impl_smb_byte_size_for_bitflag;
pub(crate) use impl_smb_to_bytes_for_bitflag;
