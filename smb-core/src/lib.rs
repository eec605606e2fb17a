use error::SMBError;

pub mod error;
pub mod logging;
pub mod nt_status;

pub type SMBResult<T> = Result<T, SMBError>;

pub trait SMBByteSize {
    fn smb_byte_size(&self) -> usize;
}

pub trait SMBToBytes: SMBByteSize {
    fn smb_to_bytes(&self) -> Vec<u8>;
}

impl<T: SMBByteSize> SMBByteSize for Vec<T> {
    fn smb_byte_size(&self) -> usize {
        self.iter().fold(0, |prev, x| prev + x.smb_byte_size())
    }
}

impl<T: SMBToBytes> SMBToBytes for Vec<T> {
    fn smb_to_bytes(&self) -> Vec<u8> {
        self.iter().flat_map(|x| x.smb_to_bytes()).collect()
    }
}

macro_rules! impl_smb_byte_size_for_slice {(
    $($N:literal)*
) => (
    $(
        impl SMBByteSize for [u8; $N] {
            fn smb_byte_size(&self) -> usize {
                $N
            }
        }

        impl SMBToBytes for [u8; $N] {
            fn smb_to_bytes(&self) -> Vec<u8> {
                self.to_vec()
            }
        }
    )*
)}

macro_rules! impl_smb_byte_size_unsigned_type {(
    $($t:ty)*
) => (
    $(
        impl SMBByteSize for $t {
            fn smb_byte_size(&self) -> usize {
                std::mem::size_of_val(self)
            }
        }

        impl SMBToBytes for $t {
            fn smb_to_bytes(&self) -> Vec<u8> {
                self.to_le_bytes().to_vec()
            }
        }
    )*
)}

impl_smb_byte_size_for_slice! {
    1 2 4 8 16
}

impl_smb_byte_size_unsigned_type! {
    u8 u16 u32 u64 u128
}
