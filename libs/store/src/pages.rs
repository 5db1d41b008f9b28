//! Pages and sealed pages.
//!
//! A page is the minimum unit of column data: an owned buffer of
//! fixed-width elements. Sealing compresses the element buffer and keeps
//! the element count next to it; unsealing reverses that and re-checks the
//! element framing.

use crate::codec::{decompress, Compressor};
use crate::descriptor::{ColumnId, ColumnType};
use crate::error::{Error, Result};

/// An uncompressed page of column elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    column_id: ColumnId,
    column_type: ColumnType,
    buf: Vec<u8>,
    n_elements: u32,
}

impl Page {
    /// Wrap an element buffer. `buf` must hold a whole number of elements.
    pub fn from_bytes(column_id: ColumnId, column_type: ColumnType, buf: Vec<u8>) -> Result<Self> {
        let element_size = column_type.element_size();
        if buf.len() % element_size != 0 {
            return Err(Error::MisalignedPage {
                len: buf.len(),
                element_size,
            });
        }
        let n_elements = (buf.len() / element_size) as u32;
        Ok(Self {
            column_id,
            column_type,
            buf,
            n_elements,
        })
    }

    pub fn column_id(&self) -> ColumnId {
        self.column_id
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn n_elements(&self) -> u32 {
        self.n_elements
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// A compressed page payload with its element count; what actually goes to
/// storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedPage {
    pub buf: Vec<u8>,
    pub n_elements: u32,
}

impl SealedPage {
    /// Bytes this page occupies on storage.
    pub fn size(&self) -> usize {
        self.buf.len()
    }
}

/// Compress a page into its sealed form.
pub fn seal_page(page: &Page, compressor: &Compressor) -> Result<SealedPage> {
    let buf = compressor.compress(page.as_bytes())?;
    Ok(SealedPage {
        buf,
        n_elements: page.n_elements(),
    })
}

/// Decompress a sealed payload back into element bytes, checking the
/// element framing.
pub fn unseal_page(buf: &[u8], n_elements: u32, column_type: ColumnType) -> Result<Vec<u8>> {
    let expected = n_elements as usize * column_type.element_size();
    decompress(buf, expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_element_count() {
        let page = Page::from_bytes(3, ColumnType::Real64, vec![0u8; 64]).unwrap();
        assert_eq!(page.n_elements(), 8);
    }

    #[test]
    fn test_misaligned_page_rejected() {
        let err = Page::from_bytes(3, ColumnType::Int32, vec![0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            Error::MisalignedPage {
                len: 10,
                element_size: 4
            }
        ));
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let elements: Vec<u8> = (0..256u32).flat_map(|i| i.to_le_bytes()).collect();
        let page = Page::from_bytes(1, ColumnType::UInt32, elements.clone()).unwrap();
        let sealed = seal_page(&page, &Compressor::new(0)).unwrap();
        assert_eq!(sealed.n_elements, 256);

        let out = unseal_page(&sealed.buf, sealed.n_elements, ColumnType::UInt32).unwrap();
        assert_eq!(out, elements);
    }

    #[test]
    fn test_unseal_with_wrong_element_count_fails() {
        let page = Page::from_bytes(1, ColumnType::Byte, vec![7u8; 100]).unwrap();
        let sealed = seal_page(&page, &Compressor::new(0)).unwrap();
        assert!(unseal_page(&sealed.buf, 99, ColumnType::Byte).is_err());
    }
}
